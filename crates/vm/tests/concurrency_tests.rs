//! Concurrent execution over shared snapshots

use std::sync::Arc;
use std::thread;

use meridian_vm::{ExtendMap, PhaseSet, Value, Vm};

const MIXER: &str = r#"
contract Mixer {
    tx { Seed int }
    func main {
        var acc int, i int
        acc = $Seed
        while i < 200 {
            acc = (acc * 31 + i) % 1000003
            i = i + 1
        }
        $Out = acc
    }
}
"#;

fn mix(vm: &Vm, seed: i64) -> Value {
    let mut contract = vm.lookup_by_name("Mixer").unwrap();
    let mut extend = ExtendMap::new();
    extend.insert("Seed".into(), Value::Int(seed));
    contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap();
    extend.remove("Out").unwrap()
}

#[test]
fn test_concurrent_runs_match_sequential() {
    let vm = Arc::new(Vm::default());
    vm.compile(MIXER).unwrap();

    let expected: Vec<Value> = (0..32).map(|seed| mix(&vm, seed)).collect();

    let handles: Vec<_> = (0..32)
        .map(|seed| {
            let vm = Arc::clone(&vm);
            thread::spawn(move || (seed, mix(&vm, seed)))
        })
        .collect();

    for handle in handles {
        let (seed, out) = handle.join().unwrap();
        assert_eq!(out, expected[seed as usize], "seed {}", seed);
    }
}

#[test]
fn test_runs_unaffected_by_concurrent_installs() {
    let vm = Arc::new(Vm::default());
    vm.compile(MIXER).unwrap();
    let expected = mix(&vm, 7);

    let writer = {
        let vm = Arc::clone(&vm);
        thread::spawn(move || {
            for i in 0..50 {
                vm.compile(&format!("contract Filler{} {{ }}", i)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let vm = Arc::clone(&vm);
            thread::spawn(move || (0..25).map(|_| mix(&vm, 7)).collect::<Vec<_>>())
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        for out in reader.join().unwrap() {
            assert_eq!(out, expected);
        }
    }
    assert_eq!(vm.tree().named().len(), 52);
}
