//! Integration tests for object tree addressing and upgrades

use meridian_vm::{CompileError, ExtendMap, ObjectKind, PhaseSet, Value, Vm};

fn versioned(version: i64) -> String {
    format!("contract Token {{ func main {{ $Version = {} }} }}", version)
}

fn run_main(vm: &Vm, contract: &mut meridian_vm::Contract) -> Value {
    let mut extend = ExtendMap::new();
    contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap();
    extend.remove("Version").unwrap_or_default()
}

#[test]
fn test_recompile_assigns_new_ids() {
    let vm = Vm::default();
    let first = vm.compile(&versioned(1)).unwrap();
    let second = vm.compile(&versioned(2)).unwrap();

    let first_id = first.get("Token").unwrap().id;
    let second_id = second.get("Token").unwrap().id;
    assert_ne!(first_id, second_id);
    assert!(second_id > first_id);

    let current = vm.lookup_by_name("Token").unwrap();
    assert_eq!(current.id(), second_id);
}

#[test]
fn test_old_handles_keep_old_code() {
    let vm = Vm::default();
    vm.compile(&versioned(1)).unwrap();
    let mut old = vm.lookup_by_name("Token").unwrap();

    vm.compile(&versioned(2)).unwrap();
    let mut new = vm.lookup_by_name("Token").unwrap();

    assert_eq!(run_main(&vm, &mut old), Value::Int(1));
    assert_eq!(run_main(&vm, &mut new), Value::Int(2));

    // the superseded object stays addressable by id
    let mut by_id = vm.lookup_by_id(old.id()).unwrap();
    assert_eq!(run_main(&vm, &mut by_id), Value::Int(1));
}

#[test]
fn test_out_of_range_id_is_not_found() {
    let vm = Vm::default();
    assert!(vm.lookup_by_id(0).is_none());

    vm.compile(&versioned(1)).unwrap();
    assert!(vm.lookup_by_id(0).is_some());
    assert!(vm.lookup_by_id(2).is_none());
    assert!(vm.lookup_by_id(u32::MAX).is_none());
}

#[test]
fn test_function_id_is_not_a_contract() {
    let vm = Vm::default();
    let root = vm.compile(&versioned(1)).unwrap();
    let main_id = root.get("Token.main").unwrap().id;

    assert!(vm.lookup_by_id(main_id).is_none());
    assert!(matches!(
        vm.tree().get(main_id).map(|o| &o.kind),
        Some(ObjectKind::Function(_))
    ));
}

#[test]
fn test_unflushed_ids_leave_gaps() {
    let vm = Vm::default();
    let pending = vm.compile_block("contract Draft { }").unwrap();
    let installed = vm.compile("contract Final { }").unwrap();

    let draft_id = pending.get("Draft").unwrap().id;
    let final_id = installed.get("Final").unwrap().id;
    assert!(final_id > draft_id);

    assert!(vm.lookup_by_id(draft_id).is_none());
    assert_eq!(vm.lookup_by_id(final_id).unwrap().name(), "Final");
}

#[test]
fn test_name_and_id_lookups_agree() {
    let vm = Vm::default();
    let root = vm
        .compile("contract A { } contract B { func main { } } contract C { }")
        .unwrap();

    for object in root.contracts() {
        let by_name = vm.lookup_by_name(&object.name).unwrap();
        let by_id = vm.lookup_by_id(object.id).unwrap();
        assert_eq!(by_name.id(), by_id.id());
        assert_eq!(by_name.name(), by_id.name());
    }
}

#[test]
fn test_kind_collision_rejected() {
    let vm = Vm::default();
    vm.compile("contract Shared { }").unwrap();

    let err = vm.compile("func Shared { }").unwrap_err();
    assert_eq!(
        err,
        CompileError::DuplicateName {
            name: "Shared".into()
        }
    );
    assert!(vm.lookup_by_name("Shared").is_some());

    // a pending root that collides is refused at flush
    let vm = Vm::default();
    let pending = vm.compile_block("func Late { }").unwrap();
    vm.compile("contract Late { }").unwrap();
    assert!(matches!(
        vm.flush(&pending),
        Err(CompileError::DuplicateName { .. })
    ));
}

#[test]
fn test_named_listing() {
    let vm = Vm::default();
    vm.compile("contract B { func main { } } func A { }").unwrap();

    let names: Vec<_> = vm.tree().named().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["A", "B", "B.main"]);
}
