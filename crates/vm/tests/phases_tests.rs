//! Integration tests for the init/front/main phase driver

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use meridian_vm::{
    Arity, ExtendMap, Extension, Phase, PhaseSet, RuntimeError, Value, Vm, CALL_FRONT, CALL_MAIN,
};

const TRANSFER: &str = r#"
contract Transfer {
    tx {
        Amount int
        Memo   string "optional"
    }

    func init { $Trace = "init" }

    func front {
        $Trace = $Trace + ",front"
        if !Positive($Amount) { error "amount must be positive" }
        if $Amount > $Balance { error "not enough money" }
    }

    func main {
        $Trace = $Trace + ",main"
        $Balance = $Balance - $Amount
        Persist($Balance)
    }

    func Positive(a int) bool { return a > 0 }
}
"#;

/// VM with `Persist` counting its invocations.
fn setup() -> (Vm, Arc<AtomicUsize>) {
    let persisted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&persisted);

    let vm = Vm::default();
    vm.extend(Extension::new().function("Persist", Arity::Exact(1), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Nil)
    }))
    .unwrap();
    vm.compile(TRANSFER).unwrap();
    (vm, persisted)
}

fn transfer(balance: i64, amount: i64) -> ExtendMap {
    let mut extend = ExtendMap::new();
    extend.insert("Balance".into(), Value::Int(balance));
    extend.insert("Amount".into(), Value::Int(amount));
    extend
}

#[test]
fn test_all_phases_share_extend_map() {
    let (vm, persisted) = setup();
    let mut contract = vm.lookup_by_name("Transfer").unwrap();
    let mut extend = transfer(1_000, 300);

    contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap();

    assert_eq!(extend["Balance"], Value::Int(700));
    assert_eq!(extend["Trace"], Value::from("init,front,main"));
    assert_eq!(contract.called(), PhaseSet::ALL);
    assert_eq!(persisted.load(Ordering::SeqCst), 1);
}

#[test]
fn test_front_error_blocks_main() {
    let (vm, persisted) = setup();
    let mut contract = vm.lookup_by_name("Transfer").unwrap();
    let mut extend = transfer(1_000, 5_000);

    let err = contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap_err();

    assert_eq!(err.phase, Phase::Front);
    assert_eq!(err.contract, "Transfer");
    assert_eq!(err.source, RuntimeError::Raised("not enough money".into()));
    assert_eq!(extend["Balance"], Value::Int(1_000));
    assert_eq!(extend["Trace"], Value::from("init,front"));
    assert!(contract.called().contains(Phase::Init));
    assert!(!contract.called().contains(Phase::Main));
    assert_eq!(persisted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_main_never_runs_for_rejected_inputs() {
    let (vm, persisted) = setup();

    for amount in [0, -5, 1_001, i64::MAX] {
        let mut contract = vm.lookup_by_name("Transfer").unwrap();
        let mut extend = transfer(1_000, amount);

        let err = contract
            .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
            .unwrap_err();
        assert_eq!(err.phase, Phase::Front, "amount {}", amount);
        assert_eq!(extend["Balance"], Value::Int(1_000));
    }
    assert_eq!(persisted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_only_requested_phases_run() {
    let (vm, _) = setup();
    let mut contract = vm.lookup_by_name("Transfer").unwrap();
    let mut extend = transfer(1_000, 10);
    extend.insert("Trace".into(), Value::from("seed"));

    contract
        .call(
            &mut vm.new_runtime(),
            PhaseSet::from_bits(CALL_FRONT | CALL_MAIN),
            &mut extend,
        )
        .unwrap();

    assert_eq!(extend["Trace"], Value::from("seed,front,main"));
    assert!(!contract.called().contains(Phase::Init));
}

#[test]
fn test_missing_phases_are_skipped() {
    let vm = Vm::default();
    vm.compile("contract Minimal { func main { $Done = true } }")
        .unwrap();

    let mut contract = vm.lookup_by_name("Minimal").unwrap();
    let mut extend = ExtendMap::new();
    contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap();

    assert_eq!(extend["Done"], Value::Bool(true));
    assert_eq!(contract.called(), PhaseSet::from_bits(CALL_MAIN));
}

#[test]
fn test_main_failure_reported_as_main() {
    let vm = Vm::default();
    vm.compile(
        r#"
        contract Broken {
            func front { $Checked = true }
            func main { $Total = $Missing + 1 }
        }
        "#,
    )
    .unwrap();

    let mut contract = vm.lookup_by_name("Broken").unwrap();
    let mut extend = ExtendMap::new();
    let err = contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap_err();

    assert_eq!(err.phase, Phase::Main);
    assert!(matches!(err.source, RuntimeError::TypeMismatch { .. }));
    assert_eq!(extend["Checked"], Value::Bool(true));
}

#[test]
fn test_lookup_ignores_functions() {
    let (vm, _) = setup();
    assert!(vm.lookup_by_name("Transfer.main").is_none());
    assert!(vm.lookup_by_name("Nope").is_none());
}
