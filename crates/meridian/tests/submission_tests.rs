//! Integration tests for transaction processing

use std::sync::Arc;

use meridian::{SubmitError, TxProcessor};
use meridian_types::H256;
use meridian_vm::{stdlib, ExtendMap, Phase, RuntimeError, Value, Vm};

const PAY: &str = r#"
contract Pay {
    tx {
        Amount int
        Memo   string "optional"
    }

    func front {
        if $Amount <= 0 { error "amount must be positive" }
    }

    func main {
        if $Amount > 1000 { error "limit exceeded" }
        $Memo = Sprintf("paid %d", $Amount)
    }
}
"#;

fn processor() -> TxProcessor {
    let vm = Vm::default();
    vm.extend(stdlib()).unwrap();
    vm.compile(PAY).unwrap();
    TxProcessor::new(Arc::new(vm))
}

fn amount(value: i64) -> ExtendMap {
    let mut fields = ExtendMap::new();
    fields.insert("Amount".into(), Value::Int(value));
    fields
}

#[test]
fn test_accepted_transaction_payload() {
    let processed = processor().process("Pay", amount(5)).unwrap();

    assert_eq!(processed.contract, "Pay");
    assert_eq!(processed.payload, r#"{"Amount": 5,"Memo": "paid 5"}"#);
    assert_eq!(processed.hash, H256::keccak256(processed.payload.as_bytes()));
}

#[test]
fn test_unknown_contract() {
    let err = processor().process("Missing", amount(5)).unwrap_err();
    assert!(matches!(err, SubmitError::UnknownContract(ref name) if name == "Missing"));
    assert!(err.is_rejection());
}

#[test]
fn test_front_failure_is_rejection() {
    let err = processor().process("Pay", amount(0)).unwrap_err();

    match &err {
        SubmitError::Rejected {
            contract,
            phase,
            source,
        } => {
            assert_eq!(contract, "Pay");
            assert_eq!(*phase, Phase::Front);
            assert!(matches!(source, RuntimeError::Raised(_)));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(err.is_rejection());
}

#[test]
fn test_main_failure_is_escalated() {
    let err = processor().process("Pay", amount(5_000)).unwrap_err();

    assert!(matches!(err, SubmitError::Escalated { ref contract, .. } if contract == "Pay"));
    assert!(!err.is_rejection());
}

#[test]
fn test_missing_required_field_fails_encoding() {
    let vm = Vm::default();
    vm.compile("contract Note { tx { Text string \n Count int } }")
        .unwrap();
    let processor = TxProcessor::new(Arc::new(vm));

    let mut fields = ExtendMap::new();
    fields.insert("Text".into(), Value::Str("hello".into()));

    let err = processor.process("Note", fields).unwrap_err();
    assert!(matches!(err, SubmitError::Encoding { .. }));
}
