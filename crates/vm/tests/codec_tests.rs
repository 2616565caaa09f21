//! Integration tests for the transaction field codec

use meridian_vm::{encode, stdlib, ExtendMap, FieldEncodingError, PhaseSet, Value, Vm};

fn install(source: &str, name: &str) -> (Vm, meridian_vm::Contract) {
    let vm = Vm::default();
    vm.extend(stdlib()).unwrap();
    vm.compile(source).unwrap();
    let contract = vm.lookup_by_name(name).unwrap();
    (vm, contract)
}

#[test]
fn test_reference_encoding() {
    let (_vm, contract) = install("contract Pay { tx { amount int64 \n pub bytes } }", "Pay");

    let mut extend = ExtendMap::new();
    extend.insert("amount".into(), Value::Int(500));
    extend.insert("pub".into(), Value::Bytes(vec![0xAB, 0xCD]));

    assert_eq!(
        encode(contract.info(), &extend).unwrap(),
        r#"{"amount": 500,"pub": "abcd"}"#
    );
}

#[test]
fn test_declaration_order_is_kept() {
    let (_vm, contract) = install(
        "contract Order { tx { zeta int \n alpha string \n mid bytes } }",
        "Order",
    );

    let mut extend = ExtendMap::new();
    extend.insert("alpha".into(), Value::from("a"));
    extend.insert("mid".into(), Value::Bytes(vec![0x00, 0x0f]));
    extend.insert("zeta".into(), Value::Int(1));
    extend.insert("unrelated".into(), Value::Int(9));

    assert_eq!(
        encode(contract.info(), &extend).unwrap(),
        r#"{"zeta": 1,"alpha": "a","mid": "000f"}"#
    );
}

#[test]
fn test_missing_required_field() {
    let (_vm, contract) = install("contract Pay { tx { amount int64 \n pub bytes } }", "Pay");

    let mut extend = ExtendMap::new();
    extend.insert("amount".into(), Value::Int(500));

    assert_eq!(
        encode(contract.info(), &extend).unwrap_err(),
        FieldEncodingError::Missing("pub".into())
    );
}

#[test]
fn test_mistyped_field() {
    let (_vm, contract) = install("contract Pay { tx { amount int64 } }", "Pay");

    let mut extend = ExtendMap::new();
    extend.insert("amount".into(), Value::from("500"));

    assert_eq!(
        encode(contract.info(), &extend).unwrap_err(),
        FieldEncodingError::WrongType {
            field: "amount".into(),
            expected: "int64",
            found: "string",
        }
    );
}

#[test]
fn test_absent_optional_field_is_omitted() {
    let (_vm, contract) = install(
        r#"contract Note { tx { amount int64; memo string "optional" } }"#,
        "Note",
    );

    let mut extend = ExtendMap::new();
    extend.insert("amount".into(), Value::Int(1));
    assert_eq!(encode(contract.info(), &extend).unwrap(), r#"{"amount": 1}"#);

    extend.insert("memo".into(), Value::from("hi"));
    assert_eq!(
        encode(contract.info(), &extend).unwrap(),
        r#"{"amount": 1,"memo": "hi"}"#
    );
}

#[test]
fn test_tx_json_builtin() {
    let (vm, mut contract) = install(
        r#"
        contract Signed {
            tx { amount int64 }
            func main { $Payload = TxJson() }
        }
        "#,
        "Signed",
    );

    let mut extend = ExtendMap::new();
    extend.insert("amount".into(), Value::Int(-12));
    contract
        .call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)
        .unwrap();

    assert_eq!(extend["Payload"], Value::from(r#"{"amount": -12}"#));
}
