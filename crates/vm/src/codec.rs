//! Transaction field codec
//!
//! Renders a contract's declared transaction fields as a JSON-like object
//! literal. The output is hashed and signed downstream, so field order is
//! declaration order and formatting is fixed:
//!
//! ```text
//! {"amount": 500,"pub": "abcd"}
//! ```
//!
//! String values are quoted but not escaped.

use std::fmt::Write;

use crate::error::FieldEncodingError;
use crate::tree::{ContractInfo, FieldType, TxField};
use crate::value::{ExtendMap, Value};

/// Encode the transaction fields of `contract` from `extend`.
pub fn encode(contract: &ContractInfo, extend: &ExtendMap) -> Result<String, FieldEncodingError> {
    encode_fields(&contract.tx_fields, extend)
}

/// Encode an explicit field list from `extend`.
pub fn encode_fields(fields: &[TxField], extend: &ExtendMap) -> Result<String, FieldEncodingError> {
    let mut out = String::from("{");
    let mut first = true;

    for field in fields {
        let value = match extend.get(&field.name) {
            Some(Value::Nil) | None if field.optional => continue,
            Some(Value::Nil) | None => return Err(FieldEncodingError::Missing(field.name.clone())),
            Some(value) => value,
        };

        if !first {
            out.push(',');
        }
        first = false;

        // writing into a String cannot fail
        let _ = write!(out, "\"{}\": ", field.name);
        write_value(&mut out, field, value)?;
    }

    out.push('}');
    Ok(out)
}

fn write_value(out: &mut String, field: &TxField, value: &Value) -> Result<(), FieldEncodingError> {
    match (field.ty, value) {
        (FieldType::String, Value::Str(s)) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        (FieldType::Int64, Value::Int(v)) => {
            let _ = write!(out, "{}", v);
        }
        (FieldType::Bytes, Value::Bytes(b)) => {
            out.push('"');
            out.push_str(&hex::encode(b));
            out.push('"');
        }
        (ty, other) => {
            return Err(FieldEncodingError::WrongType {
                field: field.name.clone(),
                expected: ty.name(),
                found: other.type_name(),
            })
        }
    }
    Ok(())
}
