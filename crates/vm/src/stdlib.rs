//! Default host builtins
//!
//! | Name | Signature | Result |
//! |------|-----------|--------|
//! | `Println(args...)` | any values | logs them space-separated, returns nil |
//! | `Sprintf(fmt, args...)` | `%d %s %v %x %%` | formatted string |
//! | `TxJson()` | none | canonical encoding of the running contract's fields |
//! | `Len(v)` | string or bytes | length in bytes |
//! | `HexToBytes(s)` | hex string, optional `0x` | bytes |

use tracing::info;

use crate::codec;
use crate::error::HostError;
use crate::extend::{Arity, Extension, HostContext};
use crate::value::Value;

/// Extension holding every default builtin.
pub fn stdlib() -> Extension {
    Extension::new()
        .contextual("Println", Arity::AtLeast(0), println)
        .function("Sprintf", Arity::AtLeast(1), sprintf)
        .contextual("TxJson", Arity::Exact(0), tx_json)
        .function("Len", Arity::Exact(1), len)
        .function("HexToBytes", Arity::Exact(1), hex_to_bytes)
}

fn println(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value, HostError> {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let contract = ctx.contract.map(|c| c.name.as_str()).unwrap_or("-");
    info!(target: "meridian_vm::contract", contract, "{}", line);
    Ok(Value::Nil)
}

fn sprintf(args: &[Value]) -> Result<Value, HostError> {
    let format = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| HostError::new("format must be a string"))?;
    let mut rest = args[1..].iter();
    let mut out = String::with_capacity(format.len());

    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars
            .next()
            .ok_or_else(|| HostError::new("format ends with a bare %"))?;
        if verb == '%' {
            out.push('%');
            continue;
        }

        let arg = rest
            .next()
            .ok_or_else(|| HostError::new(format!("missing argument for %{}", verb)))?;
        match (verb, arg) {
            ('d', Value::Int(v)) => out.push_str(&v.to_string()),
            ('d', other) => {
                return Err(HostError::new(format!("%d expects int, got {}", other.type_name())))
            }
            ('s' | 'v', other) => out.push_str(&other.to_string()),
            ('x', Value::Int(v)) => out.push_str(&format!("{:x}", v)),
            ('x', Value::Str(s)) => out.push_str(&hex::encode(s.as_bytes())),
            ('x', Value::Bytes(b)) => out.push_str(&hex::encode(b)),
            ('x', other) => {
                return Err(HostError::new(format!("%x cannot format {}", other.type_name())))
            }
            (verb, _) => return Err(HostError::new(format!("unknown verb %{}", verb))),
        }
    }

    if rest.next().is_some() {
        return Err(HostError::new("too many arguments for format"));
    }
    Ok(Value::Str(out))
}

fn tx_json(ctx: &mut HostContext<'_>, _args: &[Value]) -> Result<Value, HostError> {
    let info = ctx
        .contract
        .and_then(|object| object.as_contract())
        .ok_or_else(|| HostError::new("TxJson called outside a contract"))?;
    codec::encode(info, ctx.extend)
        .map(Value::Str)
        .map_err(|e| HostError::new(e.to_string()))
}

fn len(args: &[Value]) -> Result<Value, HostError> {
    let n = match args.first() {
        Some(Value::Str(s)) => s.len(),
        Some(Value::Bytes(b)) => b.len(),
        Some(other) => return Err(HostError::new(format!("Len of {}", other.type_name()))),
        None => return Err(HostError::new("Len needs an argument")),
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| HostError::new("length overflows int"))
}

fn hex_to_bytes(args: &[Value]) -> Result<Value, HostError> {
    let s = match args.first() {
        Some(Value::Str(s)) => s.as_str(),
        Some(other) => return Err(HostError::new(format!("HexToBytes of {}", other.type_name()))),
        None => return Err(HostError::new("HexToBytes needs an argument")),
    };
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits)
        .map(Value::Bytes)
        .map_err(|e| HostError::new(format!("invalid hex: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprintf_verbs() {
        let out = sprintf(&[
            Value::from("%s paid %d (%x) 100%%"),
            Value::from("alice"),
            Value::Int(255),
            Value::Int(255),
        ])
        .unwrap();
        assert_eq!(out, Value::from("alice paid 255 (ff) 100%"));
    }

    #[test]
    fn test_sprintf_argument_mismatch() {
        assert!(sprintf(&[Value::from("%d"), Value::from("x")]).is_err());
        assert!(sprintf(&[Value::from("%d")]).is_err());
        assert!(sprintf(&[Value::from("plain"), Value::Int(1)]).is_err());
        assert!(sprintf(&[Value::from("%q"), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_len() {
        assert_eq!(len(&[Value::from("abc")]).unwrap(), Value::Int(3));
        assert_eq!(len(&[Value::Bytes(vec![1, 2])]).unwrap(), Value::Int(2));
        assert!(len(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_hex_to_bytes() {
        assert_eq!(
            hex_to_bytes(&[Value::from("0xABcd")]).unwrap(),
            Value::Bytes(vec![0xab, 0xcd])
        );
        assert_eq!(
            hex_to_bytes(&[Value::from("01")]).unwrap(),
            Value::Bytes(vec![1])
        );
        assert!(hex_to_bytes(&[Value::from("zz")]).is_err());
    }
}
