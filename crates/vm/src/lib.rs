//! # Meridian Contract VM
//!
//! Compiler and interpreter for Meridian smart contracts.
//!
//! ## Pipeline
//!
//! ```text
//! source ──> lexer ──> parser ──> compiler ──> CompiledRoot ──flush──> ObjectTree
//!                                                   │                      │
//!                                                   └──attach──> Runtime <─┘
//!                                                                  │
//!                                       Contract::call(init, front, main)
//! ```
//!
//! ## Sharing
//!
//! The [`Vm`] handle holds the object tree and builtin registry as immutable
//! snapshots. Compiling and registering builtins swap in new snapshots; a
//! [`Runtime`] pins the snapshots current at its creation and is owned by one
//! caller. Any number of runtimes may execute concurrently.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_vm::{stdlib, ExtendMap, PhaseSet, Vm};
//!
//! let vm = Vm::default();
//! vm.extend(stdlib())?;
//! vm.compile(r#"
//!     contract Transfer {
//!         tx { Amount int }
//!         func front { if $Amount <= 0 { error "amount must be positive" } }
//!         func main  { $Debited = $Amount }
//!     }
//! "#)?;
//!
//! let mut contract = vm.lookup_by_name("Transfer").unwrap();
//! let mut extend = ExtendMap::new();
//! extend.insert("Amount".into(), 500.into());
//! contract.call(&mut vm.new_runtime(), PhaseSet::ALL, &mut extend)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ast;
pub mod bytecode;
pub mod codec;
pub mod compiler;
pub mod error;
pub mod extend;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod smart;
pub mod stdlib;
pub mod tree;
pub mod value;
pub mod vm;

pub use bytecode::{CompiledBlock, Op, Param};
pub use codec::{encode, encode_fields};
pub use error::{
    CompileError, CompileResult, ExtendError, FieldEncodingError, HostError, RuntimeError,
    RuntimeResult,
};
pub use extend::{Arity, Builtin, Builtins, Extension, HostContext};
pub use runtime::Runtime;
pub use smart::{Contract, Phase, PhaseError, PhaseSet, CALL_FRONT, CALL_INIT, CALL_MAIN};
pub use stdlib::stdlib;
pub use tree::{CompiledRoot, ContractInfo, FieldType, Object, ObjectId, ObjectKind, ObjectTree, TxField};
pub use value::{ExtendMap, Value, ValueType};
pub use vm::{Vm, VmLimits};
