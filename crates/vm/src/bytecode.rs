//! Bytecode instruction set
//!
//! Flat instruction encoding for stack-based execution. Each instruction
//! operates on an implicit operand stack; jump targets are absolute
//! instruction indices within the block.

use crate::tree::ObjectId;
use crate::value::{Value, ValueType};

/// Slot identifier for parameters and local variables
pub type SlotId = u16;

/// Bytecode instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // === Loads and stores ===
    /// Push a literal (index into the literal table)
    Literal(u16),
    /// Push a local slot
    LoadLocal(SlotId),
    /// Pop into a local slot
    StoreLocal(SlotId),
    /// Push an extend map entry, nil if absent (index into the name table)
    LoadExtend(u16),
    /// Pop into an extend map entry (index into the name table)
    StoreExtend(u16),
    /// Push a host value builtin (index into the name table)
    LoadHost(u16),

    // === Arithmetic ===
    /// Pop b, pop a, push a + b
    Add,
    /// Pop b, pop a, push a - b
    Sub,
    /// Pop b, pop a, push a * b
    Mul,
    /// Pop b, pop a, push a / b
    Div,
    /// Pop b, pop a, push a % b
    Rem,
    /// Pop a, push -a
    Neg,

    // === Comparison and logic ===
    /// Pop b, pop a, push a == b
    Eq,
    /// Pop b, pop a, push a != b
    Ne,
    /// Pop b, pop a, push a < b
    Lt,
    /// Pop b, pop a, push a <= b
    Le,
    /// Pop b, pop a, push a > b
    Gt,
    /// Pop b, pop a, push a >= b
    Ge,
    /// Pop a, push !a
    Not,

    // === Control flow ===
    /// Jump unconditionally
    Jump(u32),
    /// Pop a bool, jump if false
    JumpIfFalse(u32),

    // === Calls ===
    /// Call a compiled function by object id
    Call {
        /// Callee
        object: ObjectId,
        /// Number of arguments to pop
        argc: u8,
    },
    /// Call a host builtin by name
    CallHost {
        /// Index into the name table
        name: u16,
        /// Number of arguments to pop
        argc: u8,
    },
    /// Pop the return value and leave the frame
    Return,
    /// Pop a value and fail with it as the error message
    Raise,

    // === Stack ===
    /// Duplicate top of stack
    Dup,
    /// Discard top of stack
    Pop,
}

/// Declared parameter of a compiled function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
}

/// A compiled function body.
#[derive(Debug, Clone, Default)]
pub struct CompiledBlock {
    /// Qualified function name (`Contract.func` or `Func`)
    pub name: String,
    /// Contract that declares this function, if nested
    pub owner: Option<ObjectId>,
    /// Parameters, occupying the first local slots
    pub params: Vec<Param>,
    /// Declared result type
    pub result: Option<ValueType>,
    /// Total local slots, parameters included
    pub local_count: u16,
    /// Instruction sequence
    pub ops: Vec<Op>,
    /// Literal value table
    pub literals: Vec<Value>,
    /// Extend key and host builtin name table
    pub names: Vec<String>,
}

impl CompiledBlock {
    pub(crate) fn new(name: String, owner: Option<ObjectId>) -> Self {
        Self {
            name,
            owner,
            ..Default::default()
        }
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Add a literal, returning its index
    pub(crate) fn add_literal(&mut self, value: Value) -> Option<u16> {
        if let Some(idx) = self.literals.iter().position(|v| v == &value) {
            return u16::try_from(idx).ok();
        }
        let idx = u16::try_from(self.literals.len()).ok()?;
        self.literals.push(value);
        Some(idx)
    }

    /// Add a name, returning its index
    pub(crate) fn add_name(&mut self, name: &str) -> Option<u16> {
        if let Some(idx) = self.names.iter().position(|s| s == name) {
            return u16::try_from(idx).ok();
        }
        let idx = u16::try_from(self.names.len()).ok()?;
        self.names.push(name.to_string());
        Some(idx)
    }

    /// Emit an instruction
    pub(crate) fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Current instruction offset (for jump patching)
    pub(crate) fn offset(&self) -> usize {
        self.ops.len()
    }

    /// Point the jump at `offset` to `target`.
    pub(crate) fn patch_jump(&mut self, offset: usize, target: u32) {
        if let Some(Op::Jump(t) | Op::JumpIfFalse(t)) = self.ops.get_mut(offset) {
            *t = target;
        }
    }
}
