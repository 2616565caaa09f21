//! # Object Tree
//!
//! Append-only registry of every compiled contract and function.
//!
//! ## Layout
//!
//! - An arena of objects indexed by id. Ids are reserved at compile time and
//!   never reused, so a slot may stay empty if its root was never flushed.
//! - A qualified-name index: `Contract`, `Contract.func`, `Func`.
//!
//! Recompiling a name installs a new object under a new id and repoints the
//! name. The superseded object stays in the arena, so holders of its id or
//! its `Arc` keep running the old code.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::bytecode::{CompiledBlock, Param};
use crate::error::{CompileError, CompileResult};
use crate::value::ValueType;

/// Sequential object identifier
pub type ObjectId = u32;

/// Declared type of a transaction field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `string`
    String,
    /// `int` / `int64`
    Int64,
    /// `bytes`
    Bytes,
}

impl FieldType {
    /// Parse a field type name as written in a `tx` block.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "int" | "int64" => Some(FieldType::Int64),
            "bytes" => Some(FieldType::Bytes),
            _ => None,
        }
    }

    /// Type name as written in a `tx` block.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int64 => "int64",
            FieldType::Bytes => "bytes",
        }
    }
}

/// One declared transaction field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxField {
    /// Field name, also its extend map key
    pub name: String,
    /// Declared type
    pub ty: FieldType,
    /// Whether the field may be absent
    pub optional: bool,
}

/// Contract-specific object data.
#[derive(Debug, Clone)]
pub struct ContractInfo {
    /// Transaction fields in declaration order
    pub tx_fields: Vec<TxField>,
    /// Nested functions in declaration order
    pub functions: IndexMap<String, Arc<Object>>,
}

/// Function-specific object data.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Compiled body
    pub block: Arc<CompiledBlock>,
}

impl FunctionInfo {
    /// Declared parameters.
    pub fn params(&self) -> &[Param] {
        &self.block.params
    }

    /// Declared result type.
    pub fn result(&self) -> Option<ValueType> {
        self.block.result
    }
}

/// Object payload.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// A contract with its fields and nested functions
    Contract(Arc<ContractInfo>),
    /// A function
    Function(FunctionInfo),
}

impl ObjectKind {
    /// Short kind name for logs and listings.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Contract(_) => "contract",
            ObjectKind::Function(_) => "function",
        }
    }
}

/// A compiled contract or function.
#[derive(Debug, Clone)]
pub struct Object {
    /// Arena index
    pub id: ObjectId,
    /// Unqualified name
    pub name: String,
    /// Declaring contract, for nested functions
    pub owner: Option<ObjectId>,
    /// Payload
    pub kind: ObjectKind,
}

impl Object {
    /// Name under which the object is indexed.
    pub fn qualified_name(&self) -> String {
        match (&self.kind, self.owner) {
            (ObjectKind::Function(info), Some(_)) => info.block.name.clone(),
            _ => self.name.clone(),
        }
    }

    /// Contract data, if this is a contract.
    pub fn as_contract(&self) -> Option<&Arc<ContractInfo>> {
        match &self.kind {
            ObjectKind::Contract(info) => Some(info),
            ObjectKind::Function(_) => None,
        }
    }

    /// Function data, if this is a function.
    pub fn as_function(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            ObjectKind::Function(info) => Some(info),
            ObjectKind::Contract(_) => None,
        }
    }

    fn same_kind(&self, other: &Object) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }
}

/// Objects produced by one compilation, not yet installed.
#[derive(Debug, Clone, Default)]
pub struct CompiledRoot {
    objects: Vec<Arc<Object>>,
}

impl CompiledRoot {
    pub(crate) fn new(mut objects: Vec<Arc<Object>>) -> Self {
        objects.sort_by_key(|o| o.id);
        Self { objects }
    }

    /// All objects in id order.
    pub fn objects(&self) -> &[Arc<Object>] {
        &self.objects
    }

    /// Top-level contracts in id order.
    pub fn contracts(&self) -> impl Iterator<Item = &Arc<Object>> {
        self.objects.iter().filter(|o| o.as_contract().is_some())
    }

    /// Object by qualified name.
    pub fn get(&self, qualified_name: &str) -> Option<&Arc<Object>> {
        self.objects
            .iter()
            .find(|o| o.qualified_name() == qualified_name)
    }

    /// Object by id.
    pub fn get_by_id(&self, id: ObjectId) -> Option<&Arc<Object>> {
        self.objects
            .binary_search_by_key(&id, |o| o.id)
            .ok()
            .map(|i| &self.objects[i])
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the root holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Immutable snapshot of all installed objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectTree {
    arena: Vec<Option<Arc<Object>>>,
    names: HashMap<String, ObjectId>,
}

impl ObjectTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Object by id; out of range and empty slots are `None`.
    pub fn get(&self, id: ObjectId) -> Option<&Arc<Object>> {
        self.arena.get(id as usize).and_then(Option::as_ref)
    }

    /// Current object for a qualified name.
    pub fn get_by_name(&self, qualified_name: &str) -> Option<&Arc<Object>> {
        self.names
            .get(qualified_name)
            .and_then(|id| self.get(*id))
    }

    /// Current top-level function named `name`.
    pub fn top_level_function(&self, name: &str) -> Option<&Arc<Object>> {
        self.get_by_name(name)
            .filter(|o| o.owner.is_none() && o.as_function().is_some())
    }

    /// Number of installed objects, superseded ones included.
    pub fn len(&self) -> usize {
        self.arena.iter().filter(|o| o.is_some()).count()
    }

    /// Whether nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Objects currently reachable by name, sorted by qualified name.
    pub fn named(&self) -> Vec<(String, Arc<Object>)> {
        let mut out: Vec<_> = self
            .names
            .iter()
            .filter_map(|(name, id)| self.get(*id).map(|o| (name.clone(), Arc::clone(o))))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Fail if any object of `root` would replace a name held by an object
    /// of a different kind.
    pub fn check_collisions(&self, root: &CompiledRoot) -> CompileResult<()> {
        for object in root.objects() {
            let name = object.qualified_name();
            if let Some(existing) = self.get_by_name(&name) {
                if !existing.same_kind(object) {
                    return Err(CompileError::DuplicateName { name });
                }
            }
        }
        Ok(())
    }

    /// Copy of this tree with `root` installed.
    pub(crate) fn with_root(&self, root: &CompiledRoot) -> CompileResult<ObjectTree> {
        self.check_collisions(root)?;

        let mut next = self.clone();
        for object in root.objects() {
            let index = object.id as usize;
            if next.arena.len() <= index {
                next.arena.resize(index + 1, None);
            }
            next.arena[index] = Some(Arc::clone(object));
            next.names.insert(object.qualified_name(), object.id);
        }
        Ok(next)
    }
}
