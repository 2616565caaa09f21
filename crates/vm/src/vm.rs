//! The VM handle
//!
//! [`Vm`] owns the object tree and the builtin registry. Both are immutable
//! snapshots behind a `RwLock<Arc<_>>`: readers clone the `Arc` and never
//! block each other, writers build a new snapshot and swap it in.

use meridian_config::VmConfig;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bytecode::CompiledBlock;
use crate::compiler::compile_unit;
use crate::error::{CompileError, CompileResult, ExtendError, RuntimeResult};
use crate::extend::{Builtins, Extension};
use crate::parser::parse;
use crate::runtime::Runtime;
use crate::smart::Contract;
use crate::tree::{CompiledRoot, ObjectId, ObjectTree};
use crate::value::{ExtendMap, Value};

/// Execution and compilation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmLimits {
    /// Maximum instructions per run
    pub max_steps: u64,
    /// Maximum nested call depth
    pub max_call_depth: usize,
    /// Maximum source size accepted by the compiler
    pub max_source_bytes: usize,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self::from(&VmConfig::default())
    }
}

impl From<&VmConfig> for VmLimits {
    fn from(config: &VmConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            max_call_depth: config.max_call_depth,
            max_source_bytes: config.max_source_bytes,
        }
    }
}

/// Contract virtual machine.
pub struct Vm {
    tree: RwLock<Arc<ObjectTree>>,
    builtins: RwLock<Arc<Builtins>>,
    next_id: Mutex<ObjectId>,
    /// Serializes tree installs so a collision check and its swap are atomic
    install_lock: Mutex<()>,
    limits: VmLimits,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmLimits::default())
    }
}

impl Vm {
    /// Create a VM with an empty tree and no builtins.
    pub fn new(limits: VmLimits) -> Self {
        Self {
            tree: RwLock::new(Arc::new(ObjectTree::new())),
            builtins: RwLock::new(Arc::new(Builtins::new())),
            next_id: Mutex::new(0),
            install_lock: Mutex::new(()),
            limits,
        }
    }

    /// Create a VM from the `[vm]` configuration section.
    pub fn from_config(config: &VmConfig) -> Self {
        Self::new(VmLimits::from(config))
    }

    /// Configured limits.
    pub fn limits(&self) -> &VmLimits {
        &self.limits
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    /// Compile `source` and install it.
    pub fn compile(&self, source: &str) -> CompileResult<CompiledRoot> {
        let root = self.compile_block(source)?;
        self.flush(&root)?;
        Ok(root)
    }

    /// Compile `source` without installing it.
    ///
    /// Object ids are reserved now. If the root is never flushed those ids
    /// remain unused.
    pub fn compile_block(&self, source: &str) -> CompileResult<CompiledRoot> {
        if source.len() > self.limits.max_source_bytes {
            return Err(CompileError::TooLarge {
                what: "source",
                size: source.len(),
                limit: self.limits.max_source_bytes,
            });
        }

        let unit = parse(source)?;
        let tree = self.tree();
        let mut reserve = || {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        let root = compile_unit(&unit, &tree, &mut reserve)?;
        tree.check_collisions(&root)?;

        debug!(objects = root.len(), "Compiled source block");
        Ok(root)
    }

    /// Install every object of `root` in the tree.
    ///
    /// Names already held by objects of the same kind are repointed to the
    /// new objects. A name held by an object of a different kind fails the
    /// whole flush and leaves the tree unchanged.
    pub fn flush(&self, root: &CompiledRoot) -> CompileResult<()> {
        let _guard = self.install_lock.lock();

        let current = self.tree();
        let next = current.with_root(root)?;
        *self.tree.write() = Arc::new(next);

        info!(
            objects = root.len(),
            contracts = root.contracts().count(),
            "Installed compiled objects"
        );
        Ok(())
    }

    /// Current tree snapshot.
    pub fn tree(&self) -> Arc<ObjectTree> {
        Arc::clone(&self.tree.read())
    }

    /// Look up a contract by name.
    pub fn lookup_by_name(&self, name: &str) -> Option<Contract> {
        self.tree()
            .get_by_name(name)
            .and_then(|object| Contract::new(Arc::clone(object)))
    }

    /// Look up a contract by object id.
    ///
    /// Out-of-range ids, never-flushed ids and non-contract objects are `None`.
    pub fn lookup_by_id(&self, id: ObjectId) -> Option<Contract> {
        self.tree()
            .get(id)
            .and_then(|object| Contract::new(Arc::clone(object)))
    }

    // =========================================================================
    // Builtins
    // =========================================================================

    /// Register host builtins.
    ///
    /// A name registered again replaces the earlier builtin for runtimes
    /// created afterwards.
    pub fn extend(&self, extension: Extension) -> Result<(), ExtendError> {
        let _guard = self.install_lock.lock();

        let names: Vec<String> = extension.names().map(str::to_string).collect();
        let (next, replaced) = self.builtins().merged(extension)?;
        for name in &replaced {
            warn!(builtin = %name, "Builtin re-registered, replacing earlier definition");
        }
        *self.builtins.write() = Arc::new(next);

        debug!(count = names.len(), names = ?names, "Registered builtins");
        Ok(())
    }

    /// Current builtin snapshot.
    pub fn builtins(&self) -> Arc<Builtins> {
        Arc::clone(&self.builtins.read())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Fresh runtime over the current tree and builtin snapshots.
    pub fn new_runtime(&self) -> Runtime {
        Runtime::new(self.tree(), self.builtins(), self.limits)
    }

    /// Run `body` in `runtime`.
    pub fn run(
        &self,
        runtime: &mut Runtime,
        body: &Arc<CompiledBlock>,
        params: Vec<Value>,
        extend: &mut ExtendMap,
    ) -> RuntimeResult<Vec<Value>> {
        runtime.run(body, params, extend)
    }
}
