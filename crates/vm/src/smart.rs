//! # Contract Handles and the Phase Driver
//!
//! A transaction is processed by up to three functions of its contract:
//!
//! ```text
//! ┌────────┐     ┌────────┐     ┌────────┐
//! │  init  │ ──> │ front  │ ──> │  main  │
//! └────────┘     └────────┘     └────────┘
//!   prepare       validate        apply
//! ```
//!
//! Each phase runs only if requested and only if the contract declares it.
//! The first failing phase stops the sequence: a rejected `front` means
//! `main` never starts.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::bytecode::CompiledBlock;
use crate::error::RuntimeError;
use crate::runtime::Runtime;
use crate::tree::{ContractInfo, Object, ObjectId, TxField};
use crate::value::ExtendMap;

/// Request bit for the `init` phase
pub const CALL_INIT: u8 = 1;
/// Request bit for the `front` phase
pub const CALL_FRONT: u8 = 2;
/// Request bit for the `main` phase
pub const CALL_MAIN: u8 = 4;

/// One phase of transaction processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Preparation
    Init,
    /// Validation
    Front,
    /// Application
    Main,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::Init, Phase::Front, Phase::Main];

    /// Name of the contract function implementing this phase.
    pub fn function_name(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Front => "front",
            Phase::Main => "main",
        }
    }

    /// Request bit for this phase.
    pub fn bit(&self) -> u8 {
        match self {
            Phase::Init => CALL_INIT,
            Phase::Front => CALL_FRONT,
            Phase::Main => CALL_MAIN,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Set of phases, as a bitmask of `CALL_*` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PhaseSet(u8);

impl PhaseSet {
    /// No phases.
    pub const NONE: PhaseSet = PhaseSet(0);
    /// Every phase.
    pub const ALL: PhaseSet = PhaseSet(CALL_INIT | CALL_FRONT | CALL_MAIN);

    /// Build from raw `CALL_*` bits; unknown bits are dropped.
    pub fn from_bits(bits: u8) -> Self {
        PhaseSet(bits & Self::ALL.0)
    }

    /// Raw bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether `phase` is in the set.
    pub fn contains(&self, phase: Phase) -> bool {
        self.0 & phase.bit() != 0
    }

    /// Add `phase`.
    pub fn insert(&mut self, phase: Phase) {
        self.0 |= phase.bit();
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl From<Phase> for PhaseSet {
    fn from(phase: Phase) -> Self {
        PhaseSet(phase.bit())
    }
}

impl BitOr for PhaseSet {
    type Output = PhaseSet;

    fn bitor(self, rhs: PhaseSet) -> PhaseSet {
        PhaseSet(self.0 | rhs.0)
    }
}

impl BitOr<Phase> for PhaseSet {
    type Output = PhaseSet;

    fn bitor(self, rhs: Phase) -> PhaseSet {
        PhaseSet(self.0 | rhs.bit())
    }
}

/// A phase failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("contract {contract} failed in {phase}: {source}")]
pub struct PhaseError {
    /// Contract name
    pub contract: String,
    /// Failing phase
    pub phase: Phase,
    /// Underlying failure
    #[source]
    pub source: RuntimeError,
}

/// Handle to an installed (or attached) contract.
#[derive(Debug, Clone)]
pub struct Contract {
    name: String,
    called: PhaseSet,
    info: Arc<ContractInfo>,
    object: Arc<Object>,
}

impl Contract {
    /// Wrap a contract object; `None` for functions.
    pub fn new(object: Arc<Object>) -> Option<Self> {
        let info = Arc::clone(object.as_contract()?);
        Some(Self {
            name: object.name.clone(),
            called: PhaseSet::NONE,
            info,
            object,
        })
    }

    /// Contract name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object id.
    pub fn id(&self) -> ObjectId {
        self.object.id
    }

    /// Underlying object.
    pub fn object(&self) -> &Arc<Object> {
        &self.object
    }

    /// Contract data.
    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    /// Declared transaction fields.
    pub fn tx_fields(&self) -> &[TxField] {
        &self.info.tx_fields
    }

    /// Phases completed by this handle so far.
    pub fn called(&self) -> PhaseSet {
        self.called
    }

    /// Compiled body of nested function `name`.
    pub fn function(&self, name: &str) -> Option<Arc<CompiledBlock>> {
        self.info
            .functions
            .get(name)
            .and_then(|object| object.as_function())
            .map(|info| Arc::clone(&info.block))
    }

    /// Run the requested phases in order against `extend`.
    ///
    /// Phases the contract does not declare are skipped. Stops at the first
    /// failure.
    pub fn call(
        &mut self,
        runtime: &mut Runtime,
        phases: PhaseSet,
        extend: &mut ExtendMap,
    ) -> Result<(), PhaseError> {
        for phase in Phase::ALL {
            if !phases.contains(phase) {
                continue;
            }
            let Some(block) = self.function(phase.function_name()) else {
                debug!(contract = %self.name, %phase, "Phase not declared, skipping");
                continue;
            };

            runtime
                .run_in(&block, Vec::new(), extend, Some(&self.object))
                .map_err(|source| PhaseError {
                    contract: self.name.clone(),
                    phase,
                    source,
                })?;
            self.called.insert(phase);
            debug!(contract = %self.name, %phase, steps = runtime.steps(), "Phase completed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_set() {
        let mut set = PhaseSet::from(Phase::Init) | Phase::Main;
        assert_eq!(set.bits(), CALL_INIT | CALL_MAIN);
        assert!(set.contains(Phase::Main));
        assert!(!set.contains(Phase::Front));

        set.insert(Phase::Front);
        assert_eq!(set, PhaseSet::ALL);
        assert_eq!(PhaseSet::from_bits(0xff), PhaseSet::ALL);
    }

    #[test]
    fn test_phase_order() {
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.function_name()).collect();
        assert_eq!(names, vec!["init", "front", "main"]);
    }
}
