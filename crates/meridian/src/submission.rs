//! Transaction submission
//!
//! A transaction names a contract and carries typed field values. Processing
//! looks the contract up, runs `init`, `front` and `main` against the field
//! values, then encodes the declared fields into the canonical payload that
//! goes into a block.
//!
//! Failures in `init` or `front` reject the transaction; the submitter gets
//! the error back and nothing is recorded. A failure in `main` means the
//! contract accepted the transaction and then could not apply it, so it is
//! escalated and logged as an error.

use meridian_types::H256;
use meridian_vm::{encode, ExtendMap, FieldEncodingError, Phase, PhaseSet, RuntimeError, Vm};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that can occur while processing a transaction
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No contract with this name is installed
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// The contract refused the transaction in `init` or `front`
    #[error("transaction rejected by {contract} in {phase}: {source}")]
    Rejected {
        /// Contract name
        contract: String,
        /// Failing phase
        phase: Phase,
        /// Contract error
        #[source]
        source: RuntimeError,
    },

    /// `main` failed after the transaction was accepted
    #[error("contract {contract} failed in main: {source}")]
    Escalated {
        /// Contract name
        contract: String,
        /// Contract error
        #[source]
        source: RuntimeError,
    },

    /// Field values do not match the declared transaction fields
    #[error("cannot encode transaction for {contract}: {source}")]
    Encoding {
        /// Contract name
        contract: String,
        /// Codec error
        #[source]
        source: FieldEncodingError,
    },
}

impl SubmitError {
    /// Whether the submitter caused the failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, SubmitError::Escalated { .. })
    }
}

/// A transaction that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTx {
    /// Contract name
    pub contract: String,
    /// Canonical field encoding
    pub payload: String,
    /// Keccak256 of the payload
    pub hash: H256,
}

/// Runs submitted transactions through their contracts.
#[derive(Clone)]
pub struct TxProcessor {
    vm: Arc<Vm>,
}

impl TxProcessor {
    /// Create a processor over `vm`.
    pub fn new(vm: Arc<Vm>) -> Self {
        Self { vm }
    }

    /// The VM transactions run in.
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    /// Run contract `name` with `fields` and encode the result.
    ///
    /// The payload is built from `fields` after all phases ran, so values a
    /// contract writes to its own fields are recorded.
    pub fn process(&self, name: &str, mut fields: ExtendMap) -> Result<ProcessedTx, SubmitError> {
        let mut contract = self
            .vm
            .lookup_by_name(name)
            .ok_or_else(|| SubmitError::UnknownContract(name.to_string()))?;

        let mut runtime = self.vm.new_runtime();
        if let Err(err) = contract.call(&mut runtime, PhaseSet::ALL, &mut fields) {
            return Err(match err.phase {
                Phase::Init | Phase::Front => {
                    info!(contract = %err.contract, phase = %err.phase, error = %err.source, "Transaction rejected");
                    SubmitError::Rejected {
                        contract: err.contract,
                        phase: err.phase,
                        source: err.source,
                    }
                }
                Phase::Main => {
                    error!(contract = %err.contract, error = %err.source, "Contract main failed");
                    SubmitError::Escalated {
                        contract: err.contract,
                        source: err.source,
                    }
                }
            });
        }

        let payload = encode(contract.info(), &fields).map_err(|source| SubmitError::Encoding {
            contract: name.to_string(),
            source,
        })?;
        let hash = H256::keccak256(payload.as_bytes());

        debug!(contract = %name, steps = runtime.steps(), hash = %hash, "Transaction processed");

        Ok(ProcessedTx {
            contract: name.to_string(),
            payload,
            hash,
        })
    }
}
