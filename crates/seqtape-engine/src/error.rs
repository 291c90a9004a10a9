//! The fatal-error taxonomy of the hotpath.
//!
//! Every condition that must halt the process funnels into one enum so the
//! event loop has a single cleanup path: log, verify the balance book, dump
//! state, return.

use seqtape_models::BalanceError;
use seqtape_quant::checked::ArithmeticError;
use seqtape_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("SEQUENCE_GAP_FATAL: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("REPLAY_GAP_DETECTED: expected {expected}, got {got}")]
    ReplayMismatch { expected: u64, got: u64 },

    #[error("PERSISTENCE_FAILURE: {0}")]
    Persistence(#[from] StoreError),

    #[error("BALANCE_FAULT: {0}")]
    Balance(#[from] BalanceError),

    #[error("ARITHMETIC_FAULT: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("STRATEGY_FAULT: {0}")]
    Strategy(String),
}
