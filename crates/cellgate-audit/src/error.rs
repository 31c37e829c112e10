use thiserror::Error;

/// Chain verification failures, reported at the first offending event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("event {index}: expected sequence {expected}, found {found}")]
    SequenceGap {
        index: usize,
        expected: u64,
        found: u64,
    },

    #[error("event {index}: previous hash does not match the chain")]
    BrokenLink { index: usize },

    #[error("event {index}: stored hash does not match its fields")]
    HashMismatch { index: usize },
}

impl LedgerError {
    /// Position of the first event that failed verification.
    pub fn index(&self) -> usize {
        match self {
            LedgerError::SequenceGap { index, .. }
            | LedgerError::BrokenLink { index }
            | LedgerError::HashMismatch { index } => *index,
        }
    }
}
