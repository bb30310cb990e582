// (c) Roel Kluin, 2023, GPL v3

use derive_more::Display;

/// Failures that callers may want to tell apart. They travel inside
/// `anyhow::Error`; use `downcast_ref::<LtrError>()` to inspect them.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum LtrError {
    #[display(fmt = "could not allocate {} ({} entries)", what, entries)]
    AllocationFailure { what: &'static str, entries: u64 },

    #[display(fmt = "invalid motif: {}", _0)]
    InvalidMotif(String),

    #[display(fmt = "invalid configuration: {}", _0)]
    InvalidConfig(String),

    #[display(fmt = "internal invariant violated: {}", _0)]
    InvariantViolation(String),
}

impl std::error::Error for LtrError {}

impl LtrError {
    pub(crate) fn alloc(what: &'static str, entries: u64) -> Self {
        LtrError::AllocationFailure { what, entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn fails() -> Result<()> {
        Err(LtrError::InvalidMotif("tx".to_string()).into())
    }

    #[test]
    fn downcast() {
        let err = fails().unwrap_err();
        assert_eq!(
            err.downcast_ref::<LtrError>(),
            Some(&LtrError::InvalidMotif("tx".to_string()))
        );
        assert_eq!(err.to_string(), "invalid motif: tx");
    }
}
