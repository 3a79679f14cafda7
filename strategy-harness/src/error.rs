use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Call reverted: {call}: {reason}")]
    Reverted { call: String, reason: String },

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Invariant violated [{check}]: {detail}")]
    Invariant { check: &'static str, detail: String },

    #[error("Anvil error: {0}")]
    Anvil(String),
}

impl HarnessError {
    /// True when the error means the environment is missing something a fork
    /// test needs (RPC URL, compiled artifacts), as opposed to a real failure.
    pub fn is_missing_environment(&self) -> bool {
        matches!(self, HarnessError::Artifact(_))
            || matches!(self, HarnessError::Config(msg) if msg.contains("FORK_RPC_URL"))
    }
}

impl From<alloy::transports::TransportError> for HarnessError {
    fn from(e: alloy::transports::TransportError) -> Self {
        HarnessError::Rpc(e.to_string())
    }
}

impl From<alloy::contract::Error> for HarnessError {
    fn from(e: alloy::contract::Error) -> Self {
        HarnessError::Rpc(e.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        HarnessError::Artifact(e.to_string())
    }
}

/// Return early with [`HarnessError::Invariant`] when `cond` does not hold.
#[macro_export]
macro_rules! ensure_invariant {
    ($cond:expr, $check:literal, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HarnessError::Invariant {
                check: $check,
                detail: format!($($arg)+),
            });
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(value: u64) -> Result<(), HarnessError> {
        ensure_invariant!(value > 0, "positive", "value was {value}");
        Ok(())
    }

    #[test]
    fn test_ensure_invariant_passes() {
        assert!(checked(1).is_ok());
    }

    #[test]
    fn test_ensure_invariant_reports_check_and_detail() {
        let err = checked(0).unwrap_err();
        match err {
            HarnessError::Invariant { check, detail } => {
                assert_eq!(check, "positive");
                assert_eq!(detail, "value was 0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_environment_classification() {
        assert!(HarnessError::Artifact("no TheVault".into()).is_missing_environment());
        assert!(HarnessError::Config("FORK_RPC_URL is not set".into()).is_missing_environment());
        assert!(!HarnessError::Setup("whale is empty".into()).is_missing_environment());
    }
}
