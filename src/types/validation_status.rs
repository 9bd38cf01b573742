use std::fmt;

use serde::{Deserialize, Serialize};

/// What is known about the current credential.
///
/// Starts out `Unknown`, returns to `Unknown` whenever the credential text
/// changes, and becomes `Valid` or `Invalid` only when a probe finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// No probe has completed for the current credential.
    #[default]
    Unknown,
    /// The provider accepted the credential.
    Valid,
    /// The credential is empty or the provider rejected it.
    Invalid,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Unknown => f.write_str("unknown"),
            ValidationStatus::Valid => f.write_str("valid"),
            ValidationStatus::Invalid => f.write_str("invalid"),
        }
    }
}
