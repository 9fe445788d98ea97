//! Error taxonomy for the simulators.
//!
//! All errors are local and synchronous: the caller corrects the input or
//! the state and retries. There is no partial failure; a mutating operation
//! either fully applies or leaves the simulator untouched.

use thiserror::Error;

/// Errors raised by the image compositor and the scenario generator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// A mutating operation was attempted while the image is locked.
    #[error("image is locked; unlock it before making changes")]
    Locked,

    /// A parameter is outside its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A scenario-dependent call was made before a scenario was generated.
    #[error("no active practice scenario; call generate() first")]
    NoActiveScenario,
}
