use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything the simulation core can refuse.
///
/// Conditions inside the per-particle kernel (coincident points, overshooting
/// the volume) are handled locally and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The initial particle population is empty or carries non-finite values.
    #[error("invalid population: {0}")]
    InvalidPopulation(String),

    #[error("collider list has {given} entries but at most {max} are configured")]
    TooManyColliders { given: usize, max: usize },

    #[error("invalid collider in slot {index}: {reason}")]
    InvalidCollider { index: usize, reason: &'static str },

    #[error("invalid simulation time {0}")]
    InvalidTime(f32),

    /// The execution backend could not be built. Fatal for the stage.
    #[error("failed to build simulation kernel: {0}")]
    KernelConstruction(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to encode particle buffer: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collider_overflow_message_names_both_counts() {
        let e = Error::TooManyColliders { given: 9, max: 8 };
        let msg = format!("{e}");
        assert!(msg.contains('9'));
        assert!(msg.contains('8'));
    }

    #[test]
    fn config_message_is_prefixed() {
        let e = Error::InvalidConfig("max_colliders must be at least 1".to_string());
        assert!(format!("{e}").starts_with("invalid configuration"));
    }
}
