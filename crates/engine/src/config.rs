use crate::error::{EngineError, Result};
use outliner_labeler::{SessionProfile, DEFAULT_INSTRUCTIONS};
use std::time::Duration;

/// How many chunks one labeling batch covers.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// How long a jump's transient span markers stay up.
pub const DEFAULT_JUMP_MARKER_TTL: Duration = Duration::from_secs(3);

/// Tunables for one page instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Labels are requested this many chunks at a time; the first batch runs
    /// right after segmentation, the rest on consumer demand.
    pub batch_size: usize,
    /// Lifetime of the visual markers a jump places at the target section's
    /// start and at the following section's start.
    pub jump_marker_ttl: Duration,
    /// Session parameters handed to the labeling backend.
    pub profile: SessionProfile,
    /// Instructions repeated on every labeling call.
    pub instructions: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            jump_marker_ttl: DEFAULT_JUMP_MARKER_TTL,
            profile: SessionProfile::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EngineError::invalid_config("batch_size must be at least 1"));
        }
        if self.jump_marker_ttl.is_zero() {
            return Err(EngineError::invalid_config(
                "jump_marker_ttl must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = EngineConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().expect_err("must fail");
        assert!(err.to_string().contains("batch_size"));
    }
}
