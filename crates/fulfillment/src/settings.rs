use domain::otp::{DEFAULT_CODE_LENGTH, DEFAULT_TTL_MINUTES};
use domain::order::DEFAULT_CANCELLATION_WINDOW_MINUTES;

/// Tunables of the order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Minutes after placement during which the customer may cancel.
    pub cancellation_window_minutes: i64,

    pub verification_code_ttl_minutes: i64,

    pub verification_code_length: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cancellation_window_minutes: DEFAULT_CANCELLATION_WINDOW_MINUTES,
            verification_code_ttl_minutes: DEFAULT_TTL_MINUTES,
            verification_code_length: DEFAULT_CODE_LENGTH,
        }
    }
}
