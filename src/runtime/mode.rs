//! Translation of the strict/loose flag into a concrete error policy.

use crate::runtime::options::{Mode, ThresholdAction, TransformOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Return the first error and abort the transform.
    Throw,
    /// Log the error and continue without the failing visitor's result.
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorVerbosity {
    Minimal,
    Standard,
    Detailed,
}

/// Error policy derived once per transform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    pub error_handling: ErrorHandling,
    pub error_verbosity: ErrorVerbosity,
    pub error_threshold: usize,
    pub threshold_exceeded_action: ThresholdAction,
}

impl ModeConfig {
    /// # Examples
    ///
    /// ```rust
    /// use docweave::TransformOptions;
    /// use docweave::runtime::mode::{ErrorHandling, ModeConfig};
    /// let cfg = ModeConfig::from_options(&TransformOptions::new().strict());
    /// assert_eq!(cfg.error_handling, ErrorHandling::Throw);
    /// assert_eq!(cfg.error_threshold, 3);
    /// ```
    pub fn from_options(options: &TransformOptions) -> Self {
        let (error_handling, error_verbosity) = match options.mode() {
            Mode::Strict => (ErrorHandling::Throw, ErrorVerbosity::Detailed),
            Mode::Loose => (ErrorHandling::Warn, ErrorVerbosity::Standard),
        };
        Self {
            error_handling,
            error_verbosity,
            error_threshold: options.error_threshold().max(1),
            threshold_exceeded_action: options.threshold_exceeded_action(),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.error_handling == ErrorHandling::Throw
    }
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self::from_options(&TransformOptions::default())
    }
}
