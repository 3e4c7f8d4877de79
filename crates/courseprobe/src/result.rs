//! Result and error types for courseprobe.

use crate::flow::FlowState;
use thiserror::Error;

/// Result type for courseprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a session
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No element matched the locator
    #[error("No element matches {locator}")]
    NoSuchElement {
        /// Locator description
        locator: String,
    },

    /// Selector could not be parsed or is unsupported by the session
    #[error("Invalid selector {selector}: {message}")]
    InvalidSelector {
        /// Selector text
        selector: String,
        /// Error message
        message: String,
    },

    /// Element handle no longer refers to a live element in the current context
    #[error("Stale element handle {handle}")]
    StaleElement {
        /// Handle id
        handle: String,
    },

    /// Element exists but cannot receive native input
    #[error("Element not interactable: {message}")]
    NotInteractable {
        /// Error message
        message: String,
    },

    /// Frame could not be entered
    #[error("No such frame: {message}")]
    NoSuchFrame {
        /// Error message
        message: String,
    },

    /// Window handle unknown to the session
    #[error("No such window: {handle}")]
    NoSuchWindow {
        /// Window handle
        handle: String,
    },

    /// Probe evaluation failed inside the renderer
    #[error("Probe {probe} failed: {message}")]
    Script {
        /// Probe name
        probe: String,
        /// Error message
        message: String,
    },

    /// Condition never held within the time budget
    #[error("Timed out after {elapsed_ms}ms waiting for {condition} (last observation: {last_observation})")]
    Timeout {
        /// Description of the unmet condition
        condition: String,
        /// Debug rendering of the last observed value
        last_observation: String,
        /// Time spent waiting
        elapsed_ms: u64,
    },

    /// Observed value contradicts an expected literal
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// A flow transition failed; the flow is aborted
    #[error("Flow aborted while entering {step}: {source}")]
    StepFailed {
        /// State the flow was trying to reach
        step: FlowState,
        /// Underlying failure
        #[source]
        source: Box<ProbeError>,
    },

    /// Required configuration missing or malformed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Browser kind not supported
    #[error("Unsupported browser: {kind}")]
    UnsupportedBrowser {
        /// Requested browser kind
        kind: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Session-level failure (connection lost, session closed)
    #[error("Session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Create a no-such-element error
    #[must_use]
    pub fn no_such_element(locator: impl Into<String>) -> Self {
        Self::NoSuchElement {
            locator: locator.into(),
        }
    }

    /// Create an invalid-selector error
    #[must_use]
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create a not-interactable error
    #[must_use]
    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::NotInteractable {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a session error
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a probe script error
    #[must_use]
    pub fn script(probe: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Script {
            probe: probe.into(),
            message: message.into(),
        }
    }

    /// Wrap this error as the failure of a flow step
    #[must_use]
    pub fn at_step(self, step: FlowState) -> Self {
        Self::StepFailed {
            step,
            source: Box::new(self),
        }
    }

    /// Transient-not-ready errors are retried by the poller and never surface
    /// from a successful wait.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoSuchElement { .. }
                | Self::StaleElement { .. }
                | Self::NotInteractable { .. }
                | Self::NoSuchFrame { .. }
                | Self::Script { .. }
        )
    }

    /// Timeout, possibly wrapped in a step failure
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::StepFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Structural assertion failure, possibly wrapped in a step failure
    #[must_use]
    pub fn is_assertion(&self) -> bool {
        match self {
            Self::AssertionFailed { .. } => true,
            Self::StepFailed { source, .. } => source.is_assertion(),
            _ => false,
        }
    }

    /// Environment/setup failure raised before any flow step runs
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::UnsupportedBrowser { .. } | Self::BrowserLaunch { .. }
        )
    }

    /// Step at which the flow failed, if any
    #[must_use]
    pub const fn failed_step(&self) -> Option<FlowState> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}
