//! courseprobe: polling and state detection for end-to-end assignment tests
//!
//! Drives a multi-step e-learning assignment (login, analytics workspace,
//! assignment window, nested iframes and shadow-DOM components) and confirms
//! each progress checkpoint before moving on.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  courseprobe Architecture                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐          │
//! │   │ Flow       │    │ Executor   │    │ Session    │          │
//! │   │ (states,   │───►│ (native +  │───►│ (chromium  │          │
//! │   │  checks)   │    │ fallback)  │    │  or mock)  │          │
//! │   └─────┬──────┘    └────────────┘    └─────▲──────┘          │
//! │         │           ┌────────────┐    ┌─────┴──────┐          │
//! │         └──────────►│ Poller     │───►│ Evaluator  │          │
//! │                     │ (deadline) │    │ (probes)   │          │
//! │                     └────────────┘    └────────────┘          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use courseprobe::clock::FakeClock;
//! use courseprobe::flow::{AssignmentFlow, FlowState};
//! use courseprobe::mock::{AppOptions, AssignmentApp};
//!
//! let clock = FakeClock::shared();
//! let options = AppOptions::new();
//! let credentials = options.credentials().clone();
//! let mut session = AssignmentApp::session(options, clock.clone());
//!
//! let mut flow = AssignmentFlow::new("https://app.test/", credentials, clock);
//! flow.run(&mut session).unwrap();
//! assert_eq!(flow.state(), FlowState::ResultsShown);
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

#[cfg(feature = "browser")]
pub mod browser;
pub mod clock;
pub mod config;
pub mod evaluator;
pub mod executor;
pub mod flow;
pub mod locator;
pub mod mock;
pub mod observation;
pub mod probe;
pub mod report;
pub mod result;
pub mod session;
pub mod wait;

#[cfg(feature = "browser")]
pub use browser::ChromiumSession;
pub use clock::{Clock, FakeClock, SharedClock, SystemClock};
pub use config::{ConfigSource, Credentials, RunConfig};
pub use evaluator::{ElementCondition, PercentSource};
pub use executor::{Action, Executor, RadioOutcome, ShadowClickOutcome, ShadowClickPolicy};
pub use flow::{AssignmentFlow, Checkpoint, FlowState, FlowTimeouts};
pub use locator::{Locator, Selector};
pub use observation::{Observation, UNKNOWN_PERCENT};
pub use probe::{Probe, ScrollReport};
pub use report::{FlowReport, StepRecord, StepStatus};
pub use result::{ProbeError, ProbeResult};
pub use session::{
    BrowserKind, DomEvent, ElementHandle, ElementState, Session, SessionConfig, SessionGuard,
    WindowHandle,
};
pub use wait::{Poller, WaitSpec};
