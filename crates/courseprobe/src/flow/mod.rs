//! Flow orchestrator.
//!
//! A linear state machine over the assignment run. Every transition acts
//! through the [`Executor`] and is only taken once a [`Poller`] check
//! re-observes the expected page state; the first failure aborts the run as
//! [`ProbeError::StepFailed`] naming the state being entered.
//!
//! ```text
//! LoggedOut → LoggedIn → MenuOpen → AnalyticsWorkspace → AssignmentWindowOpen
//!   → ModuleStarted(0%) → Scrolled(33%) → Advanced(34%) → QuestionAnswered(75%)
//!   → TextEntered(83%) → FinalQuestionAnswered(91%) → Group2Selected
//!   → FinalAnswerSelected(100%) → Completed → Submitted → ResultsShown
//! ```

pub mod assignment;
pub mod login;
pub mod navigation;

use crate::clock::SharedClock;
use crate::config::Credentials;
use crate::executor::{Executor, ShadowClickPolicy};
use crate::observation::{percent_token, Observation};
use crate::report::FlowReport;
use crate::result::{ProbeError, ProbeResult};
use crate::session::Session;
use crate::wait::{Poller, WaitSpec, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// The orchestrator's view of the remote application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Nothing done yet
    LoggedOut,
    /// Landing page shows the navigation menu
    LoggedIn,
    /// Navigation menu shows the analytics entry
    MenuOpen,
    /// Inside the analytics workspace frame
    AnalyticsWorkspace,
    /// Switched to the assignment window
    AssignmentWindowOpen,
    /// Module started at 0%
    ModuleStarted,
    /// Scrolled to the bottom, 33%
    Scrolled,
    /// First "Next", above 33%
    Advanced,
    /// First radio answered, 75%
    QuestionAnswered,
    /// Free text entered, 83%
    TextEntered,
    /// Second radio answered, 91%
    FinalQuestionAnswered,
    /// Second group open
    Group2Selected,
    /// Last answer given, bar at 100%
    FinalAnswerSelected,
    /// Completion requested
    Completed,
    /// Answers submitted
    Submitted,
    /// Results page visible
    ResultsShown,
}

impl FlowState {
    /// Every state in flow order
    pub const ALL: [Self; 16] = [
        Self::LoggedOut,
        Self::LoggedIn,
        Self::MenuOpen,
        Self::AnalyticsWorkspace,
        Self::AssignmentWindowOpen,
        Self::ModuleStarted,
        Self::Scrolled,
        Self::Advanced,
        Self::QuestionAnswered,
        Self::TextEntered,
        Self::FinalQuestionAnswered,
        Self::Group2Selected,
        Self::FinalAnswerSelected,
        Self::Completed,
        Self::Submitted,
        Self::ResultsShown,
    ];

    /// State name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LoggedOut => "LoggedOut",
            Self::LoggedIn => "LoggedIn",
            Self::MenuOpen => "MenuOpen",
            Self::AnalyticsWorkspace => "AnalyticsWorkspace",
            Self::AssignmentWindowOpen => "AssignmentWindowOpen",
            Self::ModuleStarted => "ModuleStarted",
            Self::Scrolled => "Scrolled",
            Self::Advanced => "Advanced",
            Self::QuestionAnswered => "QuestionAnswered",
            Self::TextEntered => "TextEntered",
            Self::FinalQuestionAnswered => "FinalQuestionAnswered",
            Self::Group2Selected => "Group2Selected",
            Self::FinalAnswerSelected => "FinalAnswerSelected",
            Self::Completed => "Completed",
            Self::Submitted => "Submitted",
            Self::ResultsShown => "ResultsShown",
        }
    }

    /// The state after this one
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// Whether this is the last state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ResultsShown)
    }

    /// Progress checkpoint verified on entering this state
    #[must_use]
    pub fn checkpoint(self) -> Option<&'static Checkpoint> {
        CHECKPOINTS.iter().find(|c| c.state == self)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a checkpoint value is verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Percentage equals the value
    Equals,
    /// Percentage is at least the value
    AtLeast,
    /// Progress text contains the `"N%"` token
    ContainsToken,
}

/// A progress value the flow must observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State entered once the checkpoint holds
    pub state: FlowState,
    /// Percentage
    pub value: u8,
    /// Verification
    pub comparison: Comparison,
}

impl Checkpoint {
    /// Text token for [`Comparison::ContainsToken`] checkpoints
    #[must_use]
    pub fn token(&self) -> String {
        percent_token(self.value)
    }

    /// Whether a numeric observation satisfies the checkpoint
    #[must_use]
    pub fn accepts(&self, percent: i32) -> bool {
        match self.comparison {
            Comparison::Equals => percent == i32::from(self.value),
            Comparison::AtLeast | Comparison::ContainsToken => percent >= i32::from(self.value),
        }
    }
}

/// Progress checkpoints in flow order
pub const CHECKPOINTS: [Checkpoint; 7] = [
    Checkpoint {
        state: FlowState::ModuleStarted,
        value: 0,
        comparison: Comparison::Equals,
    },
    Checkpoint {
        state: FlowState::Scrolled,
        value: 33,
        comparison: Comparison::AtLeast,
    },
    Checkpoint {
        state: FlowState::Advanced,
        value: 34,
        comparison: Comparison::AtLeast,
    },
    Checkpoint {
        state: FlowState::QuestionAnswered,
        value: 75,
        comparison: Comparison::ContainsToken,
    },
    Checkpoint {
        state: FlowState::TextEntered,
        value: 83,
        comparison: Comparison::ContainsToken,
    },
    Checkpoint {
        state: FlowState::FinalQuestionAnswered,
        value: 91,
        comparison: Comparison::ContainsToken,
    },
    Checkpoint {
        state: FlowState::FinalAnswerSelected,
        value: 100,
        comparison: Comparison::Equals,
    },
];

/// Checkpoint for a state, or an error naming the state
pub(crate) fn checkpoint_for(state: FlowState) -> ProbeResult<&'static Checkpoint> {
    state
        .checkpoint()
        .ok_or_else(|| ProbeError::assertion(format!("no progress checkpoint for {state}")))
}

/// Wait budgets for the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimeouts {
    /// Budget for login page waits
    pub login: Duration,
    /// Budget for every other wait
    pub step: Duration,
    /// Poll interval
    pub poll: Duration,
}

impl Default for FlowTimeouts {
    fn default() -> Self {
        Self {
            login: Duration::from_secs(15),
            step: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl FlowTimeouts {
    /// Set the login budget in milliseconds
    #[must_use]
    pub const fn with_login_timeout(mut self, ms: u64) -> Self {
        self.login = Duration::from_millis(ms);
        self
    }

    /// Set the step budget in milliseconds
    #[must_use]
    pub const fn with_step_timeout(mut self, ms: u64) -> Self {
        self.step = Duration::from_millis(ms);
        self
    }

    /// Set the poll interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll = Duration::from_millis(ms);
        self
    }

    fn spec(budget: Duration, poll: Duration) -> WaitSpec {
        WaitSpec::new()
            .with_timeout(u64::try_from(budget.as_millis()).unwrap_or(u64::MAX))
            .with_poll_interval(u64::try_from(poll.as_millis()).unwrap_or(u64::MAX))
    }

    /// Wait spec for the login page
    #[must_use]
    pub fn login_spec(&self) -> WaitSpec {
        Self::spec(self.login, self.poll)
    }

    /// Wait spec for every other step
    #[must_use]
    pub fn step_spec(&self) -> WaitSpec {
        Self::spec(self.step, self.poll)
    }
}

/// Executors shared by the step functions
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Executor with the login budget
    pub login: Executor,
    /// Executor with the step budget
    pub step: Executor,
}

impl StepContext {
    /// Build executors over one clock
    #[must_use]
    pub fn new(clock: SharedClock, timeouts: &FlowTimeouts, policy: ShadowClickPolicy) -> Self {
        let poller = Poller::new(clock);
        Self {
            login: Executor::new(poller.clone(), timeouts.login_spec()).with_shadow_policy(policy),
            step: Executor::new(poller, timeouts.step_spec()).with_shadow_policy(policy),
        }
    }

    /// The poller both executors share
    #[must_use]
    pub fn poller(&self) -> &Poller {
        self.step.poller()
    }

    /// The step wait budget
    #[must_use]
    pub fn spec(&self) -> &WaitSpec {
        self.step.spec()
    }
}

/// Drives one assignment run against a session
#[derive(Debug)]
pub struct AssignmentFlow {
    base_url: String,
    credentials: Credentials,
    clock: SharedClock,
    context: StepContext,
    state: FlowState,
    report: FlowReport,
}

impl AssignmentFlow {
    /// Flow with default timeouts and shadow-click policy
    #[must_use]
    pub fn new(base_url: impl Into<String>, credentials: Credentials, clock: SharedClock) -> Self {
        let base_url = base_url.into();
        let context = StepContext::new(
            clock.clone(),
            &FlowTimeouts::default(),
            ShadowClickPolicy::default(),
        );
        Self {
            report: FlowReport::new(&base_url),
            base_url,
            credentials,
            clock,
            context,
            state: FlowState::LoggedOut,
        }
    }

    /// Replace the wait budgets and shadow-click policy
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: FlowTimeouts, policy: ShadowClickPolicy) -> Self {
        self.context = StepContext::new(self.clock.clone(), &timeouts, policy);
        self
    }

    /// Last state reached
    #[must_use]
    pub const fn state(&self) -> FlowState {
        self.state
    }

    /// Record of the transitions so far
    #[must_use]
    pub const fn report(&self) -> &FlowReport {
        &self.report
    }

    /// Consume the flow, keeping its report
    #[must_use]
    pub fn into_report(self) -> FlowReport {
        self.report
    }

    /// Run every transition in order.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::StepFailed`] for the first transition whose
    /// action or confirmation fails. The flow does not resume.
    pub fn run(&mut self, session: &mut dyn Session) -> ProbeResult<()> {
        info!(base_url = %self.base_url, "starting assignment flow");
        let base_url = self.base_url.clone();
        let credentials = self.credentials.clone();
        let result = self.run_transitions(session, &base_url, &credentials);
        self.report.finish(self.state, result.as_ref().err());
        match &result {
            Ok(()) => info!(state = %self.state, "assignment flow completed"),
            Err(e) => warn!(state = %self.state, error = %e, "assignment flow failed"),
        }
        result
    }

    fn run_transitions(
        &mut self,
        session: &mut dyn Session,
        base_url: &str,
        credentials: &Credentials,
    ) -> ProbeResult<()> {
        self.transition(session, FlowState::LoggedIn, |ctx, s| {
            login::log_in(ctx, s, base_url, credentials)
        })?;
        self.transition(session, FlowState::MenuOpen, navigation::open_menu)?;
        self.transition(session, FlowState::AnalyticsWorkspace, navigation::enter_workspace)?;
        self.transition(
            session,
            FlowState::AssignmentWindowOpen,
            navigation::open_assignment_window,
        )?;
        self.transition(session, FlowState::ModuleStarted, assignment::start_module)?;
        self.transition(session, FlowState::Scrolled, assignment::scroll_lesson)?;
        self.transition(session, FlowState::Advanced, assignment::advance)?;
        self.transition(session, FlowState::QuestionAnswered, assignment::answer_first_question)?;
        self.transition(session, FlowState::TextEntered, assignment::enter_text_answer)?;
        self.transition(
            session,
            FlowState::FinalQuestionAnswered,
            assignment::answer_final_question,
        )?;
        self.transition(session, FlowState::Group2Selected, assignment::open_group_two)?;
        self.transition(
            session,
            FlowState::FinalAnswerSelected,
            assignment::select_final_answer,
        )?;
        self.transition(session, FlowState::Completed, assignment::complete_assignment)?;
        self.transition(session, FlowState::Submitted, assignment::submit_answers)?;
        self.transition(session, FlowState::ResultsShown, assignment::confirm_results)
    }

    fn transition<F>(
        &mut self,
        session: &mut dyn Session,
        target: FlowState,
        act: F,
    ) -> ProbeResult<()>
    where
        F: FnOnce(&StepContext, &mut dyn Session) -> ProbeResult<Observation>,
    {
        let started = self.clock.now();
        info!(from = %self.state, to = %target, "entering step");
        let outcome = act(&self.context, session);
        let elapsed = self.clock.now().saturating_sub(started);
        match outcome {
            Ok(observation) => {
                info!(
                    state = %target,
                    %observation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "step confirmed"
                );
                self.report.record_pass(target, elapsed, observation);
                self.state = target;
                Ok(())
            }
            Err(e) => {
                let error = e.at_step(target);
                warn!(state = %target, error = %error, "step failed");
                self.report.record_failure(target, elapsed, &error);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod state_tests {
        use super::*;

        #[test]
        fn test_sixteen_states_in_order() {
            assert_eq!(FlowState::ALL.len(), 16);
            assert_eq!(FlowState::ALL[0], FlowState::LoggedOut);
            assert!(FlowState::ALL.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn test_next_walks_the_chain() {
            let mut state = FlowState::LoggedOut;
            let mut steps = 0;
            while let Some(next) = state.next() {
                state = next;
                steps += 1;
            }
            assert_eq!(steps, 15);
            assert!(state.is_terminal());
        }

        #[test]
        fn test_display_and_serde() {
            assert_eq!(FlowState::Group2Selected.to_string(), "Group2Selected");
            assert_eq!(
                serde_json::to_string(&FlowState::QuestionAnswered).unwrap(),
                "\"question_answered\""
            );
        }
    }

    mod checkpoint_tests {
        use super::*;

        #[test]
        fn test_checkpoints_are_monotonic() {
            let values: Vec<u8> = CHECKPOINTS.iter().map(|c| c.value).collect();
            assert_eq!(values, vec![0, 33, 34, 75, 83, 91, 100]);
            assert!(values.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn test_checkpoint_states_follow_flow_order() {
            assert!(CHECKPOINTS.windows(2).all(|w| w[0].state < w[1].state));
        }

        #[test]
        fn test_tokens() {
            let answered = FlowState::QuestionAnswered.checkpoint().unwrap();
            assert_eq!(answered.token(), "75%");
            assert!(FlowState::MenuOpen.checkpoint().is_none());
            assert!(checkpoint_for(FlowState::MenuOpen).unwrap_err().is_assertion());
        }

        #[test]
        fn test_equality_checkpoint() {
            let start = FlowState::ModuleStarted.checkpoint().unwrap();
            assert!(start.accepts(0));
            assert!(!start.accepts(1));
            assert!(!start.accepts(-1));
        }

        proptest! {
            #[test]
            fn prop_at_least_accepts_everything_above(value in 0u8..=100, extra in 0i32..100) {
                let cp = Checkpoint {
                    state: FlowState::Scrolled,
                    value,
                    comparison: Comparison::AtLeast,
                };
                prop_assert!(cp.accepts(i32::from(value) + extra));
                prop_assert!(!cp.accepts(i32::from(value) - 1));
            }
        }
    }

    mod timeout_tests {
        use super::*;

        #[test]
        fn test_default_budgets() {
            let timeouts = FlowTimeouts::default();
            assert_eq!(timeouts.login, Duration::from_secs(15));
            assert_eq!(timeouts.step, Duration::from_secs(20));
            assert_eq!(timeouts.step_spec().poll_interval(), Duration::from_millis(500));
            assert_eq!(timeouts.login_spec().timeout(), Duration::from_secs(15));
        }

        #[test]
        fn test_builders() {
            let timeouts = FlowTimeouts::default()
                .with_login_timeout(1_000)
                .with_step_timeout(2_000)
                .with_poll_interval(100);
            assert_eq!(timeouts.step_spec().timeout(), Duration::from_secs(2));
            assert_eq!(timeouts.login_spec().poll_interval(), Duration::from_millis(100));
        }
    }
}
