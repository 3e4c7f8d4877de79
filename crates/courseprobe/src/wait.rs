//! Poller: bounded waiting for page conditions.
//!
//! The poller is the only place that decides *when* to look again. It
//! evaluates immediately, then once per poll interval until the predicate
//! holds or the time budget runs out, measuring time through an injected
//! [`Clock`](crate::clock::Clock).
//!
//! - Transient errors (element missing, stale, not interactable, frame not
//!   ready, probe failure) are retried and never escape a successful wait.
//! - Any other error aborts the wait immediately.
//! - A timeout returns [`ProbeError::Timeout`] carrying the condition and the
//!   last observation, never a partial value.

use crate::clock::{SharedClock, SystemClock};
use crate::evaluator::{self, ElementCondition, PercentSource};
use crate::locator::Locator;
use crate::probe::Probe;
use crate::result::{ProbeError, ProbeResult};
use crate::session::{ElementHandle, Session, WindowHandle};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default timeout for wait operations (20 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 20_000;

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Polling interval of implicit element lookups
pub const IMPLICIT_POLL_INTERVAL_MS: u64 = 100;

/// Time budget for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitSpec {
    /// Create a spec with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Set polling interval in milliseconds (at least 1ms)
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        let ms = if poll_interval_ms == 0 {
            1
        } else {
            poll_interval_ms
        };
        self.poll_interval = Duration::from_millis(ms);
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get polling interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Polls conditions against a clock
#[derive(Debug, Clone)]
pub struct Poller {
    clock: SharedClock,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(SystemClock::shared())
    }
}

impl Poller {
    /// Create a poller on the given clock
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// The poller's clock
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Evaluate until `predicate` accepts the observation or the budget runs out.
    ///
    /// The returned value always satisfies `predicate`.
    pub fn wait_until<T, E, P>(
        &self,
        spec: &WaitSpec,
        description: &str,
        mut evaluate: E,
        mut predicate: P,
    ) -> ProbeResult<T>
    where
        T: fmt::Debug,
        E: FnMut() -> ProbeResult<T>,
        P: FnMut(&T) -> bool,
    {
        let start = self.clock.now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let last_observation = match evaluate() {
                Ok(value) if predicate(&value) => {
                    let elapsed = self.clock.now().saturating_sub(start);
                    debug!(
                        condition = description,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "condition met"
                    );
                    return Ok(value);
                }
                Ok(value) => format!("{value:?}"),
                Err(e) if e.is_transient() => {
                    trace!(condition = description, error = %e, "not ready");
                    e.to_string()
                }
                Err(e) => return Err(e),
            };

            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed >= spec.timeout() {
                warn!(
                    condition = description,
                    attempts,
                    last = %last_observation,
                    "wait timed out"
                );
                return Err(ProbeError::Timeout {
                    condition: description.to_string(),
                    last_observation,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            let remaining = spec.timeout() - elapsed;
            self.clock.sleep(spec.poll_interval().min(remaining));
        }
    }

    /// Wait for the first match of `locator` to satisfy `condition`
    pub fn wait_for_element(
        &self,
        session: &mut dyn Session,
        spec: &WaitSpec,
        locator: &Locator,
        condition: ElementCondition,
    ) -> ProbeResult<ElementHandle> {
        let description = format!("{locator} to be {condition}");
        self.wait_until(
            spec,
            &description,
            || evaluator::element_matching(session, locator, condition),
            Option::is_some,
        )?
        .ok_or_else(|| ProbeError::no_such_element(locator.to_string()))
    }

    /// First match of `locator`, looked up again until `budget` runs out.
    ///
    /// Mirrors a WebDriver implicit wait: running out of budget is
    /// [`ProbeError::NoSuchElement`], not a timeout.
    pub fn find_element_within(
        &self,
        session: &mut dyn Session,
        locator: &Locator,
        budget: Duration,
    ) -> ProbeResult<ElementHandle> {
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        let spec = WaitSpec::new()
            .with_timeout(budget_ms)
            .with_poll_interval(IMPLICIT_POLL_INTERVAL_MS);
        let description = format!("{locator} to be present");
        let found = self.wait_until(
            &spec,
            &description,
            || session.find_elements(locator),
            |found| !found.is_empty(),
        );
        match found {
            Ok(found) => found.into_iter().next(),
            Err(e) if e.is_timeout() => None,
            Err(e) => return Err(e),
        }
        .ok_or_else(|| ProbeError::no_such_element(locator.to_string()))
    }

    /// Wait until the frame matched by `locator` exists, then enter it
    pub fn wait_for_frame_and_switch(
        &self,
        session: &mut dyn Session,
        spec: &WaitSpec,
        locator: &Locator,
    ) -> ProbeResult<()> {
        let description = format!("frame {locator} to be available");
        self.wait_until(
            spec,
            &description,
            || {
                let Some(frame) = session.find_elements(locator)?.into_iter().next() else {
                    return Ok(false);
                };
                session.switch_to_frame(&frame)?;
                Ok(true)
            },
            |entered| *entered,
        )?;
        debug!(frame = %locator, "switched into frame");
        Ok(())
    }

    /// Wait until exactly `count` windows are open
    pub fn wait_for_window_count(
        &self,
        session: &mut dyn Session,
        spec: &WaitSpec,
        count: usize,
    ) -> ProbeResult<Vec<WindowHandle>> {
        let description = format!("{count} open windows");
        self.wait_until(
            spec,
            &description,
            || session.window_handles(),
            |handles| handles.len() == count,
        )
    }

    /// Wait until a boolean probe evaluates to `true`
    pub fn wait_for_flag(
        &self,
        session: &mut dyn Session,
        spec: &WaitSpec,
        probe: &Probe,
    ) -> ProbeResult<()> {
        let description = probe.to_string();
        self.wait_until(
            spec,
            &description,
            || evaluator::flag(session, probe),
            |flag| *flag == Some(true),
        )
        .map(|_| ())
    }

    /// Wait until the combined progress text contains `token`
    pub fn wait_for_text(
        &self,
        session: &mut dyn Session,
        spec: &WaitSpec,
        token: &str,
    ) -> ProbeResult<()> {
        let description = format!("progress text to contain {token:?}");
        self.wait_until(
            spec,
            &description,
            || evaluator::text_contains(session, token),
            |found| *found,
        )
        .map(|_| ())
    }

    /// Wait until a percentage read from `source` reaches `threshold`
    pub fn wait_for_percent_at_least(
        &self,
        session: &mut dyn Session,
        spec: &WaitSpec,
        source: &PercentSource,
        threshold: i32,
    ) -> ProbeResult<i32> {
        let description = format!("{source} percentage >= {threshold}");
        self.wait_until(
            spec,
            &description,
            || Ok(evaluator::percent(session, source)),
            |percent| *percent >= threshold,
        )
    }
}
