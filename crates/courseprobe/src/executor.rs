//! DOM action executor.
//!
//! Effectful page operations. Element input tries native input first and
//! falls back to script-level invocation; shadow-scope clicks retry on a
//! bounded schedule. Fixed settle sleeps are replaced by named poller
//! conditions (`scroll.settled`, `form.radio_selected`).

use crate::evaluator::{self, ElementCondition};
use crate::locator::Locator;
use crate::probe::{Probe, ScrollReport};
use crate::result::{ProbeError, ProbeResult};
use crate::session::{DomEvent, ElementHandle, Session, WindowHandle};
use crate::wait::{Poller, WaitSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Events dispatched after typing into a form field
pub const FIELD_COMMIT_EVENTS: [DomEvent; 4] = [
    DomEvent::Input,
    DomEvent::Change,
    DomEvent::Keyup,
    DomEvent::Blur,
];

/// An input action on a located element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "text", rename_all = "snake_case")]
pub enum Action {
    /// Click
    Click,
    /// Clear the field
    Clear,
    /// Type text after any existing value
    Type(String),
    /// Clear, then type
    Replace(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => f.write_str("click"),
            Self::Clear => f.write_str("clear"),
            Self::Type(_) => f.write_str("type"),
            Self::Replace(_) => f.write_str("replace"),
        }
    }
}

/// Retry schedule for shadow-scope clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowClickPolicy {
    /// Number of attempts
    pub attempts: u32,
    /// Delay between attempts
    pub spacing: Duration,
}

impl Default for ShadowClickPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            spacing: Duration::from_secs(1),
        }
    }
}

impl ShadowClickPolicy {
    /// Set attempt count (at least one)
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = if attempts == 0 { 1 } else { attempts };
        self
    }

    /// Set spacing in milliseconds
    #[must_use]
    pub const fn with_spacing(mut self, spacing_ms: u64) -> Self {
        self.spacing = Duration::from_millis(spacing_ms);
        self
    }
}

/// Result of a shadow-scope click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowClickOutcome {
    /// A control was clicked
    Clicked {
        /// Candidate text that matched
        text: String,
        /// Attempt number, starting at 1
        attempt: u32,
    },
    /// Every attempt missed
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
}

impl ShadowClickOutcome {
    /// Whether a control was clicked
    #[must_use]
    pub const fn is_clicked(&self) -> bool {
        matches!(self, Self::Clicked { .. })
    }
}

/// How a radio answer was clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOutcome {
    /// Shadow input of a `gux-form-field-radio`
    Field,
    /// Plain label fallback
    Label,
    /// No matching radio
    NotFound,
}

/// Performs page actions, confirming readiness through a poller
#[derive(Debug, Clone, Default)]
pub struct Executor {
    poller: Poller,
    spec: WaitSpec,
    shadow_policy: ShadowClickPolicy,
}

impl Executor {
    /// Create an executor
    #[must_use]
    pub fn new(poller: Poller, spec: WaitSpec) -> Self {
        Self {
            poller,
            spec,
            shadow_policy: ShadowClickPolicy::default(),
        }
    }

    /// Set the shadow-click retry policy
    #[must_use]
    pub fn with_shadow_policy(mut self, policy: ShadowClickPolicy) -> Self {
        self.shadow_policy = policy;
        self
    }

    /// The executor's poller
    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// The executor's wait budget
    #[must_use]
    pub fn spec(&self) -> &WaitSpec {
        &self.spec
    }

    /// Perform `action` on the first element matching `locator`.
    ///
    /// Waits for the element to be clickable and uses native input. On any
    /// failure the element is re-resolved and the action repeated at script
    /// level; an error from that fallback is the one returned.
    pub fn perform(
        &self,
        session: &mut dyn Session,
        locator: &Locator,
        action: &Action,
    ) -> ProbeResult<()> {
        match self.perform_native(session, locator, action) {
            Ok(()) => {
                debug!(locator = %locator, action = %action, "native input");
                Ok(())
            }
            Err(primary) => {
                warn!(
                    locator = %locator,
                    action = %action,
                    error = %primary,
                    "native input failed, using script fallback"
                );
                let element = session.find_element(locator)?;
                perform_script(session, &element, action)
            }
        }
    }

    fn perform_native(
        &self,
        session: &mut dyn Session,
        locator: &Locator,
        action: &Action,
    ) -> ProbeResult<()> {
        let element =
            self.poller
                .wait_for_element(session, &self.spec, locator, ElementCondition::Clickable)?;
        match action {
            Action::Click => session.click(&element),
            Action::Clear => session.clear(&element),
            Action::Type(text) => session.send_keys(&element, text),
            Action::Replace(text) => {
                session.clear(&element)?;
                session.send_keys(&element, text)
            }
        }
    }

    /// Click the first control in any shadow scope whose text includes one of
    /// `texts`.
    ///
    /// Each attempt tries every candidate in order. Probe errors count as
    /// misses; exhausting the policy is not an error.
    pub fn click_in_shadow_scope(
        &self,
        session: &mut dyn Session,
        texts: &[&str],
    ) -> ShadowClickOutcome {
        let attempts = self.shadow_policy.attempts;
        for attempt in 1..=attempts {
            for text in texts {
                let probe = Probe::ShadowClickControl {
                    text: (*text).to_string(),
                };
                match session.evaluate(&probe) {
                    Ok(value) if value.as_bool() == Some(true) => {
                        info!(text, attempt, "clicked shadow control");
                        return ShadowClickOutcome::Clicked {
                            text: (*text).to_string(),
                            attempt,
                        };
                    }
                    Ok(_) => {}
                    Err(e) => debug!(text, attempt, error = %e, "shadow probe failed"),
                }
            }
            if attempt < attempts {
                self.poller.clock().sleep(self.shadow_policy.spacing);
            }
        }
        warn!(?texts, attempts, "no shadow control matched");
        ShadowClickOutcome::Exhausted { attempts }
    }

    /// Click the radio answer labelled `text`
    pub fn select_radio_by_label(
        &self,
        session: &mut dyn Session,
        text: &str,
    ) -> ProbeResult<RadioOutcome> {
        let probe = Probe::RadioClick {
            label: text.to_string(),
        };
        let outcome = match session.evaluate(&probe)?.as_str() {
            Some("field") => RadioOutcome::Field,
            Some("label") => RadioOutcome::Label,
            _ => RadioOutcome::NotFound,
        };
        if outcome == RadioOutcome::NotFound {
            warn!(answer = text, "radio answer not found");
        } else {
            debug!(answer = text, ?outcome, "radio answer clicked");
        }
        Ok(outcome)
    }

    /// Wait until the radio labelled `text` reports checked
    pub fn confirm_radio_selected(&self, session: &mut dyn Session, text: &str) -> ProbeResult<()> {
        let description = format!("radio {text:?} to be selected");
        self.poller.wait_until(
            &self.spec,
            &description,
            || evaluator::radio_selected(session, text),
            |selected| *selected == Some(true),
        )?;
        Ok(())
    }

    /// Scroll every scrollable region and the document to the bottom
    pub fn scroll_all_to_bottom(&self, session: &mut dyn Session) -> ProbeResult<ScrollReport> {
        let value = session.evaluate(&Probe::ScrollAllToBottom)?;
        let report: ScrollReport = serde_json::from_value(value)?;
        debug!(regions = report.regions, moved = report.moved, "scrolled to bottom");
        Ok(report)
    }

    /// Scroll to the bottom on every poll until the page stops growing.
    ///
    /// Settled means a scroll moved nothing, the total scroll height matches
    /// the previous poll, and every region still reads as fully scrolled.
    /// Returns the first scroll's report.
    pub fn scroll_to_bottom_and_settle(
        &self,
        session: &mut dyn Session,
    ) -> ProbeResult<ScrollReport> {
        let mut first: Option<ScrollReport> = None;
        let mut previous_height: Option<u64> = None;
        let description = Probe::ScrollSettled.to_string();
        let (last, _) = self.poller.wait_until(
            &self.spec,
            &description,
            || {
                let report = self.scroll_all_to_bottom(session)?;
                first.get_or_insert(report);
                let at_bottom = evaluator::flag(session, &Probe::ScrollSettled)?;
                Ok((report, at_bottom))
            },
            |(report, at_bottom)| {
                let stable = previous_height == Some(report.height);
                previous_height = Some(report.height);
                report.moved == 0 && stable && *at_bottom == Some(true)
            },
        )?;
        Ok(first.unwrap_or(last))
    }

    /// Wait for a link whose text includes `text` and click it by script
    pub fn click_link_by_text(&self, session: &mut dyn Session, text: &str) -> ProbeResult<()> {
        self.poller.wait_for_flag(
            session,
            &self.spec,
            &Probe::LinkClickByText {
                text: text.to_string(),
            },
        )
    }

    /// Fill the textarea of the form field labelled `label`.
    ///
    /// Clears and types natively, falling back to a script value assignment,
    /// then dispatches [`FIELD_COMMIT_EVENTS`].
    pub fn fill_textarea_by_label(
        &self,
        session: &mut dyn Session,
        label: &str,
        value: &str,
    ) -> ProbeResult<()> {
        let probe = Probe::TextareaByLabel {
            label: label.to_string(),
        };
        let description = format!("textarea labelled {label:?}");
        let area = self
            .poller
            .wait_until(&self.spec, &description, || session.locate(&probe), Option::is_some)?
            .ok_or_else(|| ProbeError::no_such_element(description.clone()))?;

        let native = session
            .clear(&area)
            .and_then(|()| session.send_keys(&area, value));
        if let Err(e) = native {
            warn!(label, error = %e, "native typing failed, assigning value by script");
            session.script_set_value(&area, value)?;
        }
        session.dispatch_events(&area, &FIELD_COMMIT_EVENTS)?;
        info!(label, "textarea filled");
        Ok(())
    }

    /// Click `inner` inside the shadow root of `host`
    pub fn click_shadow_inner(
        &self,
        session: &mut dyn Session,
        host: &str,
        inner: &str,
    ) -> ProbeResult<()> {
        self.poller.wait_for_flag(
            session,
            &self.spec,
            &Probe::ShadowClickInner {
                host: host.to_string(),
                inner: inner.to_string(),
            },
        )
    }

    /// Poll until a button whose trimmed text equals `text` is clicked
    pub fn click_button_by_exact_text(
        &self,
        session: &mut dyn Session,
        text: &str,
    ) -> ProbeResult<()> {
        self.poller.wait_for_flag(
            session,
            &self.spec,
            &Probe::ButtonClickExact {
                text: text.to_string(),
            },
        )
    }

    /// Wait for `expected` windows and switch to one other than the current
    pub fn switch_to_new_window(
        &self,
        session: &mut dyn Session,
        expected: usize,
    ) -> ProbeResult<WindowHandle> {
        let original = session.window_handle()?;
        let handles = self
            .poller
            .wait_for_window_count(session, &self.spec, expected)?;
        let target = handles
            .into_iter()
            .find(|h| *h != original)
            .ok_or_else(|| ProbeError::NoSuchWindow {
                handle: format!("any window other than {original}"),
            })?;
        session.switch_to_window(&target)?;
        info!(window = %target, "switched to new window");
        Ok(target)
    }
}

fn perform_script(
    session: &mut dyn Session,
    element: &ElementHandle,
    action: &Action,
) -> ProbeResult<()> {
    match action {
        Action::Click => session.script_click(element),
        Action::Clear => session.script_set_value(element, ""),
        Action::Type(text) => {
            let current = session.value(element)?;
            session.script_set_value(element, &format!("{current}{text}"))
        }
        Action::Replace(text) => session.script_set_value(element, text),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::mock::{Document, MockBehavior, MockSession, NodeSpec, Overflow, ScrollBox, World};
    use std::sync::Arc;

    fn executor(clock: &Arc<FakeClock>) -> Executor {
        Executor::new(
            Poller::new(clock.clone()),
            WaitSpec::new().with_timeout(5_000).with_poll_interval(250),
        )
    }

    /// Body with a button nested three shadow roots deep
    fn nested_shadow_doc(label: &str) -> Document {
        let mut doc = Document::new();
        let body = doc.body();
        let mut host = doc.append(body, NodeSpec::new("wem-course-player"));
        for depth in 0..3 {
            let root = doc.attach_shadow(host);
            if depth == 2 {
                doc.append(root, NodeSpec::new("gux-button").class("nav").text(label));
            } else {
                host = doc.append(root, NodeSpec::new(format!("wem-layer-{depth}")));
            }
        }
        doc
    }

    mod perform_tests {
        use super::*;

        #[test]
        fn test_native_click() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            doc.append(body, NodeSpec::new("button").id("go").text("Go"));
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .perform(&mut session, &Locator::id("go"), &Action::Click)
                .unwrap();
            assert_eq!(session.history_count("click"), 1);
            assert_eq!(session.history_count("script_click"), 0);
        }

        #[test]
        fn test_intercepted_click_falls_back_to_script() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            doc.append(body, NodeSpec::new("button").id("go").text("Go"));
            let mut session = MockSession::with_document(doc)
                .with_clock(clock.clone())
                .with_intercepted_clicks(true);
            executor(&clock)
                .perform(&mut session, &Locator::id("go"), &Action::Click)
                .unwrap();
            assert_eq!(session.history_count("script_click"), 1);
        }

        #[test]
        fn test_hidden_element_waits_then_falls_back() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            doc.append(body, NodeSpec::new("button").id("go").hidden());
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .perform(&mut session, &Locator::id("go"), &Action::Click)
                .unwrap();
            assert_eq!(clock.now_ms(), 5_000);
            assert_eq!(session.history_count("script_click"), 1);
        }

        #[test]
        fn test_fallback_error_surfaces() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(Document::new()).with_clock(clock.clone());
            let err = executor(&clock)
                .perform(&mut session, &Locator::id("missing"), &Action::Click)
                .unwrap_err();
            assert!(matches!(err, ProbeError::NoSuchElement { .. }));
        }

        #[test]
        fn test_replace_sets_value() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            let input = doc.append(body, NodeSpec::new("input").id("org").value("old"));
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .perform(&mut session, &Locator::id("org"), &Action::Replace("acme".into()))
                .unwrap();
            assert_eq!(session.world().window_document(0).unwrap().node(input).value, "acme");
        }

        #[test]
        fn test_type_fallback_appends_to_existing_value() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            let input = doc.append(body, NodeSpec::new("input").id("q").value("North").hidden());
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .perform(&mut session, &Locator::id("q"), &Action::Type(" East".into()))
                .unwrap();
            assert_eq!(session.history_count("send_keys"), 0);
            assert_eq!(session.history_count("script_set_value"), 1);
            let doc = session.world().window_document(0).unwrap();
            assert_eq!(doc.node(input).value, "North East");
        }

        #[test]
        fn test_replace_fallback_overwrites_value() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            let input = doc.append(body, NodeSpec::new("input").id("q").value("North").hidden());
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .perform(&mut session, &Locator::id("q"), &Action::Replace("West".into()))
                .unwrap();
            let doc = session.world().window_document(0).unwrap();
            assert_eq!(doc.node(input).value, "West");
        }
    }

    mod shadow_click_tests {
        use super::*;

        #[test]
        fn test_finds_control_three_levels_deep() {
            let clock = FakeClock::shared();
            let mut session =
                MockSession::with_document(nested_shadow_doc("Next")).with_clock(clock.clone());
            let outcome = executor(&clock).click_in_shadow_scope(&mut session, &["Next"]);
            assert_eq!(
                outcome,
                ShadowClickOutcome::Clicked {
                    text: "Next".into(),
                    attempt: 1
                }
            );
            assert_eq!(session.activations().len(), 1);
            assert_eq!(clock.sleep_count(), 0);
        }

        #[test]
        fn test_exhausts_silently_after_ten_attempts() {
            let clock = FakeClock::shared();
            let mut session =
                MockSession::with_document(nested_shadow_doc("Back")).with_clock(clock.clone());
            let outcome = executor(&clock).click_in_shadow_scope(&mut session, &["Next"]);
            assert_eq!(outcome, ShadowClickOutcome::Exhausted { attempts: 10 });
            assert!(!outcome.is_clicked());
            assert_eq!(session.history_count("evaluate"), 10);
            assert_eq!(clock.sleep_count(), 9);
            assert_eq!(clock.now_ms(), 9_000);
            assert!(session.activations().is_empty());
        }

        #[test]
        fn test_candidates_tried_in_order() {
            let clock = FakeClock::shared();
            let mut session =
                MockSession::with_document(nested_shadow_doc("Continue")).with_clock(clock.clone());
            let outcome =
                executor(&clock).click_in_shadow_scope(&mut session, &["Next", "Continue"]);
            match outcome {
                ShadowClickOutcome::Clicked { text, .. } => assert_eq!(text, "Continue"),
                other => panic!("expected a click, got {other:?}"),
            }
        }

        #[test]
        fn test_custom_policy() {
            let clock = FakeClock::shared();
            let mut session =
                MockSession::with_document(Document::new()).with_clock(clock.clone());
            let policy = ShadowClickPolicy::default()
                .with_attempts(3)
                .with_spacing(200);
            let exec = executor(&clock).with_shadow_policy(policy);
            let outcome = exec.click_in_shadow_scope(&mut session, &["x"]);
            assert_eq!(outcome, ShadowClickOutcome::Exhausted { attempts: 3 });
            assert_eq!(clock.now_ms(), 400);
        }
    }

    mod radio_tests {
        use super::*;

        fn radio_doc() -> Document {
            let mut doc = Document::new();
            let body = doc.body();
            for answer in ["5", "7"] {
                let field = doc.append(body, NodeSpec::new("gux-form-field-radio"));
                doc.append(field, NodeSpec::new("label").text(format!("  {answer} ")));
                let root = doc.attach_shadow(field);
                doc.append(root, NodeSpec::new("input").attr("type", "radio").attr("name", "q1"));
            }
            let plain = doc.append(body, NodeSpec::new("label").text("Maybe"));
            doc.append(plain, NodeSpec::new("input").attr("type", "radio").attr("name", "q2"));
            doc
        }

        #[test]
        fn test_field_strategy_and_confirmation() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(radio_doc()).with_clock(clock.clone());
            let exec = executor(&clock);
            assert_eq!(exec.select_radio_by_label(&mut session, "7").unwrap(), RadioOutcome::Field);
            exec.confirm_radio_selected(&mut session, "7").unwrap();
            assert_eq!(evaluator::radio_selected(&mut session, "5").unwrap(), Some(false));
        }

        #[test]
        fn test_label_fallback() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(radio_doc()).with_clock(clock.clone());
            let exec = executor(&clock);
            assert_eq!(
                exec.select_radio_by_label(&mut session, "Maybe").unwrap(),
                RadioOutcome::Label
            );
            exec.confirm_radio_selected(&mut session, "Maybe").unwrap();
        }

        #[test]
        fn test_not_found_is_silent() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(radio_doc()).with_clock(clock.clone());
            let exec = executor(&clock);
            assert_eq!(
                exec.select_radio_by_label(&mut session, "East").unwrap(),
                RadioOutcome::NotFound
            );
            assert!(exec.confirm_radio_selected(&mut session, "East").unwrap_err().is_timeout());
        }
    }

    mod scroll_tests {
        use super::*;

        fn scroll_doc() -> Document {
            let mut doc = Document::new();
            let body = doc.body();
            for overflow in [Overflow::Auto, Overflow::Scroll, Overflow::Visible] {
                doc.append(
                    body,
                    NodeSpec::new("div").scroll(ScrollBox::new(overflow, 400, 2_000)),
                );
            }
            doc.set_viewport(ScrollBox::new(Overflow::Auto, 1_080, 3_000));
            doc
        }

        #[test]
        fn test_scroll_moves_regions_and_document() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(scroll_doc()).with_clock(clock.clone());
            let report = executor(&clock).scroll_all_to_bottom(&mut session).unwrap();
            assert_eq!(
                report,
                ScrollReport {
                    regions: 2,
                    moved: 3,
                    height: 7_000
                }
            );
        }

        #[test]
        fn test_second_scroll_moves_nothing() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(scroll_doc()).with_clock(clock.clone());
            let exec = executor(&clock);
            exec.scroll_all_to_bottom(&mut session).unwrap();
            let again = exec.scroll_all_to_bottom(&mut session).unwrap();
            assert_eq!(again.moved, 0);
            assert_eq!(again.regions, 2);
        }

        #[test]
        fn test_settle_after_scroll() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(scroll_doc()).with_clock(clock.clone());
            let exec = executor(&clock);
            assert_eq!(
                evaluator::flag(&mut session, &Probe::ScrollSettled).unwrap(),
                Some(false)
            );
            let report = exec.scroll_to_bottom_and_settle(&mut session).unwrap();
            assert_eq!(report.moved, 3);
            // One confirming poll after the first scroll
            assert_eq!(clock.sleep_count(), 1);
        }

        /// Adds 1000px to every region and the document on the first scroll
        #[derive(Debug, Default)]
        struct LazyGrowth {
            grown: bool,
        }

        impl MockBehavior for LazyGrowth {
            fn on_scroll(&mut self, world: &mut World, window: usize, _now: Duration) {
                if self.grown {
                    return;
                }
                self.grown = true;
                if let Some(doc) = world.window_document_mut(window) {
                    for region in doc.scroll_regions() {
                        doc.node_mut(region).scroll.scroll_height += 1_000;
                    }
                    doc.viewport_mut().scroll_height += 1_000;
                }
            }
        }

        #[test]
        fn test_settle_rescrolls_lazy_content() {
            let clock = FakeClock::shared();
            let mut world = World::new();
            world.add_window("https://app.test/", scroll_doc());
            let mut session = MockSession::new(world, LazyGrowth::default(), clock.clone());
            let exec = executor(&clock);

            exec.scroll_to_bottom_and_settle(&mut session).unwrap();

            let doc = session.world().window_document(0).unwrap();
            for region in doc.scroll_regions() {
                assert!(doc.node(region).scroll.at_bottom());
                assert_eq!(doc.node(region).scroll.scroll_height, 3_000);
            }
            assert!(doc.viewport().at_bottom());
            assert_eq!(clock.sleep_count(), 2);
        }

        #[test]
        fn test_settle_times_out_while_content_keeps_growing() {
            #[derive(Debug)]
            struct EndlessFeed;

            impl MockBehavior for EndlessFeed {
                fn on_scroll(&mut self, world: &mut World, window: usize, _now: Duration) {
                    if let Some(doc) = world.window_document_mut(window) {
                        doc.viewport_mut().scroll_height += 500;
                    }
                }
            }

            let clock = FakeClock::shared();
            let mut world = World::new();
            world.add_window("https://app.test/", scroll_doc());
            let mut session = MockSession::new(world, EndlessFeed, clock.clone());
            let err = executor(&clock)
                .scroll_to_bottom_and_settle(&mut session)
                .unwrap_err();
            assert!(err.is_timeout());
            assert!(err.to_string().contains("scroll.settled"));
        }
    }

    mod form_tests {
        use super::*;

        #[test]
        fn test_fill_textarea_dispatches_commit_events() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            let field = doc.append(body, NodeSpec::new("gux-form-field-textarea"));
            doc.append(field, NodeSpec::new("gux-truncate").text("What is WHO?"));
            let area = doc.append(field, NodeSpec::new("textarea").attr("slot", "input"));
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());

            executor(&clock)
                .fill_textarea_by_label(&mut session, "What is WHO?", "World Health Organization")
                .unwrap();

            let node = session.world().window_document(0).unwrap().node(area);
            assert_eq!(node.value, "World Health Organization");
            for event in ["input", "change", "keyup", "blur"] {
                assert!(node.events.iter().any(|e| e == event), "{event} not dispatched");
            }
        }

        #[test]
        fn test_fill_textarea_falls_back_to_first_textarea() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            let area = doc.append(body, NodeSpec::new("textarea"));
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .fill_textarea_by_label(&mut session, "Unlabelled", "text")
                .unwrap();
            assert_eq!(session.world().window_document(0).unwrap().node(area).value, "text");
        }

        #[test]
        fn test_click_button_by_exact_text() {
            let clock = FakeClock::shared();
            let mut doc = Document::new();
            let body = doc.body();
            doc.append(body, NodeSpec::new("button").text("Submit later"));
            let submit = doc.append(body, NodeSpec::new("button").text(" Submit "));
            let mut session = MockSession::with_document(doc).with_clock(clock.clone());
            executor(&clock)
                .click_button_by_exact_text(&mut session, "Submit")
                .unwrap();
            assert_eq!(session.activations().len(), 1);
            assert_eq!(session.activations()[0].node, submit);
        }

        #[test]
        fn test_click_shadow_inner_waits_for_host() {
            let clock = FakeClock::shared();
            let mut session = MockSession::with_document(Document::new()).with_clock(clock.clone());
            let err = executor(&clock)
                .click_shadow_inner(&mut session, "gux-button.complete-assignment", "button")
                .unwrap_err();
            assert!(err.is_timeout());
        }
    }
}
