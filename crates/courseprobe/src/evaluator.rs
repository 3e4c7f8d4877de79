//! Condition evaluator.
//!
//! Produces a single observation of page state. Nothing here waits, retries
//! or mutates the page: "not found yet" and other transient session errors
//! become not-ready observations (`false`, `None`, or [`UNKNOWN_PERCENT`]),
//! and only session-level failures propagate.

use crate::locator::Locator;
use crate::observation::{
    bar_text_percent, complete_phrase_percent, digits_only_percent, looks_like_percent_label,
    UNKNOWN_PERCENT,
};
use crate::probe::Probe;
use crate::result::ProbeResult;
use crate::session::{ElementHandle, ElementState, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// State an element must reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementCondition {
    /// Attached to the current document
    Present,
    /// Present and displayed
    Visible,
    /// Displayed and enabled
    Clickable,
    /// Checked or selected
    Selected,
}

impl ElementCondition {
    /// Whether an element state satisfies the condition
    #[must_use]
    pub const fn holds(&self, state: &ElementState) -> bool {
        match self {
            Self::Present => true,
            Self::Visible => state.displayed,
            Self::Clickable => state.is_clickable(),
            Self::Selected => state.selected,
        }
    }
}

impl fmt::Display for ElementCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Present => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
            Self::Selected => "selected",
        };
        f.write_str(name)
    }
}

/// Where a percentage is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PercentSource {
    /// Progress label text, falling back to the bar's shadow text
    Label {
        /// Label locator
        locator: Locator,
    },
    /// First `N%` in the progress bar text
    Bar,
    /// `N% complete` phrase in the combined page text
    Page,
}

impl fmt::Display for PercentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label { locator } => write!(f, "label {locator}"),
            Self::Bar => f.write_str("progress bar"),
            Self::Page => f.write_str("page text"),
        }
    }
}

/// Map transient errors to a not-ready value
fn settle<T>(result: ProbeResult<T>, not_ready: T) -> ProbeResult<T> {
    match result {
        Err(e) if e.is_transient() => {
            trace!(error = %e, "transient error treated as not ready");
            Ok(not_ready)
        }
        other => other,
    }
}

fn text_probe(session: &mut dyn Session, probe: &Probe) -> ProbeResult<Option<String>> {
    let value = session.evaluate(probe)?;
    Ok(value.as_str().map(str::to_string))
}

/// Progress percentage from a label, falling back to the bar's shadow text.
///
/// Never fails: every error degrades to [`UNKNOWN_PERCENT`].
pub fn progress_percentage(session: &mut dyn Session, label: &Locator) -> i32 {
    let read = |session: &mut dyn Session| -> ProbeResult<i32> {
        let element = session.find_element(label)?;
        let mut text = session.element_state(&element)?.text.trim().to_string();
        if !looks_like_percent_label(&text) {
            text = text_probe(session, &Probe::ProgressShadowText)?.unwrap_or_default();
        }
        Ok(digits_only_percent(&text))
    };
    read(session).unwrap_or(UNKNOWN_PERCENT)
}

/// First `N%` in the bar's shadow (or light) text
pub fn bar_percentage(session: &mut dyn Session) -> i32 {
    match text_probe(session, &Probe::ProgressHostText) {
        Ok(Some(text)) => bar_text_percent(&text),
        _ => UNKNOWN_PERCENT,
    }
}

/// Body text followed by the bar's shadow text
pub fn page_progress_text(session: &mut dyn Session) -> ProbeResult<String> {
    settle(
        text_probe(session, &Probe::PageCombinedText).map(Option::unwrap_or_default),
        String::new(),
    )
}

/// Whether the combined progress text contains `token`
pub fn text_contains(session: &mut dyn Session, token: &str) -> ProbeResult<bool> {
    Ok(page_progress_text(session)?.contains(token))
}

/// Percentage parsed from the combined progress text
pub fn page_progress_percent(session: &mut dyn Session) -> i32 {
    page_progress_text(session)
        .map(|text| complete_phrase_percent(&text))
        .unwrap_or(UNKNOWN_PERCENT)
}

/// Read a percentage from any source
pub fn percent(session: &mut dyn Session, source: &PercentSource) -> i32 {
    match source {
        PercentSource::Label { locator } => progress_percentage(session, locator),
        PercentSource::Bar => bar_percentage(session),
        PercentSource::Page => page_progress_percent(session),
    }
}

/// First match of `locator` if it satisfies `condition`
pub fn element_matching(
    session: &mut dyn Session,
    locator: &Locator,
    condition: ElementCondition,
) -> ProbeResult<Option<ElementHandle>> {
    let probe = |session: &mut dyn Session| -> ProbeResult<Option<ElementHandle>> {
        let Some(first) = session.find_elements(locator)?.into_iter().next() else {
            return Ok(None);
        };
        if condition == ElementCondition::Present {
            return Ok(Some(first));
        }
        let state = session.element_state(&first)?;
        Ok(condition.holds(&state).then_some(first))
    };
    settle(probe(session), None)
}

/// Whether `locator` matches anything
pub fn is_present(session: &mut dyn Session, locator: &Locator) -> ProbeResult<bool> {
    Ok(element_matching(session, locator, ElementCondition::Present)?.is_some())
}

/// Whether the first match is displayed
pub fn is_visible(session: &mut dyn Session, locator: &Locator) -> ProbeResult<bool> {
    Ok(element_matching(session, locator, ElementCondition::Visible)?.is_some())
}

/// Whether the first match is displayed and enabled
pub fn is_clickable(session: &mut dyn Session, locator: &Locator) -> ProbeResult<bool> {
    Ok(element_matching(session, locator, ElementCondition::Clickable)?.is_some())
}

/// Whether the first match is checked
pub fn is_selected(session: &mut dyn Session, locator: &Locator) -> ProbeResult<bool> {
    Ok(element_matching(session, locator, ElementCondition::Selected)?.is_some())
}

/// Attribute of the first match; `None` when the element or attribute is absent
pub fn attribute(
    session: &mut dyn Session,
    locator: &Locator,
    name: &str,
) -> ProbeResult<Option<String>> {
    let read = |session: &mut dyn Session| -> ProbeResult<Option<String>> {
        match session.find_elements(locator)?.first() {
            Some(element) => session.attribute(element, name),
            None => Ok(None),
        }
    };
    settle(read(session), None)
}

/// Boolean probe result; `None` for a null result
pub fn flag(session: &mut dyn Session, probe: &Probe) -> ProbeResult<Option<bool>> {
    settle(session.evaluate(probe).map(|v| v.as_bool()), None)
}

/// Checked state of the radio behind `label`; `None` when no such radio exists
pub fn radio_selected(session: &mut dyn Session, label: &str) -> ProbeResult<Option<bool>> {
    flag(
        session,
        &Probe::RadioSelected {
            label: label.to_string(),
        },
    )
}

/// Whether some element's rendered text includes `token`
pub fn any_text_contains(session: &mut dyn Session, token: &str) -> ProbeResult<bool> {
    Ok(flag(
        session,
        &Probe::AnyTextContains {
            token: token.to_string(),
        },
    )?
    .unwrap_or(false))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{Document, MockSession, NodeSpec};

    fn progress_page(label: &str, shadow: Option<&str>) -> MockSession {
        let mut doc = Document::new();
        let body = doc.body();
        doc.append(body, NodeSpec::new("span").class("progress-label").text(label));
        let bar = doc.append(body, NodeSpec::new("wem-game-progress-bar"));
        if let Some(text) = shadow {
            let root = doc.attach_shadow(bar);
            doc.append(root, NodeSpec::new("div").text(text));
        }
        MockSession::with_document(doc)
    }

    fn label() -> Locator {
        Locator::new("span.progress-label")
    }

    mod percentage_tests {
        use super::*;

        #[test]
        fn test_label_text_preferred() {
            let mut session = progress_page("45% complete", Some("99% complete"));
            assert_eq!(progress_percentage(&mut session, &label()), 45);
        }

        #[test]
        fn test_label_without_percent_falls_back_to_shadow() {
            let mut session = progress_page("", Some("33% complete"));
            assert_eq!(progress_percentage(&mut session, &label()), 33);
        }

        #[test]
        fn test_empty_label_and_wordy_shadow_is_unknown() {
            let mut session = progress_page("", Some("complete"));
            assert_eq!(progress_percentage(&mut session, &label()), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_missing_label_is_unknown() {
            let mut session = progress_page("45%", None);
            let missing = Locator::new("span.nope");
            assert_eq!(progress_percentage(&mut session, &missing), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_missing_shadow_root_yields_unknown() {
            let mut session = progress_page("loading", None);
            assert_eq!(progress_percentage(&mut session, &label()), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_bar_percentage() {
            let mut session = progress_page("", Some("Progress 91% complete"));
            assert_eq!(bar_percentage(&mut session), 91);
        }

        #[test]
        fn test_bar_percentage_without_bar() {
            let mut session = MockSession::with_document(Document::new());
            assert_eq!(bar_percentage(&mut session), UNKNOWN_PERCENT);
        }

        #[test]
        fn test_page_text_combines_sources() {
            let mut session = progress_page("Module", Some("83% complete"));
            let text = page_progress_text(&mut session).unwrap();
            assert!(text.contains("Module"));
            assert!(text.contains("83% complete"));
            assert!(text_contains(&mut session, "83%").unwrap());
            assert!(!text_contains(&mut session, "91%").unwrap());
            assert_eq!(page_progress_percent(&mut session), 83);
        }

        #[test]
        fn test_percent_dispatch() {
            let mut session = progress_page("12%", Some("34% complete"));
            assert_eq!(
                percent(&mut session, &PercentSource::Label { locator: label() }),
                12
            );
            assert_eq!(percent(&mut session, &PercentSource::Bar), 34);
        }
    }

    mod element_tests {
        use super::*;

        fn form_page() -> MockSession {
            let mut doc = Document::new();
            let body = doc.body();
            doc.append(body, NodeSpec::new("button").id("go").text("Go"));
            doc.append(body, NodeSpec::new("button").id("off").text("Off").disabled());
            doc.append(body, NodeSpec::new("div").id("ghost").hidden());
            doc.append(
                body,
                NodeSpec::new("input").id("pick").attr("type", "radio").checked(),
            );
            MockSession::with_document(doc)
        }

        #[test]
        fn test_presence_and_visibility() {
            let mut session = form_page();
            assert!(is_present(&mut session, &Locator::id("ghost")).unwrap());
            assert!(!is_visible(&mut session, &Locator::id("ghost")).unwrap());
            assert!(!is_present(&mut session, &Locator::id("missing")).unwrap());
        }

        #[test]
        fn test_clickable_requires_enabled() {
            let mut session = form_page();
            assert!(is_clickable(&mut session, &Locator::id("go")).unwrap());
            assert!(!is_clickable(&mut session, &Locator::id("off")).unwrap());
        }

        #[test]
        fn test_selected() {
            let mut session = form_page();
            assert!(is_selected(&mut session, &Locator::id("pick")).unwrap());
            assert!(!is_selected(&mut session, &Locator::id("go")).unwrap());
        }

        #[test]
        fn test_attribute() {
            let mut session = form_page();
            assert_eq!(
                attribute(&mut session, &Locator::id("pick"), "type").unwrap(),
                Some("radio".to_string())
            );
            assert_eq!(attribute(&mut session, &Locator::id("go"), "type").unwrap(), None);
            assert_eq!(attribute(&mut session, &Locator::id("zz"), "type").unwrap(), None);
        }

        #[test]
        fn test_condition_display() {
            assert_eq!(ElementCondition::Clickable.to_string(), "clickable");
        }
    }

    mod probe_tests {
        use super::*;

        #[test]
        fn test_radio_selected_absent_is_none() {
            let mut session = MockSession::with_document(Document::new());
            assert_eq!(radio_selected(&mut session, "East").unwrap(), None);
        }

        #[test]
        fn test_any_text_contains() {
            let mut doc = Document::new();
            let body = doc.body();
            doc.append(body, NodeSpec::new("h1").text("Congratulations"));
            doc.append(body, NodeSpec::new("p").text("Score: 100%"));
            let mut session = MockSession::with_document(doc);
            assert!(any_text_contains(&mut session, "100%").unwrap());
            assert!(!any_text_contains(&mut session, "42%").unwrap());
        }
    }
}
