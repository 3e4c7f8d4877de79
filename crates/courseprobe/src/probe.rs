//! Named, versioned page probes.
//!
//! Every script courseprobe runs inside the page is a [`Probe`] variant with a
//! stable name, a version and a documented [`ResultShape`]. Live sessions
//! render a probe to JavaScript with [`Probe::script`]; the mock session
//! interprets the same variants natively against its in-memory DOM.
//!
//! | Probe | Shape | Meaning |
//! |-------|-------|---------|
//! | `progress.shadow_text` | text | progress-bar shadow `textContent`, `""` when absent |
//! | `progress.host_text` | text or null | shadow text, else light text, null without a bar |
//! | `page.combined_text` | text | `body.innerText` followed by the bar's shadow text |
//! | `shadow.click_control` | flag | depth-first search through shadow roots for a control containing text; clicks it |
//! | `form.radio_click` | text or null | `"field"` or `"label"` depending on the strategy that clicked |
//! | `form.radio_selected` | flag or null | checked state of the radio behind the label |
//! | `scroll.all_to_bottom` | scroll | `{regions, moved, height}` after scrolling every region |
//! | `scroll.settled` | flag | every scroll region and the document at their maximum |
//! | `link.click_by_text` | flag | clicks the first anchor whose text includes the value |
//! | `form.textarea_by_label` | element | textarea of the labelled field, else first textarea |
//! | `shadow.click_inner` | flag | clicks `inner` inside the shadow root of `host` |
//! | `button.click_exact` | flag | clicks the first button whose trimmed text equals the value |
//! | `page.any_text_contains` | flag | some element's `innerText` includes the token |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag name of the progress-bar web component
pub const PROGRESS_BAR_TAG: &str = "wem-game-progress-bar";

/// Selector for shadow-scope controls
pub const SHADOW_CONTROL_SELECTOR: &str = "gux-button, button";

/// Shape of the JSON value a probe evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Always a string
    Text,
    /// String or null
    OptionalText,
    /// Always a boolean
    Flag,
    /// Boolean or null
    OptionalFlag,
    /// `{ "regions": n, "moved": n, "height": n }`
    Scroll,
    /// A DOM element; sessions convert it to an element handle or null
    Element,
}

/// A page probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum Probe {
    /// Progress bar shadow text
    ProgressShadowText,
    /// Progress bar text from either tree
    ProgressHostText,
    /// Body text plus progress bar shadow text
    PageCombinedText,
    /// Click a control found anywhere in the shadow tree
    ShadowClickControl {
        /// Text the control must include
        text: String,
    },
    /// Click a radio by its label
    RadioClick {
        /// Exact trimmed label text
        label: String,
    },
    /// Checked state of a radio by label
    RadioSelected {
        /// Exact trimmed label text
        label: String,
    },
    /// Scroll every region to its bottom
    ScrollAllToBottom,
    /// Whether every scroll region is at its bottom
    ScrollSettled,
    /// Click a link by text inclusion
    LinkClickByText {
        /// Text the link must include
        text: String,
    },
    /// Textarea of a labelled form field
    TextareaByLabel {
        /// Label text
        label: String,
    },
    /// Click an element inside a host's shadow root
    ShadowClickInner {
        /// CSS selector of the host
        host: String,
        /// CSS selector inside the shadow root
        inner: String,
    },
    /// Click a button by exact text
    ButtonClickExact {
        /// Exact trimmed text
        text: String,
    },
    /// Whether some element's rendered text includes a token
    AnyTextContains {
        /// Token to find
        token: String,
    },
}

impl Probe {
    /// Stable probe name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ProgressShadowText => "progress.shadow_text",
            Self::ProgressHostText => "progress.host_text",
            Self::PageCombinedText => "page.combined_text",
            Self::ShadowClickControl { .. } => "shadow.click_control",
            Self::RadioClick { .. } => "form.radio_click",
            Self::RadioSelected { .. } => "form.radio_selected",
            Self::ScrollAllToBottom => "scroll.all_to_bottom",
            Self::ScrollSettled => "scroll.settled",
            Self::LinkClickByText { .. } => "link.click_by_text",
            Self::TextareaByLabel { .. } => "form.textarea_by_label",
            Self::ShadowClickInner { .. } => "shadow.click_inner",
            Self::ButtonClickExact { .. } => "button.click_exact",
            Self::AnyTextContains { .. } => "page.any_text_contains",
        }
    }

    /// Probe version, bumped whenever the result shape or traversal changes
    #[must_use]
    pub const fn version(&self) -> u32 {
        match self {
            Self::ShadowClickControl { .. } | Self::ScrollAllToBottom => 2,
            _ => 1,
        }
    }

    /// Result shape
    #[must_use]
    pub const fn shape(&self) -> ResultShape {
        match self {
            Self::ProgressShadowText | Self::PageCombinedText => ResultShape::Text,
            Self::ProgressHostText | Self::RadioClick { .. } => ResultShape::OptionalText,
            Self::RadioSelected { .. } => ResultShape::OptionalFlag,
            Self::ScrollAllToBottom => ResultShape::Scroll,
            Self::TextareaByLabel { .. } => ResultShape::Element,
            Self::ShadowClickControl { .. }
            | Self::ScrollSettled
            | Self::LinkClickByText { .. }
            | Self::ShadowClickInner { .. }
            | Self::ButtonClickExact { .. }
            | Self::AnyTextContains { .. } => ResultShape::Flag,
        }
    }

    /// Whether evaluating this probe changes page state
    #[must_use]
    pub const fn is_effectful(&self) -> bool {
        matches!(
            self,
            Self::ShadowClickControl { .. }
                | Self::RadioClick { .. }
                | Self::ScrollAllToBottom
                | Self::LinkClickByText { .. }
                | Self::ShadowClickInner { .. }
                | Self::ButtonClickExact { .. }
        )
    }

    /// Render this probe as a JavaScript expression.
    ///
    /// `doc` is an expression evaluating to the document of the current
    /// context. The result is a self-invoking function whose value matches
    /// [`Probe::shape`].
    #[must_use]
    pub fn script(&self, doc: &str) -> String {
        let body = self.body();
        format!("((DOC) => {{ {body} }})({doc})")
    }

    fn body(&self) -> String {
        let bar = format!("{PROGRESS_BAR_TAG:?}");
        match self {
            Self::ProgressShadowText => format!(
                "const bar = DOC.querySelector({bar}); \
                 return bar && bar.shadowRoot ? bar.shadowRoot.textContent : '';"
            ),
            Self::ProgressHostText => format!(
                "const bar = DOC.querySelector({bar}); if (!bar) return null; \
                 return bar.shadowRoot ? bar.shadowRoot.textContent : bar.textContent;"
            ),
            Self::PageCombinedText => format!(
                "const bar = DOC.querySelector({bar}); \
                 const shadow = bar && bar.shadowRoot ? bar.shadowRoot.textContent : ''; \
                 return (DOC.body ? DOC.body.innerText : '') + '\\n' + shadow;"
            ),
            Self::ShadowClickControl { text } => format!(
                "const stack = [DOC]; \
                 while (stack.length) {{ \
                   const root = stack.pop(); \
                   for (const el of root.querySelectorAll({sel:?})) {{ \
                     if ((el.textContent || '').includes({text:?})) {{ el.click(); return true; }} \
                   }} \
                   const nested = Array.from(root.querySelectorAll('*')).map(el => el.shadowRoot).filter(r => r); \
                   for (let i = nested.length - 1; i >= 0; i--) stack.push(nested[i]); \
                 }} \
                 return false;",
                sel = SHADOW_CONTROL_SELECTOR
            ),
            Self::RadioClick { label } => format!(
                "for (const field of DOC.querySelectorAll('gux-form-field-radio')) {{ \
                   const lbl = field.querySelector('label'); \
                   if (lbl && lbl.textContent.trim() === {label:?}) {{ \
                     const input = field.shadowRoot && field.shadowRoot.querySelector('input[type=\"radio\"]'); \
                     if (input) {{ input.click(); return 'field'; }} \
                   }} \
                 }} \
                 for (const lbl of DOC.querySelectorAll('label')) {{ \
                   if (lbl.textContent.trim() === {label:?}) {{ lbl.click(); return 'label'; }} \
                 }} \
                 return null;"
            ),
            Self::RadioSelected { label } => format!(
                "for (const field of DOC.querySelectorAll('gux-form-field-radio')) {{ \
                   const lbl = field.querySelector('label'); \
                   if (lbl && lbl.textContent.trim() === {label:?}) {{ \
                     const input = field.shadowRoot && field.shadowRoot.querySelector('input[type=\"radio\"]'); \
                     if (input) return input.checked; \
                   }} \
                 }} \
                 for (const lbl of DOC.querySelectorAll('label')) {{ \
                   if (lbl.textContent.trim() === {label:?}) {{ \
                     const input = lbl.control || lbl.querySelector('input[type=\"radio\"]'); \
                     return input ? input.checked : null; \
                   }} \
                 }} \
                 return null;"
            ),
            Self::ScrollAllToBottom => "let regions = 0, moved = 0, height = 0; \
                 const view = DOC.defaultView; \
                 for (const el of DOC.querySelectorAll('*')) { \
                   const oy = view.getComputedStyle(el).overflowY; \
                   if (oy === 'auto' || oy === 'scroll') { \
                     regions++; const before = el.scrollTop; \
                     el.scrollTop = el.scrollHeight; \
                     if (el.scrollTop !== before) moved++; \
                     height += el.scrollHeight; \
                   } \
                 } \
                 const root = DOC.scrollingElement || DOC.documentElement; \
                 const y = view.scrollY; \
                 view.scrollTo(0, root.scrollHeight); \
                 if (view.scrollY !== y) moved++; \
                 height += root.scrollHeight; \
                 return { regions, moved, height };"
                .to_string(),
            Self::ScrollSettled => "const view = DOC.defaultView; \
                 for (const el of DOC.querySelectorAll('*')) { \
                   const oy = view.getComputedStyle(el).overflowY; \
                   if ((oy === 'auto' || oy === 'scroll') && el.scrollTop + el.clientHeight < el.scrollHeight - 1) return false; \
                 } \
                 const root = DOC.scrollingElement || DOC.documentElement; \
                 return view.scrollY + view.innerHeight >= root.scrollHeight - 1;"
                .to_string(),
            Self::LinkClickByText { text } => format!(
                "for (const a of DOC.querySelectorAll('a')) {{ \
                   if (a.textContent.includes({text:?})) {{ a.click(); return true; }} \
                 }} \
                 return false;"
            ),
            Self::TextareaByLabel { label } => format!(
                "for (const field of DOC.querySelectorAll('gux-form-field-textarea')) {{ \
                   const truncate = field.querySelector('gux-truncate'); \
                   const content = (field.innerText || '') + (truncate ? truncate.textContent : ''); \
                   if (content.includes({label:?})) {{ \
                     const area = field.querySelector('textarea[slot=\"input\"], textarea'); \
                     if (area) return area; \
                   }} \
                 }} \
                 return DOC.querySelector('textarea');"
            ),
            Self::ShadowClickInner { host, inner } => format!(
                "const host = DOC.querySelector({host:?}); \
                 const el = host && host.shadowRoot && host.shadowRoot.querySelector({inner:?}); \
                 if (!el) return false; el.click(); return true;"
            ),
            Self::ButtonClickExact { text } => format!(
                "for (const b of DOC.querySelectorAll('button, gux-button')) {{ \
                   if (b.textContent.trim() === {text:?}) {{ b.click(); return true; }} \
                 }} \
                 return false;"
            ),
            Self::AnyTextContains { token } => format!(
                "return Array.from(DOC.querySelectorAll('*')).some(el => (el.innerText || '').includes({token:?}));"
            ),
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name(), self.version())
    }
}

/// Result of `scroll.all_to_bottom`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollReport {
    /// Number of scrollable regions found
    pub regions: u32,
    /// Number of regions (including the document) whose offset changed
    pub moved: u32,
    /// Sum of `scrollHeight` over the regions and the document
    #[serde(default)]
    pub height: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn all_probes() -> Vec<Probe> {
        vec![
            Probe::ProgressShadowText,
            Probe::ProgressHostText,
            Probe::PageCombinedText,
            Probe::ShadowClickControl { text: "Next".into() },
            Probe::RadioClick { label: "7".into() },
            Probe::RadioSelected { label: "East".into() },
            Probe::ScrollAllToBottom,
            Probe::ScrollSettled,
            Probe::LinkClickByText {
                text: "Test Assignment".into(),
            },
            Probe::TextareaByLabel {
                label: "What is WHO?".into(),
            },
            Probe::ShadowClickInner {
                host: "gux-button.complete-assignment".into(),
                inner: "button".into(),
            },
            Probe::ButtonClickExact {
                text: "Submit".into(),
            },
            Probe::AnyTextContains {
                token: "100%".into(),
            },
        ]
    }

    mod catalog_tests {
        use super::*;
        use std::collections::HashSet;

        #[test]
        fn test_names_are_unique() {
            let names: HashSet<_> = all_probes().iter().map(Probe::name).collect();
            assert_eq!(names.len(), all_probes().len());
        }

        #[test]
        fn test_names_are_namespaced() {
            for probe in all_probes() {
                assert!(probe.name().contains('.'), "{}", probe.name());
                assert!(probe.version() >= 1);
            }
        }

        #[test]
        fn test_display_includes_version() {
            let probe = Probe::ShadowClickControl { text: "Next".into() };
            assert_eq!(probe.to_string(), "shadow.click_control@v2");
        }

        #[test]
        fn test_read_only_probes() {
            assert!(!Probe::ProgressShadowText.is_effectful());
            assert!(!Probe::ScrollSettled.is_effectful());
            assert!(Probe::ScrollAllToBottom.is_effectful());
            assert!(Probe::ButtonClickExact {
                text: "Submit".into()
            }
            .is_effectful());
        }

        #[test]
        fn test_shapes() {
            assert_eq!(Probe::ProgressHostText.shape(), ResultShape::OptionalText);
            assert_eq!(
                Probe::RadioSelected { label: "x".into() }.shape(),
                ResultShape::OptionalFlag
            );
            assert_eq!(
                Probe::TextareaByLabel { label: "x".into() }.shape(),
                ResultShape::Element
            );
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_script_is_self_invoking() {
            for probe in all_probes() {
                let js = probe.script("document");
                assert!(js.starts_with("((DOC) => {"), "{}", probe.name());
                assert!(js.ends_with("})(document)"), "{}", probe.name());
            }
        }

        #[test]
        fn test_shadow_search_uses_explicit_stack() {
            let js = Probe::ShadowClickControl { text: "Next".into() }.script("document");
            assert!(js.contains("stack.pop()"));
            assert!(js.contains("gux-button, button"));
            assert!(js.contains("\"Next\""));
        }

        #[test]
        fn test_user_text_is_quoted() {
            let js = Probe::ButtonClickExact {
                text: "it's \"done\"".into(),
            }
            .script("document");
            assert!(js.contains(r#""it's \"done\"""#));
        }

        #[test]
        fn test_progress_probe_targets_bar() {
            let js = Probe::ProgressShadowText.script("document");
            assert!(js.contains("\"wem-game-progress-bar\""));
            assert!(js.contains("shadowRoot.textContent"));
        }
    }

    mod scroll_report_tests {
        use super::*;

        #[test]
        fn test_deserializes_from_probe_result() {
            let value = serde_json::json!({"regions": 3, "moved": 2, "height": 4_200});
            let report: ScrollReport = serde_json::from_value(value).unwrap();
            assert_eq!(
                report,
                ScrollReport {
                    regions: 3,
                    moved: 2,
                    height: 4_200
                }
            );
        }

        #[test]
        fn test_height_defaults_to_zero() {
            let report: ScrollReport =
                serde_json::from_value(serde_json::json!({"regions": 1, "moved": 0})).unwrap();
            assert_eq!(report.height, 0);
        }

        #[test]
        fn test_scroll_script_reports_height() {
            let js = Probe::ScrollAllToBottom.script("document");
            assert!(js.contains("height += el.scrollHeight"));
            assert!(js.contains("return { regions, moved, height }"));
        }
    }
}
