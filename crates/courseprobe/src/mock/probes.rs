//! Native interpretation of [`Probe`]s against the mock DOM.
//!
//! Interpretation is pure: it inspects a [`Document`] and says what the probe
//! evaluates to and which node, if any, it would click. The session applies
//! the effects.

use super::dom::{Document, NodeId};
use crate::probe::{Probe, PROGRESS_BAR_TAG};
use crate::result::ProbeResult;
use serde_json::{json, Value};

/// What a probe does to the page
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Interpretation {
    /// Read-only result
    Value(Value),
    /// Click `node`, then evaluate to `value`
    Click { node: NodeId, value: Value },
    /// Element result for `locate`
    Element(Option<NodeId>),
    /// Scroll every region to the bottom
    ScrollAll,
}

fn progress_bar(doc: &Document) -> Option<NodeId> {
    doc.by_tag(Document::ROOT, PROGRESS_BAR_TAG).into_iter().next()
}

fn bar_shadow_text(doc: &Document) -> String {
    progress_bar(doc)
        .and_then(|bar| doc.node(bar).shadow_root)
        .map(|root| doc.text_content(root))
        .unwrap_or_default()
}

fn trimmed_text_is(doc: &Document, id: NodeId, text: &str) -> bool {
    doc.text_content(id).trim() == text
}

fn shadow_radio(doc: &Document, field: NodeId) -> Option<NodeId> {
    let root = doc.node(field).shadow_root?;
    doc.descendants(root)
        .into_iter()
        .find(|id| doc.node(*id).is_radio())
}

/// Shadow input of the radio field labelled `label`, if any
fn field_radio(doc: &Document, label: &str) -> Option<NodeId> {
    doc.by_tag(Document::ROOT, "gux-form-field-radio")
        .into_iter()
        .filter(|field| {
            doc.by_tag(*field, "label")
                .first()
                .is_some_and(|l| trimmed_text_is(doc, *l, label))
        })
        .find_map(|field| shadow_radio(doc, field))
}

fn plain_label(doc: &Document, label: &str) -> Option<NodeId> {
    doc.by_tag(Document::ROOT, "label")
        .into_iter()
        .find(|l| trimmed_text_is(doc, *l, label))
}

/// Depth-first search through the light tree and every nested shadow root
fn shadow_control(doc: &Document, text: &str) -> Option<NodeId> {
    let mut stack = vec![Document::ROOT];
    while let Some(root) = stack.pop() {
        let scope = doc.descendants(root);
        let hit = scope.iter().copied().find(|id| {
            let tag = doc.node(*id).tag.as_str();
            (tag == "gux-button" || tag == "button") && doc.text_content(*id).contains(text)
        });
        if hit.is_some() {
            return hit;
        }
        let nested: Vec<NodeId> = scope
            .iter()
            .filter_map(|id| doc.node(*id).shadow_root)
            .collect();
        stack.extend(nested.into_iter().rev());
    }
    None
}

fn textarea_for_label(doc: &Document, label: &str) -> ProbeResult<Option<NodeId>> {
    for field in doc.by_tag(Document::ROOT, "gux-form-field-textarea") {
        let truncate = doc
            .by_tag(field, "gux-truncate")
            .first()
            .map(|t| doc.text_content(*t))
            .unwrap_or_default();
        let content = doc.inner_text(field) + &truncate;
        if !content.contains(label) {
            continue;
        }
        let area = match doc.query(field, r#"textarea[slot="input"]"#)? {
            Some(area) => Some(area),
            None => doc.by_tag(field, "textarea").first().copied(),
        };
        if area.is_some() {
            return Ok(area);
        }
    }
    Ok(doc.by_tag(Document::ROOT, "textarea").first().copied())
}

/// Interpret a probe against the current document
pub(crate) fn interpret(doc: &Document, probe: &Probe) -> ProbeResult<Interpretation> {
    let interpretation = match probe {
        Probe::ProgressShadowText => Interpretation::Value(json!(bar_shadow_text(doc))),
        Probe::ProgressHostText => Interpretation::Value(match progress_bar(doc) {
            None => Value::Null,
            Some(bar) => match doc.node(bar).shadow_root {
                Some(root) => json!(doc.text_content(root)),
                None => json!(doc.text_content(bar)),
            },
        }),
        Probe::PageCombinedText => {
            let text = format!("{}\n{}", doc.inner_text(doc.body()), bar_shadow_text(doc));
            Interpretation::Value(json!(text))
        }
        Probe::ShadowClickControl { text } => match shadow_control(doc, text) {
            Some(node) => Interpretation::Click {
                node,
                value: json!(true),
            },
            None => Interpretation::Value(json!(false)),
        },
        Probe::RadioClick { label } => {
            if let Some(node) = field_radio(doc, label) {
                Interpretation::Click {
                    node,
                    value: json!("field"),
                }
            } else if let Some(node) = plain_label(doc, label) {
                Interpretation::Click {
                    node,
                    value: json!("label"),
                }
            } else {
                Interpretation::Value(Value::Null)
            }
        }
        Probe::RadioSelected { label } => {
            let input = field_radio(doc, label)
                .or_else(|| plain_label(doc, label).and_then(|l| doc.label_control(l)));
            Interpretation::Value(input.map_or(Value::Null, |id| json!(doc.node(id).checked)))
        }
        Probe::ScrollAllToBottom => Interpretation::ScrollAll,
        Probe::ScrollSettled => {
            let regions_done = doc
                .scroll_regions()
                .into_iter()
                .all(|id| doc.node(id).scroll.at_bottom());
            Interpretation::Value(json!(regions_done && doc.viewport().at_bottom()))
        }
        Probe::LinkClickByText { text } => match doc
            .by_tag(Document::ROOT, "a")
            .into_iter()
            .find(|a| doc.text_content(*a).contains(text.as_str()))
        {
            Some(node) => Interpretation::Click {
                node,
                value: json!(true),
            },
            None => Interpretation::Value(json!(false)),
        },
        Probe::TextareaByLabel { label } => {
            Interpretation::Element(textarea_for_label(doc, label)?)
        }
        Probe::ShadowClickInner { host, inner } => {
            let target = match doc.query(Document::ROOT, host)? {
                Some(host) => match doc.node(host).shadow_root {
                    Some(root) => doc.query(root, inner)?,
                    None => None,
                },
                None => None,
            };
            match target {
                Some(node) => Interpretation::Click {
                    node,
                    value: json!(true),
                },
                None => Interpretation::Value(json!(false)),
            }
        }
        Probe::ButtonClickExact { text } => {
            match doc
                .query_all(Document::ROOT, "button, gux-button")?
                .into_iter()
                .find(|b| trimmed_text_is(doc, *b, text))
            {
                Some(node) => Interpretation::Click {
                    node,
                    value: json!(true),
                },
                None => Interpretation::Value(json!(false)),
            }
        }
        Probe::AnyTextContains { token } => Interpretation::Value(json!(doc
            .descendants(Document::ROOT)
            .into_iter()
            .any(|id| doc.inner_text(id).contains(token.as_str())))),
    };
    Ok(interpretation)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::dom::NodeSpec;

    #[test]
    fn test_shadow_search_prefers_light_tree() {
        let mut doc = Document::new();
        let body = doc.body();
        let host = doc.append(body, NodeSpec::new("wem-player"));
        let root = doc.attach_shadow(host);
        doc.append(root, NodeSpec::new("button").text("Next"));
        let light = doc.append(body, NodeSpec::new("button").text("Next page"));

        let Interpretation::Click { node, .. } =
            interpret(&doc, &Probe::ShadowClickControl { text: "Next".into() }).unwrap()
        else {
            panic!("expected a click");
        };
        assert_eq!(node, light);
    }

    #[test]
    fn test_shadow_search_visits_roots_in_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let mut expected = None;
        for name in ["first", "second"] {
            let host = doc.append(body, NodeSpec::new("wem-panel"));
            let root = doc.attach_shadow(host);
            let button = doc.append(root, NodeSpec::new("gux-button").text(format!("Next {name}")));
            expected.get_or_insert(button);
        }
        let result = interpret(&doc, &Probe::ShadowClickControl { text: "Next".into() }).unwrap();
        assert_eq!(
            result,
            Interpretation::Click {
                node: expected.unwrap(),
                value: json!(true)
            }
        );
    }

    #[test]
    fn test_host_text_without_shadow_root() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.append(body, NodeSpec::new(PROGRESS_BAR_TAG).text("50%"));
        assert_eq!(
            interpret(&doc, &Probe::ProgressHostText).unwrap(),
            Interpretation::Value(json!("50%"))
        );
        assert_eq!(
            interpret(&doc, &Probe::ProgressShadowText).unwrap(),
            Interpretation::Value(json!(""))
        );
    }

    #[test]
    fn test_scroll_probe_defers_to_session() {
        let doc = Document::new();
        assert_eq!(
            interpret(&doc, &Probe::ScrollAllToBottom).unwrap(),
            Interpretation::ScrollAll
        );
        assert_eq!(
            interpret(&doc, &Probe::ScrollSettled).unwrap(),
            Interpretation::Value(json!(true))
        );
    }
}
