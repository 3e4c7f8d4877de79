//! Locator abstraction for element selection.
//!
//! A [`Locator`] describes zero or more elements in the current document
//! context (top-level document or the frame the session switched into).
//! Resolving a locator that matches nothing is the normal "not yet ready"
//! outcome, never an error by itself.

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., "button.select-org")
    Css {
        /// Selector text
        css: String,
    },
    /// Element id, without the leading `#`
    Id {
        /// Id value
        id: String,
    },
    /// Anchor whose trimmed text equals the value
    LinkText {
        /// Link text
        text: String,
    },
    /// XPath expression (live sessions only)
    XPath {
        /// Expression
        xpath: String,
    },
    /// Element whose own text nodes contain the value
    TextContains {
        /// Text fragment
        text: String,
    },
    /// Tag name
    TagName {
        /// Tag name, lowercase
        tag: String,
    },
    /// CSS selector filtered by `textContent` inclusion
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// JavaScript expression returning every match as an array.
    ///
    /// `root` is an expression evaluating to the document to search.
    #[must_use]
    pub fn to_all_query(&self, root: &str) -> String {
        match self {
            Self::Css { css } => format!("Array.from({root}.querySelectorAll({css:?}))"),
            Self::Id { id } => {
                format!("Array.from([{root}.getElementById({id:?})]).filter(el => el)")
            }
            Self::LinkText { text } => format!(
                "Array.from({root}.querySelectorAll('a')).filter(el => el.textContent.trim() === {text:?})"
            ),
            Self::XPath { xpath } => format!(
                "(() => {{ const r = {root}.evaluate({xpath:?}, {root}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); return out; }})()"
            ),
            Self::TextContains { text } => format!(
                "Array.from({root}.querySelectorAll('*')).filter(el => Array.from(el.childNodes)\
                 .some(n => n.nodeType === 3 && n.textContent.includes({text:?})))"
            ),
            Self::TagName { tag } => format!("Array.from({root}.getElementsByTagName({tag:?}))"),
            Self::CssWithText { css, text } => format!(
                "Array.from({root}.querySelectorAll({css:?})).filter(el => el.textContent.includes({text:?}))"
            ),
        }
    }

    /// JavaScript expression returning the first match or `null`
    #[must_use]
    pub fn to_query(&self, root: &str) -> String {
        format!("({}[0] || null)", self.to_all_query(root))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { css } => write!(f, "css={css}"),
            Self::Id { id } => write!(f, "id={id}"),
            Self::LinkText { text } => write!(f, "link={text:?}"),
            Self::XPath { xpath } => write!(f, "xpath={xpath}"),
            Self::TextContains { text } => write!(f, "text~={text:?}"),
            Self::TagName { tag } => write!(f, "tag={tag}"),
            Self::CssWithText { css, text } => write!(f, "css={css}:has-text({text:?})"),
        }
    }
}

/// A locator for finding elements in the current context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    selector: Selector,
}

impl Locator {
    /// Create a new locator with a CSS selector
    #[must_use]
    pub fn new(css: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css { css: css.into() })
    }

    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self { selector }
    }

    /// Locate by element id
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::from_selector(Selector::Id { id: id.into() })
    }

    /// Locate anchors by exact link text
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::LinkText { text: text.into() })
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::from_selector(Selector::XPath {
            xpath: xpath.into(),
        })
    }

    /// Locate elements whose own text contains `text`
    #[must_use]
    pub fn text_contains(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::TextContains { text: text.into() })
    }

    /// Locate by tag name
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::from_selector(Selector::TagName {
            tag: tag.into().to_ascii_lowercase(),
        })
    }

    /// Narrow a CSS, id or tag locator to elements whose `textContent`
    /// includes `text`.
    ///
    /// Link-text, XPath and text locators already match on text and cannot
    /// carry a second filter; they are rejected as
    /// [`ProbeError::InvalidSelector`].
    pub fn with_text(self, text: impl Into<String>) -> ProbeResult<Self> {
        let css = match self.selector {
            Selector::Css { css } => css,
            Selector::Id { id } => format!("#{id}"),
            Selector::TagName { tag } => tag,
            other => {
                return Err(ProbeError::invalid_selector(
                    other.to_string(),
                    "text filters apply only to css, id and tag locators",
                ))
            }
        };
        Ok(Self::from_selector(Selector::CssWithText {
            css,
            text: text.into(),
        }))
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.selector, f)
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::from_selector(selector)
    }
}
