//! Minimal CSS selector matching for the mock DOM.
//!
//! Supports type, universal, `#id`, `.class`, `[attr]` and `[attr=value]`
//! (quoted or bare) compounds, descendant combinators and comma-separated
//! selector lists. Anything else is rejected as an invalid selector.

use super::dom::{Document, NodeId};
use crate::result::{ProbeError, ProbeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let node = doc.node(id);
        if let Some(tag) = &self.tag {
            if node.tag != *tag {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if node.attr("id") != Some(want.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = node.attr("class").unwrap_or_default();
            let have: Vec<&str> = classes.split_whitespace().collect();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|a| match (&a.value, node.attr(&a.name)) {
            (None, found) => found.is_some(),
            (Some(want), Some(found)) => want == found,
            (Some(_), None) => false,
        })
    }
}

/// Compounds joined by descendant combinators, left to right
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex(Vec<Compound>);

impl Complex {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some((last, ancestors)) = self.0.split_last() else {
            return false;
        };
        if !last.matches(doc, id) {
            return false;
        }
        let mut cursor = doc.node(id).parent;
        for compound in ancestors.iter().rev() {
            loop {
                let Some(candidate) = cursor else {
                    return false;
                };
                cursor = doc.node(candidate).parent;
                if compound.matches(doc, candidate) {
                    break;
                }
            }
        }
        true
    }
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    alternatives: Vec<Complex>,
}

impl SelectorList {
    /// Parse a selector list
    pub fn parse(source: &str) -> ProbeResult<Self> {
        let invalid = |message: &str| ProbeError::invalid_selector(source, message);
        let mut alternatives = Vec::new();
        for part in split_outside_brackets(source, |c| c == ',') {
            let mut compounds = Vec::new();
            for token in split_outside_brackets(&part, char::is_whitespace) {
                if token.is_empty() {
                    continue;
                }
                compounds.push(parse_compound(&token).map_err(|m| invalid(&m))?);
            }
            if compounds.is_empty() {
                return Err(invalid("empty selector"));
            }
            alternatives.push(Complex(compounds));
        }
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// Whether a node matches any alternative
    #[must_use]
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(doc, id))
    }

    /// Original selector text
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn split_outside_brackets(input: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, _) if depth == 0 && is_sep(c) => {
                parts.push(std::mem::take(&mut current).trim().to_string());
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> Result<String, String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    if *pos == start {
        return Err(format!("expected identifier at offset {start}"));
    }
    Ok(chars[start..*pos].iter().collect())
}

fn parse_compound(token: &str) -> Result<Compound, String> {
    let chars: Vec<char> = token.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if chars.first() == Some(&'*') {
        pos = 1;
    } else if chars.first().is_some_and(|c| is_ident_char(*c)) {
        compound.tag = Some(take_ident(&chars, &mut pos)?.to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                compound.id = Some(take_ident(&chars, &mut pos)?);
            }
            '.' => {
                pos += 1;
                compound.classes.push(take_ident(&chars, &mut pos)?);
            }
            '[' => {
                pos += 1;
                let name = take_ident(&chars, &mut pos)?.to_ascii_lowercase();
                let value = match chars.get(pos) {
                    Some(']') => None,
                    Some('=') => {
                        pos += 1;
                        Some(take_attr_value(&chars, &mut pos)?)
                    }
                    _ => return Err(format!("unsupported attribute operator in {token}")),
                };
                if chars.get(pos) != Some(&']') {
                    return Err(format!("unclosed attribute selector in {token}"));
                }
                pos += 1;
                compound.attrs.push(AttrMatch { name, value });
            }
            c => return Err(format!("unsupported selector syntax {c:?} in {token}")),
        }
    }
    Ok(compound)
}

fn take_attr_value(chars: &[char], pos: &mut usize) -> Result<String, String> {
    match chars.get(*pos) {
        Some(&q) if q == '\'' || q == '"' => {
            let start = *pos + 1;
            let end = chars[start..]
                .iter()
                .position(|c| *c == q)
                .map(|i| start + i)
                .ok_or_else(|| "unterminated string".to_string())?;
            *pos = end + 1;
            Ok(chars[start..end].iter().collect())
        }
        _ => take_ident(chars, pos),
    }
}
