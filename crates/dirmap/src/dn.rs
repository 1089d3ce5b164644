//! Distinguished-name parsing and synthesis.
//!
//! Parsing is deliberately simple: components are split on `,` and each
//! component on its first `=`. Escaped separators are not interpreted.

use crate::error::{MapperError, MapperResult};
use crate::record::Value;

/// Ordered attribute → value mapping of a DN's components.
///
/// A repeated attribute (e.g. several `dc` components) collects its values
/// into a sequence under one key, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnComponents {
    entries: Vec<(String, Value)>,
}

impl DnComponents {
    /// Create an empty component mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component using builder pattern.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Add a component; a repeated attribute extends its value sequence.
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        let attribute = attribute.into();
        match self.entries.iter_mut().find(|(a, _)| *a == attribute) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((attribute, Value::Single(value.into()))),
        }
    }

    /// Value(s) of an attribute.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(a, _)| a == attribute)
            .map(|(_, v)| v)
    }

    /// Iterate over the components in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(a, v)| (a.as_str(), v))
    }

    /// Get the number of distinct attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no components.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a DN into its attribute → value mapping.
pub fn parse(dn: &str) -> MapperResult<DnComponents> {
    let mut components = DnComponents::new();
    for (attribute, value) in split_components(dn)? {
        components.insert(attribute, value);
    }
    Ok(components)
}

/// Parse a DN into its ordered component values, discarding attribute names.
pub fn parse_values(dn: &str) -> MapperResult<Vec<String>> {
    Ok(split_components(dn)?
        .into_iter()
        .map(|(_, value)| value.to_string())
        .collect())
}

/// Value of a DN's first component, e.g. `Group` for
/// `ou=Group,dc=example,dc=com`.
pub fn leaf_label(dn: &str) -> MapperResult<String> {
    parse_values(dn)?
        .into_iter()
        .next()
        .ok_or_else(|| MapperError::MalformedDn {
            dn: dn.to_string(),
            component: String::new(),
        })
}

fn split_components(dn: &str) -> MapperResult<Vec<(&str, &str)>> {
    if dn.trim().is_empty() {
        return Ok(Vec::new());
    }

    dn.split(',')
        .map(|component| {
            component
                .split_once('=')
                .map(|(attribute, value)| (attribute.trim(), value.trim()))
                .ok_or_else(|| MapperError::MalformedDn {
                    dn: dn.to_string(),
                    component: component.to_string(),
                })
        })
        .collect()
}

/// Source of the relative part of a DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdnSource {
    /// A partial DN used as-is.
    Literal(String),
    /// Components rendered as `attribute=value` in order.
    Components(DnComponents),
}

impl From<&str> for RdnSource {
    fn from(s: &str) -> Self {
        RdnSource::Literal(s.to_string())
    }
}

impl From<String> for RdnSource {
    fn from(s: String) -> Self {
        RdnSource::Literal(s)
    }
}

impl From<DnComponents> for RdnSource {
    fn from(components: DnComponents) -> Self {
        RdnSource::Components(components)
    }
}

/// Build a DN from components (or a literal partial DN) and a base DN.
pub fn build(relative: impl Into<RdnSource>, base_dn: &str) -> String {
    let relative = match relative.into() {
        RdnSource::Literal(literal) => literal,
        RdnSource::Components(components) => components
            .iter()
            .flat_map(|(attribute, value)| {
                value
                    .values()
                    .into_iter()
                    .map(move |v| format!("{attribute}={v}"))
            })
            .collect::<Vec<_>>()
            .join(","),
    };

    match (relative.is_empty(), base_dn.is_empty()) {
        (true, _) => base_dn.to_string(),
        (false, true) => relative,
        (false, false) => format!("{relative},{base_dn}"),
    }
}

/// Escape a DN attribute value per RFC 4514.
///
/// Characters that must be escaped:
/// - Leading or trailing SPACE (escaped as \20)
/// - Leading # (escaped as \23)
/// - Characters: , + " \ < > ; = (escaped with backslash prefix)
/// - NUL character (escaped as \00)
pub fn escape_value(value: &str) -> String {
    let char_count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == char_count;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}
