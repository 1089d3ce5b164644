//! Condition to directory-filter compilation.
//!
//! Conditions come either as attribute/value pairs combined with a single
//! boolean operator, or as a free-text expression made of `attr=value`
//! clauses separated by ` AND ` or ` OR `. Output is always
//! parenthesis-balanced.

use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Filter emitted for an empty condition set.
pub const MATCH_ALL: &str = "(objectClass=*)";

const AND_SEPARATOR: &str = " AND ";
const OR_SEPARATOR: &str = " OR ";

/// Boolean operator joining several terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// `(&...)`
    #[default]
    And,
    /// `(|...)`
    Or,
}

impl Combine {
    fn operator(self) -> char {
        match self {
            Combine::And => '&',
            Combine::Or => '|',
        }
    }
}

/// Query conditions.
///
/// Deserializes from a string (free text), a plain mapping such as
/// `{"cn": "a", "sn": "b"}` (AND-joined, key order kept), or
/// `{"entries": ..., "combine": "or"}` where `entries` is a mapping or a
/// list of pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Conditions {
    /// Attribute/value pairs in insertion order.
    Map {
        entries: Vec<(String, String)>,
        #[serde(default)]
        combine: Combine,
    },
    /// Human-readable expression such as `uid=jdoe OR uid=asmith`.
    Text(String),
}

impl Default for Conditions {
    fn default() -> Self {
        Conditions::Map {
            entries: Vec::new(),
            combine: Combine::And,
        }
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Grouped {
                entries: PairList,
                #[serde(default)]
                combine: Combine,
            },
            Pairs(PairList),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Conditions::Text(text),
            Repr::Grouped { entries, combine } => Conditions::Map {
                entries: entries.0,
                combine,
            },
            Repr::Pairs(entries) => Conditions::Map {
                entries: entries.0,
                combine: Combine::And,
            },
        })
    }
}

/// Attribute/value pairs read from a mapping or a sequence of pairs.
struct PairList(Vec<(String, String)>);

impl<'de> Deserialize<'de> for PairList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairListVisitor;

        impl<'de> Visitor<'de> for PairListVisitor {
            type Value = PairList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of attribute to value or a list of pairs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PairList, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(pair) = map.next_entry::<String, String>()? {
                    pairs.push(pair);
                }
                Ok(PairList(pairs))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PairList, A::Error> {
                let mut pairs = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(pair) = seq.next_element::<(String, String)>()? {
                    pairs.push(pair);
                }
                Ok(PairList(pairs))
            }
        }

        deserializer.deserialize_any(PairListVisitor)
    }
}

impl Conditions {
    /// Pairs that must all match.
    pub fn all_of<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::pairs(entries, Combine::And)
    }

    /// Pairs of which any may match.
    pub fn any_of<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::pairs(entries, Combine::Or)
    }

    /// Single equality condition.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::all_of([(attribute, value)])
    }

    fn pairs<I, K, V>(entries: I, combine: Combine) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Conditions::Map {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            combine,
        }
    }

    /// Check if no condition is set.
    pub fn is_empty(&self) -> bool {
        match self {
            Conditions::Map { entries, .. } => entries.is_empty(),
            Conditions::Text(text) => text.trim().is_empty(),
        }
    }
}

impl From<&str> for Conditions {
    fn from(text: &str) -> Self {
        Conditions::Text(text.to_string())
    }
}

impl From<String> for Conditions {
    fn from(text: String) -> Self {
        Conditions::Text(text)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Conditions {
    fn from(entries: Vec<(K, V)>) -> Self {
        Conditions::all_of(entries)
    }
}

/// Compile conditions into a directory filter string.
pub fn compile(conditions: &Conditions) -> String {
    if conditions.is_empty() {
        return MATCH_ALL.to_string();
    }

    match conditions {
        Conditions::Map { entries, combine } => compile_pairs(entries, *combine),
        Conditions::Text(text) => compile_text(text),
    }
}

fn compile_pairs(entries: &[(String, String)], combine: Combine) -> String {
    let terms: Vec<String> = entries
        .iter()
        .map(|(attribute, value)| {
            format!("({}={})", escape_parens(attribute), escape_value(value))
        })
        .collect();

    match terms.len() {
        0 => MATCH_ALL.to_string(),
        1 => terms.concat(),
        _ => format!("({}{})", combine.operator(), terms.concat()),
    }
}

fn compile_text(text: &str) -> String {
    let text = text.trim();

    // ` OR ` wins when both separators are present.
    let split = if text.contains(OR_SEPARATOR) {
        Some((Combine::Or, OR_SEPARATOR))
    } else if text.contains(AND_SEPARATOR) {
        Some((Combine::And, AND_SEPARATOR))
    } else {
        None
    };

    match split {
        Some((combine, separator)) => {
            let clauses: String = text.split(separator).map(wrap_clause).collect();
            format!("({}{})", combine.operator(), clauses)
        }
        None => wrap_clause(text),
    }
}

/// Wrap a free-text clause in parentheses, neutralizing stray parentheses so
/// the result stays balanced.
fn wrap_clause(clause: &str) -> String {
    let clause = clause.trim();
    if is_balanced(clause) {
        format!("({clause})")
    } else {
        format!("({})", escape_parens(clause))
    }
}

fn escape_parens(s: &str) -> String {
    s.replace('(', "\\28").replace(')', "\\29")
}

fn is_balanced(s: &str) -> bool {
    let mut depth: usize = 0;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// Escape characters in a filter value that would break the filter
/// structure (RFC 4515). `*` is kept so callers can express substring and
/// presence matches.
pub fn escape_value(value: &str) -> String {
    escape_parens(value).replace('\0', "\\00")
}
