//! Subschema `attributeTypes` parsing (RFC 4512).

use dirmap::schema::SchemaAttributeMap;

/// Build the attribute map from `attributeTypes` values.
///
/// Every alias listed under `NAME` maps to the definition's syntax. A
/// definition without `SYNTAX` (inherited through `SUP`) maps to an empty
/// syntax string.
pub fn parse_attribute_types<'a>(
    definitions: impl IntoIterator<Item = &'a String>,
) -> SchemaAttributeMap {
    let mut map = SchemaAttributeMap::new();
    for definition in definitions {
        let syntax = extract_keyword_value(definition, "SYNTAX")
            .map(|s| strip_length_constraint(&s).to_string())
            .unwrap_or_default();
        for name in extract_names(definition) {
            map.insert(&name, syntax.clone());
        }
    }
    map
}

/// Extract the NAME(s) from a schema definition.
///
/// Handles both `NAME 'cn'` and `NAME ( 'cn' 'commonName' )`.
pub fn extract_names(definition: &str) -> Vec<String> {
    let Some(name_idx) = definition.find(" NAME ") else {
        return Vec::new();
    };
    let after_name = definition[name_idx + 6..].trim_start();

    let scope = if let Some(list) = after_name.strip_prefix('(') {
        match list.find(')') {
            Some(end) => &list[..end],
            None => return Vec::new(),
        }
    } else {
        match after_name.find('\'').and_then(|start| {
            let rest = &after_name[start + 1..];
            rest.find('\'').map(|end| &after_name[..start + end + 2])
        }) {
            Some(single) => single,
            None => return Vec::new(),
        }
    };

    scope
        .split('\'')
        .skip(1)
        .step_by(2)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract a keyword value (e.g., SYNTAX 1.3.6.1.4.1.1466.115.121.1.15).
pub fn extract_keyword_value(definition: &str, keyword: &str) -> Option<String> {
    let pattern = format!(" {keyword} ");
    let idx = definition.find(&pattern)?;
    let after = &definition[idx + pattern.len()..];
    let end = after
        .find(|c: char| c.is_whitespace() || c == ')' || c == '\'')
        .unwrap_or(after.len());
    (end > 0).then(|| after[..end].to_string())
}

fn strip_length_constraint(syntax: &str) -> &str {
    syntax.split('{').next().unwrap_or(syntax)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CN: &str = "( 2.5.4.3 NAME ( 'cn' 'commonName' ) DESC 'RFC4519: common name(s) for which the entity is known by' SUP name )";
    const MAIL: &str = "( 0.9.2342.19200300.100.1.3 NAME ( 'mail' 'rfc822Mailbox' ) DESC 'RFC1274: RFC822 Mailbox' EQUALITY caseIgnoreIA5Match SUBSTR caseIgnoreIA5SubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.26{256} )";
    const UID: &str = "( 0.9.2342.19200300.100.1.1 NAME 'uid' EQUALITY caseIgnoreMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{256} )";
    const PHOTO: &str = "( 0.9.2342.19200300.100.1.7 NAME 'photo' SYNTAX 1.3.6.1.4.1.1466.115.121.1.23 )";

    #[test]
    fn test_extract_name_simple() {
        assert_eq!(extract_names(UID), vec!["uid"]);
    }

    #[test]
    fn test_extract_name_aliases() {
        assert_eq!(extract_names(CN), vec!["cn", "commonName"]);
    }

    #[test]
    fn test_extract_name_missing() {
        assert!(extract_names("( 1.2.3.4 SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 )").is_empty());
    }

    #[test]
    fn test_extract_keyword_value() {
        assert_eq!(
            extract_keyword_value(PHOTO, "SYNTAX"),
            Some("1.3.6.1.4.1.1466.115.121.1.23".to_string())
        );
        assert_eq!(
            extract_keyword_value(UID, "EQUALITY"),
            Some("caseIgnoreMatch".to_string())
        );
        assert!(extract_keyword_value(CN, "SYNTAX").is_none());
    }

    #[test]
    fn test_parse_attribute_types() {
        let definitions: Vec<String> = [CN, MAIL, UID, PHOTO].iter().map(|d| d.to_string()).collect();
        let map = parse_attribute_types(&definitions);

        assert_eq!(map.len(), 6);
        assert_eq!(map.syntax("mail"), Some("1.3.6.1.4.1.1466.115.121.1.26"));
        assert_eq!(map.syntax("RFC822MAILBOX"), Some("1.3.6.1.4.1.1466.115.121.1.26"));
        assert_eq!(map.syntax("uid"), Some("1.3.6.1.4.1.1466.115.121.1.15"));
        assert_eq!(map.syntax("commonName"), Some(""));
        assert!(map.contains("photo"));
    }
}
