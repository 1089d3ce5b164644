//! Attribute projection.

/// Attributes requested by a caller, either already split or as a single
/// comma-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldList {
    /// Already-split attribute names.
    List(Vec<String>),
    /// `"cn, mail, uid"`
    Csv(String),
    /// Nothing requested.
    #[default]
    None,
}

impl FieldList {
    /// Split into trimmed attribute names, dropping empty pieces.
    pub fn into_names(self) -> Vec<String> {
        match self {
            FieldList::List(names) => names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            FieldList::Csv(csv) => csv
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
            FieldList::None => Vec::new(),
        }
    }
}

impl From<&str> for FieldList {
    fn from(csv: &str) -> Self {
        FieldList::Csv(csv.to_string())
    }
}

impl From<String> for FieldList {
    fn from(csv: String) -> Self {
        FieldList::Csv(csv)
    }
}

impl From<Vec<String>> for FieldList {
    fn from(names: Vec<String>) -> Self {
        FieldList::List(names)
    }
}

impl From<Vec<&str>> for FieldList {
    fn from(names: Vec<&str>) -> Self {
        FieldList::List(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FieldList {
    fn from(names: [&str; N]) -> Self {
        FieldList::List(names.iter().map(|n| (*n).to_string()).collect())
    }
}

/// Build the final projection: requested attributes followed by the
/// always-included defaults. Order is kept and duplicates are allowed.
pub fn select(requested: impl Into<FieldList>, defaults: &[String]) -> Vec<String> {
    let mut fields = requested.into().into_names();
    fields.extend(defaults.iter().cloned());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_from_list() {
        let defaults = vec!["objectClass".to_string()];
        assert_eq!(
            select(vec!["cn", "mail"], &defaults),
            vec!["cn", "mail", "objectClass"]
        );
    }

    #[test]
    fn test_select_from_csv_trims() {
        let defaults = vec!["uid".to_string()];
        assert_eq!(
            select(" cn ,mail,, sn", &defaults),
            vec!["cn", "mail", "sn", "uid"]
        );
    }

    #[test]
    fn test_select_keeps_duplicates() {
        let defaults = vec!["uid".to_string(), "cn".to_string()];
        assert_eq!(select(["uid"], &defaults), vec!["uid", "uid", "cn"]);
    }

    #[test]
    fn test_select_nothing_requested() {
        assert!(select(FieldList::None, &[]).is_empty());
        assert_eq!(select("", &["dn".to_string()]), vec!["dn"]);
    }
}
