//! Mapped object class description.

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, MapperResult};

/// Object classes whose entries are keyed by `cn` in list results.
const GROUP_OBJECT_CLASSES: &[&str] = &["group", "groupofnames", "groupofuniquenames", "posixgroup"];

/// Broad category of a mapped object class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Person,
    Group,
}

impl ObjectKind {
    /// Attribute identifying entries of this kind.
    pub fn key_attribute(self) -> &'static str {
        match self {
            ObjectKind::Person => "uid",
            ObjectKind::Group => "cn",
        }
    }
}

/// One directory object class mapped into records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Label source for shaped results (e.g. "person" → "Person").
    pub name: String,

    /// Subtree searched by `find`.
    pub base_dn: String,

    /// Object class the model maps. Defaults to `name`.
    #[serde(default)]
    pub object_class: Option<String>,

    /// Attributes always appended to the projection.
    #[serde(default)]
    pub default_fields: Vec<String>,

    /// Object classes written on create. Defaults to `top` and the object class.
    #[serde(default)]
    pub object_classes: Vec<String>,

    /// RDN attribute used on create. Derived from the object kind when unset.
    #[serde(default)]
    pub naming_attribute: Option<String>,
}

impl Model {
    /// Create a model for `name` rooted at `base_dn`.
    pub fn new(name: impl Into<String>, base_dn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_dn: base_dn.into(),
            object_class: None,
            default_fields: Vec::new(),
            object_classes: Vec::new(),
            naming_attribute: None,
        }
    }

    /// Set the mapped object class.
    #[must_use]
    pub fn with_object_class(mut self, object_class: impl Into<String>) -> Self {
        self.object_class = Some(object_class.into());
        self
    }

    /// Set the attributes always appended to the projection.
    #[must_use]
    pub fn with_default_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the object classes written on create.
    #[must_use]
    pub fn with_object_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the RDN attribute used on create.
    #[must_use]
    pub fn with_naming_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.naming_attribute = Some(attribute.into());
        self
    }

    /// The mapped object class.
    pub fn object_class(&self) -> &str {
        self.object_class.as_deref().unwrap_or(&self.name)
    }

    /// Person or group, from the object class.
    pub fn kind(&self) -> ObjectKind {
        let class = self.object_class().to_lowercase();
        if GROUP_OBJECT_CLASSES.contains(&class.as_str()) {
            ObjectKind::Group
        } else {
            ObjectKind::Person
        }
    }

    /// Key attribute of list results.
    pub fn list_key(&self) -> &'static str {
        self.kind().key_attribute()
    }

    /// RDN attribute for new entries.
    pub fn naming_attribute(&self) -> &str {
        self.naming_attribute
            .as_deref()
            .unwrap_or_else(|| self.list_key())
    }

    /// Object classes written on create.
    pub fn creation_object_classes(&self) -> Vec<String> {
        if self.object_classes.is_empty() {
            vec!["top".to_string(), self.object_class().to_string()]
        } else {
            self.object_classes.clone()
        }
    }

    /// Validate the model.
    pub fn validate(&self) -> MapperResult<()> {
        if self.name.trim().is_empty() {
            return Err(MapperError::InvalidConfiguration {
                message: "model name is required".to_string(),
            });
        }
        if self.base_dn.trim().is_empty() {
            return Err(MapperError::InvalidConfiguration {
                message: format!("model '{}' has no base DN", self.name),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_model_defaults() {
        let model = Model::new("person", "ou=People,dc=example,dc=com");
        assert_eq!(model.object_class(), "person");
        assert_eq!(model.kind(), ObjectKind::Person);
        assert_eq!(model.list_key(), "uid");
        assert_eq!(model.naming_attribute(), "uid");
        assert_eq!(model.creation_object_classes(), vec!["top", "person"]);
    }

    #[test]
    fn test_group_models_key_by_cn() {
        for class in ["group", "groupOfNames", "groupOfUniqueNames", "posixGroup"] {
            let model = Model::new("group", "ou=Group,dc=example,dc=com").with_object_class(class);
            assert_eq!(model.list_key(), "cn", "{class}");
        }
    }

    #[test]
    fn test_explicit_naming_attribute() {
        let model = Model::new("person", "ou=People,dc=example,dc=com")
            .with_object_class("inetOrgPerson")
            .with_naming_attribute("cn")
            .with_object_classes(["top", "person", "inetOrgPerson"]);

        assert_eq!(model.naming_attribute(), "cn");
        assert_eq!(model.list_key(), "uid");
        assert_eq!(model.creation_object_classes().len(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(Model::new("person", "dc=example,dc=com").validate().is_ok());
        assert!(Model::new("", "dc=example,dc=com").validate().is_err());
        assert!(Model::new("person", " ").validate().is_err());
    }

    #[test]
    fn test_deserialize() {
        let model: Model = serde_json::from_str(
            r#"{"name": "group", "base_dn": "ou=Group,dc=example,dc=com", "object_class": "posixGroup"}"#,
        )
        .unwrap();
        assert_eq!(model.kind(), ObjectKind::Group);
        assert!(model.default_fields.is_empty());
    }
}
