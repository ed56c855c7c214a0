//! # Identity Newtypes — Class Tags and Reference Identifiers
//!
//! Newtype wrappers for the two identifier namespaces of the engine.
//! These prevent accidental confusion — a class tag cannot be passed where
//! a reference identifier is expected.
//!
//! ## Validation
//!
//! Both newtypes validate their input at construction time and keep their
//! inner value private; the only way to construct them is through the
//! validated constructors.
//!
//! - [`ClassTag`] names a host type. The engine has no class system of its
//!   own (class integration is an external concern), so a tag is the
//!   stand-in a host maps its types onto.
//! - [`RefId`] is the canonical key form of an identifier value: the JSON
//!   text of a non-null primitive. Keying by canonical text keeps `1` and
//!   `"1"` distinct.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeserializeError, SchemaError};
use crate::value::json_kind;

// ---------------------------------------------------------------------------
// ClassTag
// ---------------------------------------------------------------------------

/// A validated tag naming a host type.
///
/// # Validation
///
/// - Must be non-empty.
/// - Must contain only ASCII alphanumeric characters, `-`, `_` and `.`.
///
/// The tag `"object"` is reserved for the root object type and cannot carry
/// a model schema of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassTag(String);

impl ClassTag {
    /// The reserved root-object tag.
    pub const OBJECT: &'static str = "object";

    /// Create a new class tag with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is empty or contains characters outside
    /// the permitted set.
    pub fn new(tag: impl Into<String>) -> Result<Self, SchemaError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(SchemaError::EmptyTag);
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(SchemaError::InvalidTag(tag));
        }
        Ok(Self(tag))
    }

    /// Whether this is the reserved root-object tag.
    pub fn is_root_object(&self) -> bool {
        self.0 == Self::OBJECT
    }

    /// Access the inner tag string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClassTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RefId
// ---------------------------------------------------------------------------

/// The canonical key form of an identifier value.
///
/// Reference bookkeeping keys its tables by the JSON text of the published
/// identifier, so any non-null primitive works as an identity: integers,
/// strings, booleans. Null and composite values are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefId(String);

impl RefId {
    /// Build a reference identifier from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is null, an array, or an object.
    pub fn from_value(value: &Value) -> Result<Self, DeserializeError> {
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) => {
                Err(DeserializeError::InvalidIdentifier {
                    kind: json_kind(value),
                })
            }
            other => Ok(Self(other.to_string())),
        }
    }

    /// The canonical JSON text of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ---- ClassTag ----

    #[test]
    fn test_class_tag_valid() {
        let tag = ClassTag::new("user").unwrap();
        assert_eq!(tag.as_str(), "user");
        assert!(!tag.is_root_object());
    }

    #[test]
    fn test_class_tag_dotted() {
        assert!(ClassTag::new("app.todo-item_v2").is_ok());
    }

    #[test]
    fn test_class_tag_empty_rejected() {
        assert!(matches!(ClassTag::new(""), Err(SchemaError::EmptyTag)));
    }

    #[test]
    fn test_class_tag_special_chars_rejected() {
        assert!(ClassTag::new("user profile").is_err());
        assert!(ClassTag::new("user/profile").is_err());
    }

    #[test]
    fn test_class_tag_root_object() {
        let tag = ClassTag::new(ClassTag::OBJECT).unwrap();
        assert!(tag.is_root_object());
    }

    #[test]
    fn test_class_tag_display() {
        let tag = ClassTag::new("post").unwrap();
        assert_eq!(format!("{tag}"), "post");
    }

    // ---- RefId ----

    #[test]
    fn test_ref_id_from_number() {
        let id = RefId::from_value(&json!(99)).unwrap();
        assert_eq!(id.as_str(), "99");
    }

    #[test]
    fn test_ref_id_from_string_keeps_quotes() {
        let id = RefId::from_value(&json!("abc")).unwrap();
        assert_eq!(id.as_str(), "\"abc\"");
    }

    #[test]
    fn test_ref_id_distinguishes_number_from_string() {
        let n = RefId::from_value(&json!(1)).unwrap();
        let s = RefId::from_value(&json!("1")).unwrap();
        assert_ne!(n, s);
    }

    #[test]
    fn test_ref_id_uuid_text() {
        let uuid = uuid::Uuid::new_v4().to_string();
        let id = RefId::from_value(&json!(uuid.clone())).unwrap();
        assert!(id.as_str().contains(&uuid));
    }

    #[test]
    fn test_ref_id_rejects_null_and_composites() {
        assert!(RefId::from_value(&json!(null)).is_err());
        assert!(RefId::from_value(&json!([1])).is_err());
        assert!(RefId::from_value(&json!({"id": 1})).is_err());
    }
}
