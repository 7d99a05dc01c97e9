//! Closed registry of LIMS entities and their declared field schemas.
//!
//! Every table the API can touch is listed here as an [`Entity`] variant.
//! Request paths carry an entity *tag* (`/api/materials`), and the only way
//! a tag reaches SQL is through [`Entity::from_tag`] — a client-supplied
//! string is never forwarded into a table reference. Unknown tags are a
//! routing miss, not a database error.
//!
//! Field names double as the wire-level JSON keys and the column names, so
//! write bodies are validated against the declared list before any SQL is
//! assembled. `password` on `users` is write-only: accepted in request
//! bodies, excluded from every outbound row.

use serde_json::{Map, Value};

/// One CRUD-addressable entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Users,
    Materials,
    Gels,
    Plates,
    Analysis,
    Methods,
    Proteomes,
}

/// Writable columns per table (the `id` column is store-assigned).
const USER_FIELDS: &[&str] = &["username", "password", "fullname", "affiliation", "note", "role"];
/// `users` columns that appear in outbound rows — everything but the hash.
const USER_PUBLIC_FIELDS: &[&str] = &["username", "fullname", "affiliation", "note", "role"];
const MATERIAL_FIELDS: &[&str] = &["matid", "interusername", "name", "species", "note"];
const GEL_FIELDS: &[&str] = &["gelid", "gelname", "geltype", "note"];
const PLATE_FIELDS: &[&str] = &["plateid", "platename", "platenumber"];
const ANALYSIS_FIELDS: &[&str] = &["analid", "anatype", "note"];
const METHOD_FIELDS: &[&str] = &["metid", "methname", "note"];
const PROTEOME_FIELDS: &[&str] = &["mapid", "species", "note"];

impl Entity {
    pub const ALL: [Entity; 7] = [
        Entity::Users,
        Entity::Materials,
        Entity::Gels,
        Entity::Plates,
        Entity::Analysis,
        Entity::Methods,
        Entity::Proteomes,
    ];

    /// Resolve a path tag to an entity. This is the allow-list: anything
    /// not matched here ("../etc", "sqlite_master", ...) is `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "users" => Some(Self::Users),
            "materials" => Some(Self::Materials),
            "gels" => Some(Self::Gels),
            "plates" => Some(Self::Plates),
            "analysis" => Some(Self::Analysis),
            "methods" => Some(Self::Methods),
            "proteomes" => Some(Self::Proteomes),
            _ => None,
        }
    }

    /// Table name. Identical to the tag; kept separate so SQL assembly
    /// never reads back from request input.
    pub fn table(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Materials => "materials",
            Self::Gels => "gels",
            Self::Plates => "plates",
            Self::Analysis => "analysis",
            Self::Methods => "methods",
            Self::Proteomes => "proteomes",
        }
    }

    /// Columns a write body may contain.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Users => USER_FIELDS,
            Self::Materials => MATERIAL_FIELDS,
            Self::Gels => GEL_FIELDS,
            Self::Plates => PLATE_FIELDS,
            Self::Analysis => ANALYSIS_FIELDS,
            Self::Methods => METHOD_FIELDS,
            Self::Proteomes => PROTEOME_FIELDS,
        }
    }

    /// Columns included in list/get responses.
    pub fn public_fields(self) -> &'static [&'static str] {
        match self {
            Self::Users => USER_PUBLIC_FIELDS,
            other => other.fields(),
        }
    }

    /// Validate a write body against the declared schema.
    ///
    /// Unknown keys are rejected outright; values must be JSON strings or
    /// null (every non-id column is TEXT).
    pub fn validate_fields(self, fields: &Map<String, Value>) -> Result<(), String> {
        for (key, value) in fields {
            if !self.fields().contains(&key.as_str()) {
                return Err(format!("Unknown field '{key}' for entity '{}'", self.table()));
            }
            match value {
                Value::String(_) | Value::Null => {}
                _ => return Err(format!("Field '{key}' must be a string")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn from_tag_accepts_all_known_entities() {
        for entity in Entity::ALL {
            assert_eq!(Entity::from_tag(entity.table()), Some(entity));
        }
    }

    #[test]
    fn from_tag_rejects_unknown_tags() {
        for tag in ["../etc", "sqlite_master", "users;drop table users", "", "Users", "material"] {
            assert_eq!(Entity::from_tag(tag), None, "tag {tag:?} must not resolve");
        }
    }

    #[test]
    fn users_public_fields_exclude_password() {
        assert!(!Entity::Users.public_fields().contains(&"password"));
        assert!(Entity::Users.fields().contains(&"password"));
    }

    #[test]
    fn non_user_public_fields_match_declared() {
        assert_eq!(Entity::Gels.public_fields(), Entity::Gels.fields());
    }

    #[test]
    fn validate_accepts_declared_string_fields() {
        let fields = map(json!({"matid": "M-001", "name": "lysate", "note": null}));
        assert!(Entity::Materials.validate_fields(&fields).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_field() {
        let fields = map(json!({"matid": "M-001", "evil_column": "x"}));
        let err = Entity::Materials.validate_fields(&fields).unwrap_err();
        assert!(err.contains("evil_column"));
    }

    #[test]
    fn validate_rejects_non_string_values() {
        let fields = map(json!({"plateid": 42}));
        let err = Entity::Plates.validate_fields(&fields).unwrap_err();
        assert!(err.contains("plateid"));
    }
}
