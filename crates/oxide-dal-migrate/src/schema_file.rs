//! Desired-schema files.
//!
//! A schema file is JSON holding either `{"models": [...]}` or a bare array
//! of models, each deserialized straight into [`Model`].

use std::path::Path;

use oxide_dal_core::Model;
use serde::Deserialize;

use crate::error::Result;

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Wrapped { models: Vec<Model> },
    Bare(Vec<Model>),
}

/// Parses schema JSON.
///
/// # Errors
///
/// Returns [`MigrateError::Serialization`](crate::MigrateError::Serialization)
/// for malformed input.
pub fn parse(text: &str) -> Result<Vec<Model>> {
    Ok(match serde_json::from_str(text)? {
        SchemaFile::Wrapped { models } | SchemaFile::Bare(models) => models,
    })
}

/// Reads and parses a schema file.
///
/// # Errors
///
/// Returns IO errors and [`parse`] errors.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Model>> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use oxide_dal_core::schema::DataType;

    use super::*;
    use crate::error::MigrateError;

    const USERS: &str = r#"{
        "models": [
            {
                "name": "User",
                "table": "users",
                "fields": [
                    {"name": "id", "data_type": "big_int", "primary_key": true, "auto_increment": true, "nullable": false},
                    {"name": "email", "data_type": "varchar", "size": 200, "unique": true}
                ],
                "indexes": [{"name": "idx_users_email", "columns": ["email"]}]
            }
        ]
    }"#;

    #[test]
    fn test_parse_wrapped() {
        let models = parse(USERS).unwrap();
        assert_eq!(models.len(), 1);
        let user = &models[0];
        assert_eq!(user.table, "users");
        assert_eq!(user.fields[1].data_type, DataType::Varchar);
        assert_eq!(user.fields[1].size, Some(200));
        assert!(user.fields[1].nullable);
        assert_eq!(user.indexes[0].columns, vec!["email"]);
    }

    #[test]
    fn test_parse_bare_array() {
        let models = parse(r#"[{"name": "Tag", "table": "tags", "fields": [{"name": "label", "data_type": "text"}]}]"#).unwrap();
        assert_eq!(models[0].name, "Tag");
        assert!(models[0].constraints.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse("{\"tables\": 3}"), Err(MigrateError::Serialization(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(USERS.as_bytes()).unwrap();
        let models = load(file.path()).unwrap();
        assert_eq!(models[0].fields.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
