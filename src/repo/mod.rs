//! Generic entity repository: parameterized CRUD over the declared tables.
//!
//! SQL text is assembled exclusively from the static identifiers declared
//! in [`crate::entity`]; request bodies contribute parameter values only.
//! The `users` table gets two special cases — a present password is hashed
//! before any write, and an empty password on update is dropped so the
//! stored hash stays untouched.

use crate::auth::credentials::hash_password;
use crate::db::DbPool;
use crate::entity::Entity;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    /// Bad write body: unknown field, wrong value type, missing required field.
    #[error("{0}")]
    Validation(String),
    /// Uniqueness violation (duplicate username).
    #[error("{0}")]
    Conflict(String),
    /// Underlying database failure.
    #[error("database error: {0}")]
    Db(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(e.to_string())
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(e: r2d2::Error) -> Self {
        Self::Db(e.to_string())
    }
}

#[derive(Clone)]
pub struct EntityRepo {
    pool: DbPool,
}

impl EntityRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All rows of an entity table, public columns only, in id order.
    pub fn list(&self, entity: Entity) -> Result<Vec<Map<String, Value>>, RepoError> {
        let sql = format!(
            "SELECT id, {} FROM {} ORDER BY id",
            entity.public_fields().join(", "),
            entity.table()
        );
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| row_to_map(entity, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// A single row by id, or `None`.
    pub fn get(&self, entity: Entity, id: i64) -> Result<Option<Map<String, Value>>, RepoError> {
        let sql = format!(
            "SELECT id, {} FROM {} WHERE id = ?1",
            entity.public_fields().join(", "),
            entity.table()
        );
        let conn = self.pool.get()?;
        let row = conn.query_row(&sql, rusqlite::params![id], |row| row_to_map(entity, row));
        match row {
            Ok(map) => Ok(Some(map)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a row from a validated field set. Returns the new id.
    pub fn create(&self, entity: Entity, fields: &Map<String, Value>) -> Result<i64, RepoError> {
        entity.validate_fields(fields).map_err(RepoError::Validation)?;

        let mut fields = fields.clone();
        if entity == Entity::Users {
            require_non_empty(&fields, "username")?;
            require_non_empty(&fields, "password")?;
            rehash_password_field(&mut fields);
        }

        // Declared order keeps the generated SQL deterministic.
        let columns: Vec<&str> = entity
            .fields()
            .iter()
            .copied()
            .filter(|c| fields.contains_key(*c))
            .collect();
        if columns.is_empty() {
            return Err(RepoError::Validation("No fields provided".into()));
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entity.table(),
            columns.join(", "),
            placeholders.join(", ")
        );
        let params = bind_values(&fields, &columns);

        let conn = self.pool.get()?;
        match conn.execute(&sql, rusqlite::params_from_iter(params)) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(RepoError::Conflict("Record violates a uniqueness constraint".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update a row from a validated field set. Returns the changed count
    /// (0 when the id does not exist).
    pub fn update(
        &self,
        entity: Entity,
        id: i64,
        fields: &Map<String, Value>,
    ) -> Result<usize, RepoError> {
        entity.validate_fields(fields).map_err(RepoError::Validation)?;

        let mut fields = fields.clone();
        let mut password_dropped = false;
        if entity == Entity::Users {
            // An empty or null password means "keep the current one".
            if matches!(
                fields.get("password"),
                Some(Value::Null) | Some(Value::String(_))
            ) && field_is_empty(&fields, "password")
            {
                fields.remove("password");
                password_dropped = true;
            }
            rehash_password_field(&mut fields);
        }

        let columns: Vec<&str> = entity
            .fields()
            .iter()
            .copied()
            .filter(|c| fields.contains_key(*c))
            .collect();
        if columns.is_empty() {
            if password_dropped {
                return Ok(0);
            }
            return Err(RepoError::Validation("No fields provided".into()));
        }

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            entity.table(),
            assignments.join(", "),
            columns.len() + 1
        );
        let mut params = bind_values(&fields, &columns);
        params.push(SqlValue::Integer(id));

        let conn = self.pool.get()?;
        match conn.execute(&sql, rusqlite::params_from_iter(params)) {
            Ok(changed) => Ok(changed),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(RepoError::Conflict("Record violates a uniqueness constraint".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a row. A missing id is a zero count, not an error.
    pub fn delete(&self, entity: Entity, id: i64) -> Result<usize, RepoError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", entity.table());
        let conn = self.pool.get()?;
        Ok(conn.execute(&sql, rusqlite::params![id])?)
    }
}

fn row_to_map(entity: Entity, row: &rusqlite::Row) -> rusqlite::Result<Map<String, Value>> {
    let mut map = Map::new();
    let id: i64 = row.get(0)?;
    map.insert("id".into(), Value::from(id));
    for (i, col) in entity.public_fields().iter().enumerate() {
        let value: Option<String> = row.get(i + 1)?;
        map.insert((*col).into(), value.map(Value::String).unwrap_or(Value::Null));
    }
    Ok(map)
}

fn bind_values(fields: &Map<String, Value>, columns: &[&str]) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|col| match &fields[*col] {
            Value::String(s) => SqlValue::Text(s.clone()),
            // validate_fields admits strings and nulls only
            _ => SqlValue::Null,
        })
        .collect()
}

fn field_is_empty(fields: &Map<String, Value>, key: &str) -> bool {
    match fields.get(key) {
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Null) | None => true,
        _ => false,
    }
}

fn require_non_empty(fields: &Map<String, Value>, key: &str) -> Result<(), RepoError> {
    if field_is_empty(fields, key) {
        return Err(RepoError::Validation(format!("Field '{key}' is required")));
    }
    Ok(())
}

/// Replace a plaintext `password` value with its stored hash form.
fn rehash_password_field(fields: &mut Map<String, Value>) {
    if let Some(Value::String(plain)) = fields.get("password") {
        if !plain.is_empty() {
            let hashed = hash_password(plain);
            fields.insert("password".into(), Value::String(hashed));
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::verify_password;
    use crate::auth::CredentialStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_repo() -> (TempDir, EntityRepo) {
        let tmp = TempDir::new().unwrap();
        let pool = crate::db::open_pool(&tmp.path().join("labtrack.db")).unwrap();
        crate::db::init_schema(&pool).unwrap();
        (tmp, EntityRepo::new(pool))
    }

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn create_get_round_trip() {
        let (_tmp, repo) = test_repo();

        let fields = map(json!({"matid": "M-001", "name": "lysate", "species": "E. coli"}));
        let id = repo.create(Entity::Materials, &fields).unwrap();

        let row = repo.get(Entity::Materials, id).unwrap().unwrap();
        assert_eq!(row["id"], json!(id));
        assert_eq!(row["matid"], json!("M-001"));
        assert_eq!(row["name"], json!("lysate"));
        assert_eq!(row["species"], json!("E. coli"));
        assert_eq!(row["note"], Value::Null);
        assert_eq!(row["interusername"], Value::Null);
    }

    #[test]
    fn list_returns_rows_in_id_order() {
        let (_tmp, repo) = test_repo();

        for name in ["a", "b", "c"] {
            repo.create(Entity::Gels, &map(json!({"gelname": name}))).unwrap();
        }
        let rows = repo.list(Entity::Gels).unwrap();
        assert_eq!(rows.len(), 3);
        let names: Vec<_> = rows.iter().map(|r| r["gelname"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn get_missing_id_is_none() {
        let (_tmp, repo) = test_repo();
        assert!(repo.get(Entity::Plates, 99).unwrap().is_none());
    }

    #[test]
    fn update_changes_row_and_reports_count() {
        let (_tmp, repo) = test_repo();

        let id = repo.create(Entity::Methods, &map(json!({"metid": "MT-1"}))).unwrap();
        let changed = repo
            .update(Entity::Methods, id, &map(json!({"methname": "tryptic digest"})))
            .unwrap();
        assert_eq!(changed, 1);

        let row = repo.get(Entity::Methods, id).unwrap().unwrap();
        assert_eq!(row["methname"], json!("tryptic digest"));
        assert_eq!(row["metid"], json!("MT-1"));
    }

    #[test]
    fn update_missing_id_is_zero_changes() {
        let (_tmp, repo) = test_repo();
        let changed = repo
            .update(Entity::Analysis, 404, &map(json!({"anatype": "2D"})))
            .unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_tmp, repo) = test_repo();

        let id = repo.create(Entity::Proteomes, &map(json!({"mapid": "P-1"}))).unwrap();
        assert_eq!(repo.delete(Entity::Proteomes, id).unwrap(), 1);
        assert_eq!(repo.delete(Entity::Proteomes, id).unwrap(), 0);
    }

    #[test]
    fn create_rejects_unknown_field() {
        let (_tmp, repo) = test_repo();
        let err = repo
            .create(Entity::Materials, &map(json!({"matid": "M", "dropme": "x"})))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn create_rejects_empty_body() {
        let (_tmp, repo) = test_repo();
        let err = repo.create(Entity::Gels, &Map::new()).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn user_create_hashes_password_and_masks_it() {
        let (_tmp, repo) = test_repo();

        let id = repo
            .create(Entity::Users, &map(json!({"username": "alice", "password": "pw1"})))
            .unwrap();

        // Listing and get never expose the password column.
        let row = repo.get(Entity::Users, id).unwrap().unwrap();
        assert!(!row.contains_key("password"));
        let rows = repo.list(Entity::Users).unwrap();
        assert!(rows.iter().all(|r| !r.contains_key("password")));

        // The stored value is a verifiable hash, not plaintext.
        let store = CredentialStore::new(crate::db::open_pool(&_tmp.path().join("labtrack.db")).unwrap());
        let stored = store.find_by_username("alice").unwrap().unwrap();
        assert_ne!(stored.password_hash, "pw1");
        assert!(verify_password("pw1", &stored.password_hash));
    }

    #[test]
    fn user_create_requires_username_and_password() {
        let (_tmp, repo) = test_repo();

        let err = repo
            .create(Entity::Users, &map(json!({"username": "alice"})))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        let err = repo
            .create(Entity::Users, &map(json!({"password": "pw1"})))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn user_duplicate_username_is_conflict() {
        let (_tmp, repo) = test_repo();

        let fields = map(json!({"username": "alice", "password": "pw1"}));
        repo.create(Entity::Users, &fields).unwrap();
        let err = repo.create(Entity::Users, &fields).unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    #[test]
    fn user_update_with_empty_password_keeps_old_hash() {
        let (_tmp, repo) = test_repo();
        let store = CredentialStore::new(crate::db::open_pool(&_tmp.path().join("labtrack.db")).unwrap());

        let id = repo
            .create(Entity::Users, &map(json!({"username": "alice", "password": "pw1"})))
            .unwrap();

        let changed = repo
            .update(Entity::Users, id, &map(json!({"fullname": "Alice A.", "password": ""})))
            .unwrap();
        assert_eq!(changed, 1);
        assert!(store.authenticate("alice", "pw1").unwrap().is_some());

        // Password-only empty update is a no-op, not an error.
        let changed = repo
            .update(Entity::Users, id, &map(json!({"password": ""})))
            .unwrap();
        assert_eq!(changed, 0);
        assert!(store.authenticate("alice", "pw1").unwrap().is_some());
    }

    #[test]
    fn user_update_with_new_password_invalidates_old_one() {
        let (_tmp, repo) = test_repo();
        let store = CredentialStore::new(crate::db::open_pool(&_tmp.path().join("labtrack.db")).unwrap());

        let id = repo
            .create(Entity::Users, &map(json!({"username": "alice", "password": "pw1"})))
            .unwrap();
        repo.update(Entity::Users, id, &map(json!({"password": "pw2"}))).unwrap();

        assert!(store.authenticate("alice", "pw1").unwrap().is_none());
        assert!(store.authenticate("alice", "pw2").unwrap().is_some());
    }
}
