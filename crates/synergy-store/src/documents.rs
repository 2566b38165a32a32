//! CRUD operations for JSON documents.
//!
//! The store owns `createdAt`, `updatedAt` and `version`: callers cannot set
//! them. `updatedAt` strictly increases across writes to the same document.

use rusqlite::{params, ErrorCode, OptionalExtension};
use serde_json::{Map, Value};
use synergy_shared::constants::{FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT};
use synergy_shared::timestamp::StoreTimestamp;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ChangeKind, StoredDocument};
use crate::query::Query;

/// A single top-level field modification.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Replace the field.
    Set(Value),
    /// Remove the field.
    Delete,
    /// Append each element not already present in the array.
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of each element from the array.
    ArrayRemove(Vec<Value>),
}

impl FieldUpdate {
    /// Apply this update to `field` of a document body.
    pub fn apply(&self, data: &mut Map<String, Value>, field: &str) {
        match self {
            FieldUpdate::Set(value) => {
                data.insert(field.to_string(), value.clone());
            }
            FieldUpdate::Delete => {
                data.remove(field);
            }
            FieldUpdate::ArrayUnion(values) => {
                let entry = data
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                if let Value::Array(items) = entry {
                    for v in values {
                        if !items.contains(v) {
                            items.push(v.clone());
                        }
                    }
                }
            }
            FieldUpdate::ArrayRemove(values) => {
                if let Some(Value::Array(items)) = data.get_mut(field) {
                    items.retain(|item| !values.contains(item));
                }
            }
        }
    }
}

fn is_store_managed(field: &str) -> bool {
    matches!(field, FIELD_ID | FIELD_CREATED_AT | FIELD_UPDATED_AT)
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a document under a freshly generated id.
    pub fn insert_document(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<StoredDocument> {
        let id = Uuid::new_v4().simple().to_string();
        self.insert_document_with_id(collection, &id, data)
    }

    /// Insert a document under a caller-chosen id. Fails with
    /// [`StoreError::AlreadyExists`] if the id is taken.
    pub fn insert_document_with_id(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<StoredDocument> {
        let doc = new_document(collection, id, data);

        self.conn()
            .execute(
                "INSERT INTO documents (collection, id, data, version) VALUES (?1, ?2, ?3, ?4)",
                params![
                    collection,
                    id,
                    serde_json::to_string(&doc.data)?,
                    doc.version as i64
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::AlreadyExists(format!("{collection}/{id}"))
                }
                other => StoreError::Sqlite(other),
            })?;

        self.feed().publish(collection, id, ChangeKind::Created);
        Ok(doc)
    }

    /// Insert a document unless one already exists under `id`.
    ///
    /// Returns the stored document and whether this call created it. The
    /// check and the insert are a single statement, so concurrent callers
    /// agree on one document.
    pub fn create_document_if_absent(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<(StoredDocument, bool)> {
        let doc = new_document(collection, id, data);

        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO documents (collection, id, data, version) VALUES (?1, ?2, ?3, ?4)",
            params![
                collection,
                id,
                serde_json::to_string(&doc.data)?,
                doc.version as i64
            ],
        )?;

        if inserted == 0 {
            return Ok((self.get_document(collection, id)?, false));
        }

        self.feed().publish(collection, id, ChangeKind::Created);
        Ok((doc, true))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn find_document(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        self.conn()
            .query_row(
                "SELECT collection, id, data, version FROM documents
                 WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                row_to_document,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_document(&self, collection: &str, id: &str) -> Result<StoredDocument> {
        self.find_document(collection, id)?
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))
    }

    /// All documents of a collection, ordered by id.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.conn().prepare(
            "SELECT collection, id, data, version FROM documents
             WHERE collection = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![collection], row_to_document)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn query_documents(&self, query: &Query) -> Result<Vec<StoredDocument>> {
        Ok(query.apply(self.list_documents(&query.collection)?))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply field updates to an existing document and return the result.
    pub fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: &[(String, FieldUpdate)],
    ) -> Result<StoredDocument> {
        let mut doc = self.get_document(collection, id)?;

        for (field, update) in updates {
            if is_store_managed(field) {
                tracing::debug!(collection, id, field = %field, "ignoring store-managed field");
                continue;
            }
            update.apply(&mut doc.data, field);
        }

        let now = StoreTimestamp::now();
        let stamp = match doc.updated_at() {
            Some(prev) if prev >= now => prev.successor(),
            _ => now,
        };
        doc.data.insert(FIELD_UPDATED_AT.to_string(), stamp.to_value());
        doc.version += 1;

        self.conn().execute(
            "UPDATE documents SET data = ?3, version = ?4 WHERE collection = ?1 AND id = ?2",
            params![
                collection,
                id,
                serde_json::to_string(&doc.data)?,
                doc.version as i64
            ],
        )?;

        self.feed().publish(collection, id, ChangeKind::Updated);
        Ok(doc)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a document. Returns `true` if a row was deleted.
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        if affected > 0 {
            self.feed().publish(collection, id, ChangeKind::Deleted);
        }
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_document(collection: &str, id: &str, mut data: Map<String, Value>) -> StoredDocument {
    let now = StoreTimestamp::now().to_value();
    data.remove(FIELD_ID);
    data.insert(FIELD_CREATED_AT.to_string(), now.clone());
    data.insert(FIELD_UPDATED_AT.to_string(), now);

    StoredDocument {
        collection: collection.to_string(),
        id: id.to_string(),
        data,
        version: 1,
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDocument> {
    let collection: String = row.get(0)?;
    let id: String = row.get(1)?;
    let data_str: String = row.get(2)?;
    let version: i64 = row.get(3)?;

    let data: Map<String, Value> = serde_json::from_str(&data_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(StoredDocument {
        collection,
        id,
        data,
        version: u64::try_from(version).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Direction;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_stamps_store_fields() {
        let db = Database::open_in_memory().unwrap();
        let doc = db
            .insert_document("tasks", body(json!({"id": "spoofed", "title": "Write"})))
            .unwrap();

        assert_ne!(doc.id, "spoofed");
        assert!(!doc.data.contains_key("id"));
        assert_eq!(doc.version, 1);
        assert!(doc.created_at().is_some());
        assert_eq!(doc.created_at(), doc.updated_at());

        let fetched = db.get_document("tasks", &doc.id).unwrap();
        assert_eq!(fetched, doc);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document_with_id("chats", "c1", Map::new()).unwrap();
        let err = db.insert_document_with_id("chats", "c1", Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn create_if_absent_returns_existing() {
        let db = Database::open_in_memory().unwrap();
        let (first, created) = db
            .create_document_if_absent("chats", "dm_a_b", body(json!({"n": 1})))
            .unwrap();
        assert!(created);

        let (second, created) = db
            .create_document_if_absent("chats", "dm_a_b", body(json!({"n": 2})))
            .unwrap();
        assert!(!created);
        assert_eq!(second.data["n"], json!(1));
        assert_eq!(second.created_at(), first.created_at());
        assert_eq!(db.list_documents("chats").unwrap().len(), 1);
    }

    #[test]
    fn update_merges_and_bumps_version() {
        let db = Database::open_in_memory().unwrap();
        let doc = db
            .insert_document("tasks", body(json!({"title": "a", "readBy": ["u1"]})))
            .unwrap();

        let updated = db
            .update_document(
                "tasks",
                &doc.id,
                &[
                    ("title".into(), FieldUpdate::Set(json!("b"))),
                    ("readBy".into(), FieldUpdate::ArrayUnion(vec![json!("u1"), json!("u2")])),
                    ("createdAt".into(), FieldUpdate::Delete),
                ],
            )
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.data["title"], json!("b"));
        assert_eq!(updated.data["readBy"], json!(["u1", "u2"]));
        assert_eq!(updated.created_at(), doc.created_at());
        assert!(updated.updated_at() > doc.updated_at());
    }

    #[test]
    fn update_missing_document_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.update_document("tasks", "nope", &[]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.insert_document("tasks", Map::new()).unwrap();
        assert!(db.delete_document("tasks", &doc.id).unwrap());
        assert!(!db.delete_document("tasks", &doc.id).unwrap());
        assert!(db.find_document("tasks", &doc.id).unwrap().is_none());
    }

    #[test]
    fn writes_are_announced() {
        let db = Database::open_in_memory().unwrap();
        let mut rx = db.feed().subscribe();

        let doc = db.insert_document("tasks", Map::new()).unwrap();
        db.update_document("tasks", &doc.id, &[]).unwrap();
        db.delete_document("tasks", &doc.id).unwrap();

        let kinds: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            [ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
        );
    }

    #[test]
    fn query_runs_over_collection() {
        let db = Database::open_in_memory().unwrap();
        db.insert_document("tasks", body(json!({"projectId": "p1", "rank": 2})))
            .unwrap();
        db.insert_document("tasks", body(json!({"projectId": "p1", "rank": 1})))
            .unwrap();
        db.insert_document("tasks", body(json!({"projectId": "p2", "rank": 0})))
            .unwrap();
        db.insert_document("projects", body(json!({"projectId": "p1"})))
            .unwrap();

        let q = Query::collection("tasks")
            .where_eq("projectId", "p1")
            .order_by("rank", Direction::Ascending);
        let ranks: Vec<_> = db
            .query_documents(&q)
            .unwrap()
            .into_iter()
            .map(|d| d.data["rank"].clone())
            .collect();
        assert_eq!(ranks, [json!(1), json!(2)]);
    }
}
