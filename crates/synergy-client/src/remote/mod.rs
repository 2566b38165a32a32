//! Remote Access Layer.
//!
//! [`RemoteAccess`] is the only component that talks to the document store.
//! It converts typed entities to store documents and back:
//!
//! - on write the `id` field is stripped (the store owns it), along with
//!   the store-managed `createdAt` / `updatedAt`, and every declared
//!   timestamp is converted to the store's native representation;
//! - on read the native timestamps are converted back and the document id
//!   is injected as `id`.
//!
//! Entity-specific operations live in the submodules as further `impl
//! RemoteAccess` blocks.

mod chats;
mod discussions;
mod projects;
mod tasks;
mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use synergy_shared::constants::{FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT};
use synergy_shared::timestamp::{decode_fields, encode_fields, to_local_value};
use synergy_shared::{Document, Result, SynergyError};
use synergy_store::{Direction, FieldUpdate, Query, StoredDocument};

use crate::backend::DocumentStore;
use crate::subscription::Subscription;

pub use tasks::status_patch;

/// A partial update: field name to modification, in local representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Vec<(String, FieldUpdate)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields
            .push((field.to_string(), FieldUpdate::Set(value.into())));
        self
    }

    /// Set a serializable value such as an enum.
    pub fn set_value<V: Serialize>(self, field: &str, value: &V) -> Result<Self> {
        Ok(self.set(field, serde_json::to_value(value)?))
    }

    /// Set a date, or null to clear it.
    pub fn set_time(self, field: &str, value: Option<DateTime<Utc>>) -> Self {
        self.set(field, value.map(to_local_value).unwrap_or(Value::Null))
    }

    pub fn delete(mut self, field: &str) -> Self {
        self.fields.push((field.to_string(), FieldUpdate::Delete));
        self
    }

    pub fn array_union(mut self, field: &str, values: Vec<Value>) -> Self {
        self.fields
            .push((field.to_string(), FieldUpdate::ArrayUnion(values)));
        self
    }

    pub fn array_remove(mut self, field: &str, values: Vec<Value>) -> Self {
        self.fields
            .push((field.to_string(), FieldUpdate::ArrayRemove(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, FieldUpdate)] {
        &self.fields
    }

    /// Drop every modification of `field`.
    pub fn without(mut self, field: &str) -> Self {
        self.fields.retain(|(f, _)| f != field);
        self
    }

    pub fn touches(&self, field: &str) -> bool {
        self.fields.iter().any(|(f, _)| f == field)
    }

    /// The last value this patch sets `field` to.
    pub fn value_of(&self, field: &str) -> Option<&Value> {
        self.fields.iter().rev().find_map(|(f, update)| match update {
            FieldUpdate::Set(value) if f == field => Some(value),
            _ => None,
        })
    }

    /// Shallow-merge into a local entity. Fields the patch does not name
    /// keep their values.
    pub fn apply_to<T: Serialize + DeserializeOwned>(&self, entity: &T) -> Result<T> {
        let mut data = to_object(entity)?;
        for (field, update) in &self.fields {
            update.apply(&mut data, field);
        }
        Ok(serde_json::from_value(Value::Object(data))?)
    }

    /// The store form of this patch for entity type `T`.
    fn encode<T: Document>(&self) -> Result<Vec<(String, FieldUpdate)>> {
        let paths = timestamp_paths::<T>();
        self.fields
            .iter()
            .map(|(field, update)| {
                let encoded = match update {
                    FieldUpdate::Set(value) => {
                        FieldUpdate::Set(encode_single(field, value.clone(), &paths)?)
                    }
                    FieldUpdate::ArrayUnion(values) => FieldUpdate::ArrayUnion(encode_items(
                        field, values, &paths,
                    )?),
                    FieldUpdate::ArrayRemove(values) => FieldUpdate::ArrayRemove(encode_items(
                        field, values, &paths,
                    )?),
                    FieldUpdate::Delete => FieldUpdate::Delete,
                };
                Ok((field.clone(), encoded))
            })
            .collect()
    }
}

/// Typed access to the remote document store.
#[derive(Clone)]
pub struct RemoteAccess {
    store: Arc<dyn DocumentStore>,
}

impl RemoteAccess {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a document under a store-assigned id and return that id.
    pub async fn create<T: Document>(&self, entity: &T) -> Result<String> {
        Ok(self.insert(entity).await?.id().to_string())
    }

    /// Create a document and return it as stored, with the assigned id and
    /// server timestamps.
    pub async fn insert<T: Document>(&self, entity: &T) -> Result<T> {
        entity.validate()?;
        let doc = self.store.create(T::COLLECTION, encode(entity)?).await?;
        debug!(collection = T::COLLECTION, id = %doc.id, "Document created");
        decode(doc)
    }

    /// Create a document under `id` unless one exists. Returns the stored
    /// document and whether this call created it.
    pub async fn create_with_id<T: Document>(&self, id: &str, entity: &T) -> Result<(T, bool)> {
        entity.validate()?;
        let (doc, created) = self
            .store
            .create_if_absent(T::COLLECTION, id, encode(entity)?)
            .await?;
        debug!(collection = T::COLLECTION, id, created, "Create-if-absent");
        Ok((decode(doc)?, created))
    }

    pub async fn get_by_id<T: Document>(&self, id: &str) -> Result<Option<T>> {
        self.store
            .get(T::COLLECTION, id)
            .await?
            .map(decode)
            .transpose()
    }

    /// Like [`get_by_id`](Self::get_by_id) but a missing document is an error.
    pub async fn require<T: Document>(&self, id: &str) -> Result<T> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| SynergyError::NotFound(format!("{}/{id}", T::COLLECTION)))
    }

    /// Equality query on one field, optionally ordered.
    pub async fn query_by_field<T: Document>(
        &self,
        field: &str,
        value: impl Into<Value>,
        order: Option<(&str, Direction)>,
    ) -> Result<Vec<T>> {
        let mut query = Query::collection(T::COLLECTION).where_eq(field, value);
        if let Some((field, direction)) = order {
            query = query.order_by(field, direction);
        }
        self.query(&query).await
    }

    pub async fn query<T: Document>(&self, query: &Query) -> Result<Vec<T>> {
        let docs = self.store.query(query).await?;
        Ok(decode_all(docs))
    }

    /// Apply a partial update and return the document as stored afterwards.
    ///
    /// The patch is first applied to the current copy: if the result no
    /// longer decodes as `T` or breaks one of its invariants, nothing is
    /// written.
    pub async fn update<T: Document>(&self, id: &str, patch: &Patch) -> Result<T> {
        let current: T = self.require(id).await?;
        patch.apply_to(&current)?.validate()?;

        let doc = self
            .store
            .update(T::COLLECTION, id, patch.encode::<T>()?)
            .await?;
        debug!(collection = T::COLLECTION, id, version = doc.version, "Document updated");
        decode(doc)
    }

    pub async fn delete<T: Document>(&self, id: &str) -> Result<()> {
        self.store.delete(T::COLLECTION, id).await?;
        debug!(collection = T::COLLECTION, id, "Document deleted");
        Ok(())
    }

    /// Start a live query with its own cancellation token.
    pub fn subscribe<T: Document>(&self, query: Query) -> Result<Subscription<T>> {
        self.subscribe_with_token(query, CancellationToken::new())
    }

    /// Start a live query that also stops when `parent` is cancelled.
    pub fn subscribe_child<T: Document>(
        &self,
        query: Query,
        parent: &CancellationToken,
    ) -> Result<Subscription<T>> {
        self.subscribe_with_token(query, parent.child_token())
    }

    fn subscribe_with_token<T: Document>(
        &self,
        query: Query,
        token: CancellationToken,
    ) -> Result<Subscription<T>> {
        if query.collection != T::COLLECTION {
            return Err(SynergyError::Internal(format!(
                "query on {} cannot yield {}",
                query.collection,
                T::COLLECTION
            )));
        }
        let label = format!("{}:{}", query.collection, query.filters.len());
        let rx = self.store.listen(query, token.clone())?;
        Ok(Subscription::new(rx, token, label))
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

fn timestamp_paths<T: Document>() -> Vec<&'static str> {
    T::REQUIRED_TIMESTAMPS
        .iter()
        .chain(T::OPTIONAL_TIMESTAMPS)
        .copied()
        .collect()
}

fn to_object<T: Serialize>(entity: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => Err(SynergyError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Entity to store document body.
pub(crate) fn encode<T: Document>(entity: &T) -> Result<Map<String, Value>> {
    let mut data = to_object(entity)?;
    data.remove(FIELD_ID);
    data.remove(FIELD_CREATED_AT);
    data.remove(FIELD_UPDATED_AT);
    encode_fields(&mut data, &timestamp_paths::<T>())?;
    Ok(data)
}

/// Store document to entity.
pub(crate) fn decode<T: Document>(doc: StoredDocument) -> Result<T> {
    let StoredDocument { id, mut data, .. } = doc;
    decode_fields(
        &mut data,
        T::REQUIRED_TIMESTAMPS,
        T::OPTIONAL_TIMESTAMPS,
        Utc::now(),
    );
    data.insert(FIELD_ID.to_string(), Value::String(id));
    Ok(serde_json::from_value(Value::Object(data))?)
}

/// Decode a result set, skipping documents that do not fit `T`.
pub(crate) fn decode_all<T: Document>(docs: Vec<StoredDocument>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match decode::<T>(doc) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!(collection = T::COLLECTION, id = %id, error = %e, "Skipping malformed document");
                    None
                }
            }
        })
        .collect()
}

/// Encode one top-level field value by wrapping it in a scratch object so
/// nested paths like `members[].joinedAt` still resolve.
fn encode_single(field: &str, value: Value, paths: &[&str]) -> Result<Value> {
    let mut scratch = Map::new();
    scratch.insert(field.to_string(), value);
    encode_fields(&mut scratch, paths)?;
    Ok(scratch.remove(field).unwrap_or(Value::Null))
}

fn encode_items(field: &str, values: &[Value], paths: &[&str]) -> Result<Vec<Value>> {
    match encode_single(field, Value::Array(values.to_vec()), paths)? {
        Value::Array(items) => Ok(items),
        _ => Ok(values.to_vec()),
    }
}
