//! The repository port: the only seam between the resource layer and the
//! backing store. One trait, one instantiation per entity kind, two bindings
//! (Postgres and in-memory).

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::models::Resource;
use crate::schema::validate::{parse_id, PayloadError};
use crate::schema::{EntityKind, EntitySchema, RelationDef, RelationKind};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(EntityKind),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Store(String),
}

impl From<PayloadError> for RepositoryError {
    fn from(err: PayloadError) -> Self {
        RepositoryError::Validation(err.to_string())
    }
}

/// Abstract persistence contract for one entity kind.
///
/// `list_all` never fails on an empty table; `get_by_id`, `update` and
/// `delete` fail with `NotFound` when the id does not resolve to a live
/// record. Deletion is not idempotent: a second delete of the same id
/// yields `NotFound`.
#[async_trait]
pub trait ResourceRepository<E: Resource>: Send + Sync {
    async fn list_all(&self, include: &[RelationDef]) -> Result<Vec<E>, RepositoryError>;

    async fn get_by_id(&self, id: Uuid, include: &[RelationDef]) -> Result<E, RepositoryError>;

    async fn create(&self, fields: Map<String, Value>) -> Result<E, RepositoryError>;

    async fn update(&self, id: Uuid, fields: Map<String, Value>) -> Result<E, RepositoryError>;

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// Replace any plaintext password in the payload with its bcrypt hash.
/// Runs before the record is persisted, in either store binding.
pub fn hash_secret_fields(fields: &mut Map<String, Value>) -> Result<(), RepositoryError> {
    if let Some(Value::String(plain)) = fields.get("password") {
        let hashed = bcrypt::hash(plain, bcrypt::DEFAULT_COST)
            .map_err(|e| RepositoryError::Store(format!("password hashing failed: {e}")))?;
        fields.insert("password".into(), Value::String(hashed));
    }
    Ok(())
}

/// Pull many-to-many association keys (tagIds, categoryIds) out of a
/// validated payload, leaving only scalar fields behind.
pub fn take_association_ids(
    schema: &EntitySchema,
    fields: &mut Map<String, Value>,
) -> Result<Vec<(&'static RelationDef, Vec<Uuid>)>, RepositoryError> {
    let mut associations = Vec::new();
    for relation in schema.relations {
        let RelationKind::Many { payload_field, .. } = relation.kind else {
            continue;
        };
        let Some(value) = fields.remove(payload_field) else {
            continue;
        };
        if value.is_null() {
            associations.push((relation, Vec::new()));
            continue;
        }
        let ids = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|v| parse_id(payload_field, v))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        associations.push((relation, ids));
    }
    Ok(associations)
}

/// Materialize a stored record into its typed entity.
pub fn decode<E: Resource>(record: Value) -> Result<E, RepositoryError> {
    serde_json::from_value(record).map_err(|e| {
        tracing::error!("corrupt {} record: {}", E::KIND, e);
        RepositoryError::Store(format!("corrupt {} record", E::KIND))
    })
}
