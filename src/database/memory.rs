//! In-memory store binding.
//!
//! Backs the repository port with plain maps behind a `tokio::sync::RwLock`.
//! Used by the test suite and local development; behaves identically to the
//! Postgres binding for everything the port specifies (soft delete,
//! uniqueness, ownership policy, association handling).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::Resource;
use super::repository::{
    decode, hash_secret_fields, take_association_ids, RepositoryError, ResourceRepository,
};
use crate::schema::{
    self, referencing_kinds, validate, EntityKind, EntitySchema, FieldType, RelationDef,
    RelationKind,
};

type Row = Map<String, Value>;

#[derive(Default)]
struct Tables {
    /// Rows per entity kind, stored under their wire field names.
    rows: HashMap<EntityKind, HashMap<Uuid, Row>>,
    /// Join pairs per join table: (local id, foreign id).
    joins: HashMap<&'static str, HashSet<(Uuid, Uuid)>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_live(row: &Row) -> bool {
    row.get("deletedAt").map_or(true, Value::is_null)
}

fn timestamp(row: &Row, key: &str) -> Option<DateTime<Utc>> {
    row.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

/// Strictly-increasing write timestamp, even when the clock has not moved
/// since the previous write.
fn next_after(prev: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match prev {
        Some(p) if now <= p => p + Duration::microseconds(1),
        _ => now,
    }
}

fn time_value(ts: DateTime<Utc>) -> Value {
    serde_json::to_value(ts).unwrap_or(Value::Null)
}

impl Tables {
    fn live_rows(&self, kind: EntityKind) -> impl Iterator<Item = (&Uuid, &Row)> {
        self.rows
            .get(&kind)
            .into_iter()
            .flat_map(|table| table.iter())
            .filter(|(_, row)| is_live(row))
    }

    fn live_row(&self, kind: EntityKind, id: Uuid) -> Option<&Row> {
        self.rows
            .get(&kind)
            .and_then(|table| table.get(&id))
            .filter(|row| is_live(row))
    }

    fn check_unique(
        &self,
        schema: &EntitySchema,
        fields: &Row,
        exclude: Option<Uuid>,
    ) -> Result<(), RepositoryError> {
        for field in schema.fields.iter().filter(|f| f.unique) {
            let Some(candidate) = fields.get(field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = self
                .live_rows(schema.kind)
                .filter(|(id, _)| Some(**id) != exclude)
                .any(|(_, row)| row.get(field.name) == Some(candidate));
            if taken {
                return Err(RepositoryError::Conflict(format!(
                    "{} {} already exists",
                    schema.kind, field.name
                )));
            }
        }
        Ok(())
    }

    fn check_references(
        &self,
        schema: &EntitySchema,
        fields: &Row,
    ) -> Result<(), RepositoryError> {
        for field in schema.fields.iter() {
            let FieldType::Reference(target) = field.ty else {
                continue;
            };
            let Some(value) = fields.get(field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let id = validate::parse_id(field.name, value)?;
            if self.live_row(target, id).is_none() {
                return Err(RepositoryError::Conflict(format!(
                    "referenced {} does not exist",
                    target
                )));
            }
        }
        Ok(())
    }

    fn check_associations(
        &self,
        associations: &[(&'static RelationDef, Vec<Uuid>)],
    ) -> Result<(), RepositoryError> {
        for (relation, ids) in associations {
            for id in ids {
                if self.live_row(relation.target, *id).is_none() {
                    return Err(RepositoryError::Conflict(format!(
                        "referenced {} does not exist",
                        relation.target
                    )));
                }
            }
        }
        Ok(())
    }

    fn replace_associations(
        &mut self,
        local: Uuid,
        associations: Vec<(&'static RelationDef, Vec<Uuid>)>,
    ) {
        for (relation, ids) in associations {
            let RelationKind::Many { join_table, .. } = relation.kind else {
                continue;
            };
            let pairs = self.joins.entry(join_table).or_default();
            pairs.retain(|(l, _)| *l != local);
            pairs.extend(ids.into_iter().map(|foreign| (local, foreign)));
        }
    }

    /// Embed the kind's relations into a copy of the row.
    fn expand(&self, row: &Row, id: Uuid, include: &[RelationDef]) -> Row {
        let mut expanded = row.clone();
        for relation in include {
            match relation.kind {
                RelationKind::Owner { fk_field } => {
                    let owner = row
                        .get(fk_field)
                        .and_then(|v| validate::parse_id(fk_field, v).ok())
                        .and_then(|owner_id| self.live_row(relation.target, owner_id))
                        .map(|owner| Value::Object(owner.clone()))
                        .unwrap_or(Value::Null);
                    expanded.insert(relation.name.to_string(), owner);
                }
                RelationKind::Many { join_table, .. } => {
                    let mut targets: Vec<Row> = self
                        .joins
                        .get(join_table)
                        .into_iter()
                        .flat_map(|pairs| pairs.iter())
                        .filter(|(local, _)| *local == id)
                        .filter_map(|(_, foreign)| self.live_row(relation.target, *foreign))
                        .cloned()
                        .collect();
                    targets.sort_by(|a, b| {
                        let key = |r: &Row| r.get("id").and_then(Value::as_str).map(str::to_owned);
                        key(a).cmp(&key(b))
                    });
                    expanded.insert(
                        relation.name.to_string(),
                        Value::Array(targets.into_iter().map(Value::Object).collect()),
                    );
                }
            }
        }
        expanded
    }
}

#[async_trait]
impl<E: Resource> ResourceRepository<E> for MemoryStore {
    async fn list_all(&self, include: &[RelationDef]) -> Result<Vec<E>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<(Uuid, Row)> = tables
            .live_rows(E::KIND)
            .map(|(id, row)| (*id, row.clone()))
            .collect();
        rows.sort_by_key(|(id, row)| (timestamp(row, "createdAt"), *id));

        rows.into_iter()
            .map(|(id, row)| decode(Value::Object(tables.expand(&row, id, include))))
            .collect()
    }

    async fn get_by_id(&self, id: Uuid, include: &[RelationDef]) -> Result<E, RepositoryError> {
        let tables = self.tables.read().await;
        let row = tables
            .live_row(E::KIND, id)
            .ok_or(RepositoryError::NotFound(E::KIND))?;
        decode(Value::Object(tables.expand(row, id, include)))
    }

    async fn create(&self, mut fields: Map<String, Value>) -> Result<E, RepositoryError> {
        let schema = schema::schema(E::KIND);
        validate::validate_create(schema, &fields)?;
        hash_secret_fields(&mut fields)?;
        let associations = take_association_ids(schema, &mut fields)?;

        let mut tables = self.tables.write().await;
        tables.check_unique(schema, &fields, None)?;
        tables.check_references(schema, &fields)?;
        tables.check_associations(&associations)?;

        let id = Uuid::new_v4();
        let mut row = Row::new();
        row.insert("id".into(), Value::String(id.to_string()));
        for field in schema.writable_fields() {
            let value = match fields.remove(field.name) {
                Some(v) => v,
                // Unset list fields default to empty, everything else to null.
                None if field.ty == FieldType::StrArray => Value::Array(Vec::new()),
                None => Value::Null,
            };
            row.insert(field.name.to_string(), value);
        }
        if schema.timestamps {
            let now = time_value(Utc::now());
            row.insert("createdAt".into(), now.clone());
            row.insert("updatedAt".into(), now);
            row.insert("deletedAt".into(), Value::Null);
        }

        tables.rows.entry(E::KIND).or_default().insert(id, row.clone());
        tables.replace_associations(id, associations);

        decode(Value::Object(row))
    }

    async fn update(&self, id: Uuid, mut fields: Map<String, Value>) -> Result<E, RepositoryError> {
        let schema = schema::schema(E::KIND);
        validate::validate_update(schema, &fields)?;
        hash_secret_fields(&mut fields)?;
        let associations = take_association_ids(schema, &mut fields)?;

        let mut tables = self.tables.write().await;
        if tables.live_row(E::KIND, id).is_none() {
            return Err(RepositoryError::NotFound(E::KIND));
        }
        tables.check_unique(schema, &fields, Some(id))?;
        tables.check_references(schema, &fields)?;
        tables.check_associations(&associations)?;

        let row = tables
            .rows
            .entry(E::KIND)
            .or_default()
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(E::KIND))?;
        for (key, value) in fields {
            row.insert(key, value);
        }
        if schema.timestamps {
            let bumped = next_after(timestamp(row, "updatedAt"));
            row.insert("updatedAt".into(), time_value(bumped));
        }
        let updated = row.clone();
        tables.replace_associations(id, associations);

        decode(Value::Object(updated))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let schema = schema::schema(E::KIND);
        let mut tables = self.tables.write().await;
        if tables.live_row(E::KIND, id).is_none() {
            return Err(RepositoryError::NotFound(E::KIND));
        }

        // Reject while live records still reference this one as their owner.
        for (referrer, field) in referencing_kinds(E::KIND) {
            let id_value = Value::String(id.to_string());
            let referenced = tables
                .live_rows(referrer.kind)
                .any(|(_, row)| row.get(field.name) == Some(&id_value));
            if referenced {
                return Err(RepositoryError::Conflict(format!(
                    "{} is still referenced by a {}",
                    E::KIND,
                    referrer.kind
                )));
            }
        }

        if schema.soft_delete {
            let row = tables
                .rows
                .entry(E::KIND)
                .or_default()
                .get_mut(&id)
                .ok_or(RepositoryError::NotFound(E::KIND))?;
            let deleted = next_after(timestamp(row, "updatedAt"));
            row.insert("deletedAt".into(), time_value(deleted));
        } else {
            if let Some(table) = tables.rows.get_mut(&E::KIND) {
                table.remove(&id);
            }
            // Hard-deleted targets take their join rows with them.
            for s in schema::schemas() {
                for relation in s.relations {
                    let RelationKind::Many { join_table, .. } = relation.kind else {
                        continue;
                    };
                    if relation.target == E::KIND {
                        if let Some(pairs) = tables.joins.get_mut(join_table) {
                            pairs.retain(|(_, foreign)| *foreign != id);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
