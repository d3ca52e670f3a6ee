//! Postgres store binding.
//!
//! SQL is derived from the entity schema registry: projections alias every
//! column to its wire name and wrap the row in `row_to_json`, relations are
//! embedded as correlated subqueries, and soft-deleted rows are filtered out
//! of every read. The pool is opened once at startup and injected here.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use async_trait::async_trait;

use super::models::Resource;
use super::repository::{
    decode, hash_secret_fields, take_association_ids, RepositoryError, ResourceRepository,
};
use crate::schema::{
    self, referencing_kinds, validate, EntitySchema, FieldDef, FieldType, RelationDef,
    RelationKind,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `base."column" AS "wireName", ...` for every field of the kind.
fn projected_columns(schema: &EntitySchema, alias: &str) -> String {
    schema
        .fields
        .iter()
        .map(|f| format!("{alias}.\"{}\" AS \"{}\"", f.column, f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn live_clause(schema: &EntitySchema, alias: &str) -> String {
    if schema.soft_delete {
        format!(" AND {alias}.\"deleted_at\" IS NULL")
    } else {
        String::new()
    }
}

/// Correlated subquery embedding one relation under its wire name.
fn relation_select(schema: &EntitySchema, relation: &RelationDef) -> String {
    let target = schema::schema(relation.target);
    let target_cols = projected_columns(target, "z");
    let live = live_clause(target, "z");
    match relation.kind {
        RelationKind::Owner { fk_field } => {
            let fk_column = schema
                .field(fk_field)
                .map(|f| f.column)
                .unwrap_or(fk_field);
            format!(
                "(SELECT row_to_json(o) FROM (SELECT {target_cols} FROM \"{}\" z \
                 WHERE z.\"id\" = base.\"{fk_column}\"{live}) o) AS \"{}\"",
                target.table, relation.name
            )
        }
        RelationKind::Many {
            join_table,
            local_key,
            foreign_key,
            ..
        } => {
            format!(
                "(SELECT COALESCE(json_agg(row_to_json(m)), '[]'::json) FROM \
                 (SELECT {target_cols} FROM \"{}\" z \
                  JOIN \"{join_table}\" j ON j.\"{foreign_key}\" = z.\"id\" \
                  WHERE j.\"{local_key}\" = base.\"id\"{live} \
                  ORDER BY z.\"id\") m) AS \"{}\"",
                target.table, relation.name
            )
        }
    }
}

/// `SELECT row_to_json(t) AS row FROM (...) t` over the kind's table, with
/// relations embedded and dead rows excluded.
fn select_sql(schema: &EntitySchema, include: &[RelationDef], by_id: bool) -> String {
    let mut columns = projected_columns(schema, "base");
    for relation in include {
        columns.push_str(", ");
        columns.push_str(&relation_select(schema, relation));
    }

    let mut conditions = vec!["TRUE".to_string()];
    if schema.soft_delete {
        conditions.push("base.\"deleted_at\" IS NULL".to_string());
    }
    if by_id {
        conditions.push("base.\"id\" = $1".to_string());
    }

    let order = if schema.timestamps {
        "t.\"createdAt\", t.\"id\""
    } else {
        "t.\"id\""
    };

    format!(
        "SELECT row_to_json(t) AS row FROM (SELECT {columns} FROM \"{}\" base WHERE {}) t ORDER BY {order}",
        schema.table,
        conditions.join(" AND "),
    )
}

fn classify(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                RepositoryError::Conflict(db.message().to_string())
            } else if db.is_foreign_key_violation() {
                RepositoryError::Conflict("referenced record does not exist".to_string())
            } else {
                tracing::error!("database error: {}", db.message());
                RepositoryError::Store("database error".to_string())
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            RepositoryError::Unavailable(err.to_string())
        }
        other => {
            tracing::error!("query failed: {}", other);
            RepositoryError::Store("query failed".to_string())
        }
    }
}

fn row_value(row: &PgRow) -> Result<Value, RepositoryError> {
    row.try_get("row")
        .map_err(|e| RepositoryError::Store(format!("unexpected record format: {e}")))
}

/// Bind one scalar field value with the Postgres type its registry entry
/// dictates. Values were validated upstream, so conversions are lossless.
fn bind_value(
    qb: &mut QueryBuilder<'_, Postgres>,
    field: &FieldDef,
    value: Value,
) -> Result<(), RepositoryError> {
    match field.ty {
        FieldType::Id | FieldType::Reference(_) => {
            let id = validate::parse_id(field.name, &value)?;
            qb.push_bind(id);
        }
        FieldType::Str | FieldType::Text | FieldType::Enumerated(_) => {
            let s = match value {
                Value::String(s) => Some(s),
                _ => None,
            };
            qb.push_bind(s);
        }
        FieldType::Number => {
            qb.push_bind(value.as_f64());
        }
        FieldType::StrArray => {
            let items: Vec<String> = value
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            qb.push_bind(items);
        }
        FieldType::Timestamp => {
            let ts: Option<chrono::DateTime<Utc>> =
                serde_json::from_value(value).unwrap_or(None);
            qb.push_bind(ts);
        }
    }
    Ok(())
}

impl PgStore {
    async fn fetch_by_id<E: Resource>(
        &self,
        include: &[RelationDef],
        id: Uuid,
    ) -> Result<E, RepositoryError> {
        let sql = select_sql(schema::schema(E::KIND), include, true);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(RepositoryError::NotFound(E::KIND))?;
        decode(row_value(&row)?)
    }

    async fn replace_associations(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        id: Uuid,
        associations: &[(&'static RelationDef, Vec<Uuid>)],
    ) -> Result<(), RepositoryError> {
        for (relation, ids) in associations {
            let RelationKind::Many {
                join_table,
                local_key,
                foreign_key,
                ..
            } = relation.kind
            else {
                continue;
            };
            sqlx::query(&format!(
                "DELETE FROM \"{join_table}\" WHERE \"{local_key}\" = $1"
            ))
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(classify)?;

            for foreign in ids {
                sqlx::query(&format!(
                    "INSERT INTO \"{join_table}\" (\"{local_key}\", \"{foreign_key}\") VALUES ($1, $2)"
                ))
                .bind(id)
                .bind(foreign)
                .execute(&mut **tx)
                .await
                .map_err(classify)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Resource> ResourceRepository<E> for PgStore {
    async fn list_all(&self, include: &[RelationDef]) -> Result<Vec<E>, RepositoryError> {
        let sql = select_sql(schema::schema(E::KIND), include, false);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(|row| decode(row_value(row)?)).collect()
    }

    async fn get_by_id(&self, id: Uuid, include: &[RelationDef]) -> Result<E, RepositoryError> {
        self.fetch_by_id(include, id).await
    }

    async fn create(&self, mut fields: Map<String, Value>) -> Result<E, RepositoryError> {
        let entity = schema::schema(E::KIND);
        validate::validate_create(entity, &fields)?;
        hash_secret_fields(&mut fields)?;
        let associations = take_association_ids(entity, &mut fields)?;

        let id = Uuid::new_v4();
        let now = Utc::now();

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO \"{}\" (\"id\"", entity.table));
        let writable: Vec<&FieldDef> = entity.writable_fields().collect();
        for field in &writable {
            qb.push(format!(", \"{}\"", field.column));
        }
        if entity.timestamps {
            qb.push(", \"created_at\", \"updated_at\", \"deleted_at\"");
        }
        qb.push(") VALUES (");
        qb.push_bind(id);
        for field in &writable {
            let value = match fields.remove(field.name) {
                Some(v) => v,
                None if field.ty == FieldType::StrArray => Value::Array(Vec::new()),
                None => Value::Null,
            };
            qb.push(", ");
            bind_value(&mut qb, field, value)?;
        }
        if entity.timestamps {
            qb.push(", ");
            qb.push_bind(now);
            qb.push(", ");
            qb.push_bind(now);
            qb.push(", ");
            qb.push_bind(Option::<chrono::DateTime<Utc>>::None);
        }
        qb.push(")");

        let mut tx = self.pool.begin().await.map_err(classify)?;
        qb.build().execute(&mut *tx).await.map_err(classify)?;
        self.replace_associations(&mut tx, id, &associations).await?;
        tx.commit().await.map_err(classify)?;

        self.fetch_by_id(&[], id).await
    }

    async fn update(&self, id: Uuid, mut fields: Map<String, Value>) -> Result<E, RepositoryError> {
        let entity = schema::schema(E::KIND);
        validate::validate_update(entity, &fields)?;
        hash_secret_fields(&mut fields)?;
        let associations = take_association_ids(entity, &mut fields)?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("UPDATE \"{}\" SET ", entity.table));
        let mut first = true;
        for field in entity.writable_fields() {
            let Some(value) = fields.remove(field.name) else {
                continue;
            };
            if !first {
                qb.push(", ");
            }
            first = false;
            qb.push(format!("\"{}\" = ", field.column));
            bind_value(&mut qb, field, value)?;
        }
        if entity.timestamps {
            if !first {
                qb.push(", ");
            }
            // Strictly increasing even when now() has not advanced.
            qb.push("\"updated_at\" = GREATEST(now(), \"updated_at\" + interval '1 microsecond')");
        } else if first {
            qb.push("\"id\" = \"id\"");
        }
        qb.push(" WHERE \"id\" = ");
        qb.push_bind(id);
        if entity.soft_delete {
            qb.push(" AND \"deleted_at\" IS NULL");
        }
        qb.push(" RETURNING \"id\"");

        let mut tx = self.pool.begin().await.map_err(classify)?;
        let touched = qb
            .build()
            .fetch_optional(&mut *tx)
            .await
            .map_err(classify)?;
        if touched.is_none() {
            return Err(RepositoryError::NotFound(E::KIND));
        }
        self.replace_associations(&mut tx, id, &associations).await?;
        tx.commit().await.map_err(classify)?;

        self.fetch_by_id(&[], id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let entity = schema::schema(E::KIND);

        // Reject while live records still reference this one as their owner.
        for (referrer, field) in referencing_kinds(E::KIND) {
            let live = if referrer.soft_delete {
                " AND \"deleted_at\" IS NULL"
            } else {
                ""
            };
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE \"{}\" = $1{live})",
                referrer.table, field.column,
            );
            let referenced: bool = sqlx::query_scalar(&sql)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(classify)?;
            if referenced {
                return Err(RepositoryError::Conflict(format!(
                    "{} is still referenced by a {}",
                    E::KIND,
                    referrer.kind
                )));
            }
        }

        let sql = if entity.soft_delete {
            format!(
                "UPDATE \"{}\" SET \"deleted_at\" = GREATEST(now(), \"updated_at\") \
                 WHERE \"id\" = $1 AND \"deleted_at\" IS NULL RETURNING \"id\"",
                entity.table
            )
        } else {
            format!(
                "DELETE FROM \"{}\" WHERE \"id\" = $1 RETURNING \"id\"",
                entity.table
            )
        };
        let deleted = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        if deleted.is_none() {
            return Err(RepositoryError::NotFound(E::KIND));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;

    #[test]
    fn blog_select_projects_wire_names_and_relations() {
        let entity = schema::schema(EntityKind::Blog);
        let sql = select_sql(entity, entity.relations, true);
        assert!(sql.contains("base.\"user_id\" AS \"userId\""));
        assert!(sql.contains("base.\"deleted_at\" IS NULL"));
        assert!(sql.contains("AS \"tags\""));
        assert!(sql.contains("\"blog_tags\""));
        assert!(sql.contains("base.\"id\" = $1"));
    }

    #[test]
    fn tag_select_has_no_soft_delete_filter() {
        let entity = schema::schema(EntityKind::Tag);
        let sql = select_sql(entity, &[], false);
        assert!(!sql.contains("deleted_at"));
        assert!(sql.contains("ORDER BY t.\"id\""));
    }
}
