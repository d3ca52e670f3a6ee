//! OpenAPI document generation.
//!
//! The document is derived entirely from the entity schema registry and
//! built once; the resource layer never interprets it.

use axum::Json;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::schema::{self, EntitySchema, FieldDef, FieldType, RelationKind};

static DOCUMENT: Lazy<Value> = Lazy::new(build_document);

/// GET /api-docs/openapi.json - machine-readable API description.
pub async fn openapi_json() -> Json<Value> {
    Json(DOCUMENT.clone())
}

fn build_document() -> Value {
    let mut components = Map::new();
    let mut paths = Map::new();
    for entity in schema::schemas() {
        components.insert(component_name(entity), schema_object(entity));
        add_paths(&mut paths, entity);
    }

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Folio API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Content management API for users, projects, blogs, services, tags and categories",
        },
        "components": {
            "securitySchemes": {
                "ApiKeyAuth": { "type": "apiKey", "in": "header", "name": "x-api-key" },
            },
            "schemas": components,
        },
        "security": [ { "ApiKeyAuth": [] } ],
        "paths": paths,
    })
}

fn component_name(entity: &EntitySchema) -> String {
    format!("{:?}", entity.kind)
}

fn component_ref(entity: &EntitySchema) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", component_name(entity)) })
}

fn field_schema(field: &FieldDef) -> Value {
    let mut out = Map::new();
    match field.ty {
        FieldType::Str | FieldType::Text => {
            out.insert("type".into(), json!("string"));
        }
        FieldType::Id | FieldType::Reference(_) => {
            out.insert("type".into(), json!("string"));
            out.insert("format".into(), json!("uuid"));
        }
        FieldType::Number => {
            out.insert("type".into(), json!("number"));
        }
        FieldType::StrArray => {
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), json!({ "type": "string" }));
        }
        FieldType::Timestamp => {
            out.insert("type".into(), json!("string"));
            out.insert("format".into(), json!("date-time"));
        }
        FieldType::Enumerated(variants) => {
            out.insert("type".into(), json!("string"));
            out.insert("enum".into(), json!(variants));
        }
    }
    if !field.required && !field.server_managed {
        out.insert("nullable".into(), json!(true));
    }
    if field.server_managed {
        out.insert("readOnly".into(), json!(true));
    }
    if field.write_only {
        out.insert("writeOnly".into(), json!(true));
    }
    Value::Object(out)
}

fn schema_object(entity: &EntitySchema) -> Value {
    let mut properties = Map::new();
    for field in entity.fields {
        properties.insert(field.name.to_string(), field_schema(field));
    }
    for relation in entity.relations {
        let target = schema::schema(relation.target);
        let value = match relation.kind {
            RelationKind::Owner { .. } => component_ref(target),
            RelationKind::Many { .. } => json!({ "type": "array", "items": component_ref(target) }),
        };
        properties.insert(relation.name.to_string(), value);
    }
    json!({ "type": "object", "properties": properties })
}

fn add_paths(paths: &mut Map<String, Value>, entity: &EntitySchema) {
    let kind = entity.kind.singular();
    let tag = entity.path;
    let reference = component_ref(entity);
    let list = json!({ "type": "array", "items": reference.clone() });
    let error = json!({
        "type": "object",
        "properties": { "error": { "type": "string" } },
    });

    paths.insert(
        format!("/{}", entity.path),
        json!({
            "get": {
                "summary": format!("Get all {}", entity.path),
                "tags": [tag],
                "responses": {
                    "200": {
                        "description": format!("List of all {}", entity.path),
                        "content": { "application/json": { "schema": list } },
                    },
                },
            },
            "post": {
                "summary": format!("Create a new {kind}"),
                "tags": [tag],
                "requestBody": {
                    "required": true,
                    "content": { "application/json": { "schema": reference.clone() } },
                },
                "responses": {
                    "200": {
                        "description": format!("{kind} created"),
                        "content": { "application/json": { "schema": reference.clone() } },
                    },
                    "422": {
                        "description": "Invalid input",
                        "content": { "application/json": { "schema": error.clone() } },
                    },
                },
            },
        }),
    );

    let id_parameter = json!([{
        "in": "path",
        "name": "id",
        "schema": { "type": "string" },
        "required": true,
        "description": format!("{kind} ID"),
    }]);

    paths.insert(
        format!("/{}/{{id}}", entity.path),
        json!({
            "get": {
                "summary": format!("Get a {kind} by ID"),
                "tags": [tag],
                "parameters": id_parameter.clone(),
                "responses": {
                    "200": {
                        "description": format!("{kind} data"),
                        "content": { "application/json": { "schema": reference.clone() } },
                    },
                    "404": { "description": format!("{kind} not found") },
                },
            },
            "put": {
                "summary": format!("Update a {kind} by ID"),
                "tags": [tag],
                "parameters": id_parameter.clone(),
                "requestBody": {
                    "required": true,
                    "content": { "application/json": { "schema": reference.clone() } },
                },
                "responses": {
                    "200": {
                        "description": format!("{kind} updated"),
                        "content": { "application/json": { "schema": reference } },
                    },
                    "404": { "description": format!("{kind} not found") },
                    "422": { "description": "Invalid input" },
                },
            },
            "delete": {
                "summary": format!("Delete a {kind} by ID"),
                "tags": [tag],
                "parameters": id_parameter,
                "responses": {
                    "204": { "description": format!("{kind} deleted") },
                    "404": { "description": format!("{kind} not found") },
                },
            },
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_covers_every_kind() {
        let doc = build_document();
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        for name in ["User", "Project", "Blog", "Service", "Tag", "Category"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
        }
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/blogs"));
        assert!(paths.contains_key("/blogs/{id}"));
    }

    #[test]
    fn password_is_write_only_and_status_is_enumerated() {
        let doc = build_document();
        assert_eq!(
            doc["components"]["schemas"]["User"]["properties"]["password"]["writeOnly"],
            json!(true)
        );
        assert_eq!(
            doc["components"]["schemas"]["Blog"]["properties"]["status"]["enum"],
            json!(["Draft", "Published"])
        );
    }
}
