//! Entity schema registry.
//!
//! A static, queryable description of every entity kind the resource API
//! serves: wire field names, backing columns, types, nullability, uniqueness,
//! and relations to other kinds. The generic resource controller reads it to
//! decide which relations to expand, the stores read it to validate payloads
//! and build projections, and the docs generator derives the OpenAPI
//! document from it. Nothing mutates it after startup.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod validate;

pub const BLOG_STATUSES: &[&str] = &["Draft", "Published"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Project,
    Blog,
    Service,
    Tag,
    Category,
}

impl EntityKind {
    /// Singular lowercase name, used in client-facing messages ("blog not found").
    pub fn singular(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Project => "project",
            EntityKind::Blog => "blog",
            EntityKind::Service => "service",
            EntityKind::Tag => "tag",
            EntityKind::Category => "category",
        }
    }

    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::User,
            EntityKind::Project,
            EntityKind::Blog,
            EntityKind::Service,
            EntityKind::Tag,
            EntityKind::Category,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Wire-level type of a field, used for payload validation and SQL binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Server-assigned UUID primary key.
    Id,
    /// Short string (varchar-ish).
    Str,
    /// Long-form text.
    Text,
    /// Double-precision number.
    Number,
    /// Array of strings.
    StrArray,
    /// Server-managed timestamp.
    Timestamp,
    /// String restricted to a fixed set of values.
    Enumerated(&'static [&'static str]),
    /// UUID foreign key to another entity kind.
    Reference(EntityKind),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// camelCase name as it appears on the wire.
    pub name: &'static str,
    /// snake_case column backing it in the store.
    pub column: &'static str,
    pub ty: FieldType,
    /// Must be present and non-null on create.
    pub required: bool,
    /// Unique across live records of the kind.
    pub unique: bool,
    /// Assigned by the server; rejected when a client sends it.
    pub server_managed: bool,
    /// Accepted on writes, never serialized back (password).
    pub write_only: bool,
}

impl FieldDef {
    const fn new(name: &'static str, column: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            column,
            ty,
            required: false,
            unique: false,
            server_managed: false,
            write_only: false,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn server_managed(mut self) -> Self {
        self.server_managed = true;
        self
    }

    const fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Many-to-one: the record embeds a single owner under the relation name.
    Owner { fk_field: &'static str },
    /// Many-to-many through a join table; payload_field is the camelCase key
    /// clients use to (re)bind associations on create/update.
    Many {
        join_table: &'static str,
        local_key: &'static str,
        foreign_key: &'static str,
        payload_field: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    /// Key the expanded relation is embedded under ("user", "tags", ...).
    pub name: &'static str,
    pub target: EntityKind,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub table: &'static str,
    /// URL path segment the kind is mounted under.
    pub path: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
    /// Kind carries createdAt/updatedAt.
    pub timestamps: bool,
    /// Kind carries deletedAt and deletes are soft.
    pub soft_delete: bool,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Relation whose payload key (tagIds, categoryIds) matches `name`.
    pub fn relation_for_payload(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| match r.kind {
            RelationKind::Many { payload_field, .. } => payload_field == name,
            RelationKind::Owner { .. } => false,
        })
    }

    /// Fields a client may set.
    pub fn writable_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| !f.server_managed)
    }
}

const ID: FieldDef = FieldDef::new("id", "id", FieldType::Id).server_managed();
const CREATED_AT: FieldDef =
    FieldDef::new("createdAt", "created_at", FieldType::Timestamp).server_managed();
const UPDATED_AT: FieldDef =
    FieldDef::new("updatedAt", "updated_at", FieldType::Timestamp).server_managed();
const DELETED_AT: FieldDef =
    FieldDef::new("deletedAt", "deleted_at", FieldType::Timestamp).server_managed();

const USER_FIELDS: &[FieldDef] = &[
    ID,
    FieldDef::new("username", "username", FieldType::Str).required().unique(),
    FieldDef::new("email", "email", FieldType::Str).required().unique(),
    FieldDef::new("password", "password", FieldType::Str).required().write_only(),
    FieldDef::new("firstName", "first_name", FieldType::Str),
    FieldDef::new("lastName", "last_name", FieldType::Str),
    FieldDef::new("phoneNumber", "phone_number", FieldType::Str),
    FieldDef::new("bio", "bio", FieldType::Text),
    FieldDef::new("avatar", "avatar", FieldType::Str),
    FieldDef::new("socialLinks", "social_links", FieldType::StrArray),
    CREATED_AT,
    UPDATED_AT,
    DELETED_AT,
];

const PROJECT_FIELDS: &[FieldDef] = &[
    ID,
    FieldDef::new("userId", "user_id", FieldType::Reference(EntityKind::User)).required(),
    FieldDef::new("title", "title", FieldType::Str).required(),
    FieldDef::new("description", "description", FieldType::Text).required(),
    FieldDef::new("imageUrls", "image_urls", FieldType::StrArray),
    FieldDef::new("links", "links", FieldType::StrArray),
    CREATED_AT,
    UPDATED_AT,
    DELETED_AT,
];

const BLOG_FIELDS: &[FieldDef] = &[
    ID,
    FieldDef::new("userId", "user_id", FieldType::Reference(EntityKind::User)).required(),
    FieldDef::new("title", "title", FieldType::Str).required(),
    FieldDef::new("content", "content", FieldType::Text).required(),
    FieldDef::new("status", "status", FieldType::Enumerated(BLOG_STATUSES)).required(),
    FieldDef::new("cover", "cover", FieldType::Str),
    CREATED_AT,
    UPDATED_AT,
    DELETED_AT,
];

const SERVICE_FIELDS: &[FieldDef] = &[
    ID,
    FieldDef::new("userId", "user_id", FieldType::Reference(EntityKind::User)).required(),
    FieldDef::new("title", "title", FieldType::Str).required(),
    FieldDef::new("description", "description", FieldType::Text).required(),
    FieldDef::new("cover", "cover", FieldType::Str),
    FieldDef::new("price", "price", FieldType::Number).required(),
    FieldDef::new("duration", "duration", FieldType::Number).required(),
    CREATED_AT,
    UPDATED_AT,
    DELETED_AT,
];

const TAG_FIELDS: &[FieldDef] = &[
    ID,
    FieldDef::new("name", "name", FieldType::Str).required().unique(),
];

const CATEGORY_FIELDS: &[FieldDef] = &[
    ID,
    FieldDef::new("name", "name", FieldType::Str).required(),
    FieldDef::new("description", "description", FieldType::Text),
];

const fn owner_relation() -> RelationDef {
    RelationDef {
        name: "user",
        target: EntityKind::User,
        kind: RelationKind::Owner { fk_field: "userId" },
    }
}

const fn tags_relation(join_table: &'static str, local_key: &'static str) -> RelationDef {
    RelationDef {
        name: "tags",
        target: EntityKind::Tag,
        kind: RelationKind::Many {
            join_table,
            local_key,
            foreign_key: "tag_id",
            payload_field: "tagIds",
        },
    }
}

const fn categories_relation(join_table: &'static str, local_key: &'static str) -> RelationDef {
    RelationDef {
        name: "categories",
        target: EntityKind::Category,
        kind: RelationKind::Many {
            join_table,
            local_key,
            foreign_key: "category_id",
            payload_field: "categoryIds",
        },
    }
}

const PROJECT_RELATIONS: &[RelationDef] = &[
    owner_relation(),
    tags_relation("project_tags", "project_id"),
    categories_relation("project_categories", "project_id"),
];

const BLOG_RELATIONS: &[RelationDef] = &[
    owner_relation(),
    tags_relation("blog_tags", "blog_id"),
    categories_relation("blog_categories", "blog_id"),
];

const SERVICE_RELATIONS: &[RelationDef] = &[
    owner_relation(),
    tags_relation("service_tags", "service_id"),
    categories_relation("service_categories", "service_id"),
];

static USER_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::User,
    table: "users",
    path: "users",
    fields: USER_FIELDS,
    relations: &[],
    timestamps: true,
    soft_delete: true,
};

static PROJECT_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Project,
    table: "projects",
    path: "projects",
    fields: PROJECT_FIELDS,
    relations: PROJECT_RELATIONS,
    timestamps: true,
    soft_delete: true,
};

static BLOG_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Blog,
    table: "blogs",
    path: "blogs",
    fields: BLOG_FIELDS,
    relations: BLOG_RELATIONS,
    timestamps: true,
    soft_delete: true,
};

static SERVICE_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Service,
    table: "services",
    path: "services",
    fields: SERVICE_FIELDS,
    relations: SERVICE_RELATIONS,
    timestamps: true,
    soft_delete: true,
};

static TAG_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Tag,
    table: "tags",
    path: "tags",
    fields: TAG_FIELDS,
    relations: &[],
    timestamps: false,
    soft_delete: false,
};

static CATEGORY_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Category,
    table: "categories",
    path: "categories",
    fields: CATEGORY_FIELDS,
    relations: &[],
    timestamps: false,
    soft_delete: false,
};

pub fn schema(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::User => &USER_SCHEMA,
        EntityKind::Project => &PROJECT_SCHEMA,
        EntityKind::Blog => &BLOG_SCHEMA,
        EntityKind::Service => &SERVICE_SCHEMA,
        EntityKind::Tag => &TAG_SCHEMA,
        EntityKind::Category => &CATEGORY_SCHEMA,
    }
}

pub fn schemas() -> impl Iterator<Item = &'static EntitySchema> {
    EntityKind::all().iter().map(|kind| schema(*kind))
}

/// Kinds that reference `target` through an owner foreign key, paired with
/// the referencing field. Drives the reject-on-delete ownership policy.
pub fn referencing_kinds(target: EntityKind) -> Vec<(&'static EntitySchema, &'static FieldDef)> {
    schemas()
        .flat_map(|s| s.fields.iter().map(move |f| (s, f)))
        .filter(|(_, f)| matches!(f.ty, FieldType::Reference(t) if t == target))
        .collect()
}
