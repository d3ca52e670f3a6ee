use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::EntityKind;

pub mod blog;
pub mod category;
pub mod project;
pub mod service;
pub mod tag;
pub mod user;

pub use blog::{Blog, BlogStatus};
pub use category::Category;
pub use project::Project;
pub use service::Service;
pub use tag::Tag;
pub use user::User;

/// A typed entity the generic resource layer can serve.
///
/// Each implementor is bound to exactly one registry entry via `KIND`; the
/// controller and stores look everything else (fields, relations, paths) up
/// there rather than on the type.
pub trait Resource: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
}
