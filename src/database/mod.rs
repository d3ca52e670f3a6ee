pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use memory::MemoryStore;
pub use models::{Blog, BlogStatus, Category, Project, Resource, Service, Tag, User};
pub use postgres::PgStore;
pub use repository::{RepositoryError, ResourceRepository};
