//! Shared application state: one repository port binding per entity kind
//! plus the configuration values the request path needs. Everything is
//! injected at startup; handlers never reach for globals.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::database::models::{Blog, Category, Project, Resource, Service, Tag, User};
use crate::database::repository::ResourceRepository;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn ResourceRepository<User>>,
    pub projects: Arc<dyn ResourceRepository<Project>>,
    pub blogs: Arc<dyn ResourceRepository<Blog>>,
    pub services: Arc<dyn ResourceRepository<Service>>,
    pub tags: Arc<dyn ResourceRepository<Tag>>,
    pub categories: Arc<dyn ResourceRepository<Category>>,
    pub api_key: Arc<str>,
    pub repository_timeout: Duration,
    pub admin_session_secret: Arc<str>,
    pub admin_session_ttl_hours: i64,
}

impl AppState {
    /// Bind every entity kind to the same store.
    pub fn new<S>(store: Arc<S>, config: &AppConfig) -> Self
    where
        S: ResourceRepository<User>
            + ResourceRepository<Project>
            + ResourceRepository<Blog>
            + ResourceRepository<Service>
            + ResourceRepository<Tag>
            + ResourceRepository<Category>
            + 'static,
    {
        Self {
            users: store.clone(),
            projects: store.clone(),
            blogs: store.clone(),
            services: store.clone(),
            tags: store.clone(),
            categories: store,
            api_key: config.api_key.as_str().into(),
            repository_timeout: config.repository_timeout,
            admin_session_secret: config.admin.session_secret.as_str().into(),
            admin_session_ttl_hours: config.admin.session_ttl_hours,
        }
    }
}

/// Resolves the repository binding for one entity kind out of the state.
/// Lets the resource controller stay generic over the kind it serves.
pub trait ProvideRepository<E: Resource> {
    fn repository(&self) -> &dyn ResourceRepository<E>;
}

macro_rules! provide_repository {
    ($field:ident, $entity:ty) => {
        impl ProvideRepository<$entity> for AppState {
            fn repository(&self) -> &dyn ResourceRepository<$entity> {
                self.$field.as_ref()
            }
        }
    };
}

provide_repository!(users, User);
provide_repository!(projects, Project);
provide_repository!(blogs, Blog);
provide_repository!(services, Service);
provide_repository!(tags, Tag);
provide_repository!(categories, Category);
