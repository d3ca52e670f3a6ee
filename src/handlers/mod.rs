pub mod admin;
pub mod docs;
pub mod resource;
