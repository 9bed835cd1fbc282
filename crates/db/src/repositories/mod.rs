//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod data_permission_repo;

pub use data_permission_repo::DataPermissionRepo;
