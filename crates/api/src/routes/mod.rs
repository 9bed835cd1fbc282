pub mod data_permission;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /system/data-permissions                list, create
/// /system/data-permissions/tree           filtered hierarchy
/// /system/data-permissions/page           screen config + tree
/// /system/data-permissions/{id}           get, patch, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/system/data-permissions", data_permission::router())
}
