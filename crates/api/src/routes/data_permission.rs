//! Route definitions for data permissions, mounted at `/system/data-permissions`.

use axum::routing::get;
use axum::Router;

use crate::handlers::data_permission;
use crate::state::AppState;

/// ```text
/// GET    /          -> list_data_permissions     (list)
/// POST   /          -> create_data_permission    (create)
/// GET    /tree      -> data_permission_tree      (list)
/// GET    /page      -> data_permission_page      (any authenticated user)
/// GET    /{id}      -> get_data_permission       (view)
/// PATCH  /{id}      -> update_data_permission    (edit)
/// DELETE /{id}      -> delete_data_permission    (delete)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(data_permission::list_data_permissions)
                .post(data_permission::create_data_permission),
        )
        .route("/tree", get(data_permission::data_permission_tree))
        .route("/page", get(data_permission::data_permission_page))
        .route(
            "/{id}",
            get(data_permission::get_data_permission)
                .patch(data_permission::update_data_permission)
                .delete(data_permission::delete_data_permission),
        )
}
