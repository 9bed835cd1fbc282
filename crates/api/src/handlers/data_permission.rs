//! Handlers for the data-permission admin resource.
//!
//! Every endpoint requires a bearer token. List, tree, detail and the
//! mutating endpoints additionally require the matching
//! `system:data_permission:<action>` code; the page-config endpoint only
//! needs authentication because it reports which actions are allowed.

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use dataperm_core::columns::{ColumnMeta, PageConfig};
use dataperm_core::error::CoreError;
use dataperm_core::screen::{DataPermissionScreen, ListPage, RecordSource};
use dataperm_core::tree::{
    build_filtered_tree, depth_after_move, reparent_creates_cycle, FlatRecord, OrphanPolicy,
    RecordFilter, TreeNode, MAX_TREE_DEPTH,
};
use dataperm_core::types::{DbId, ROOT_PARENT_ID};
use dataperm_db::models::data_permission::{
    optional_flag, CreateDataPermission, DataPermission, DataPermissionListParams,
    UpdateDataPermission,
};
use dataperm_db::repositories::DataPermissionRepo;
use dataperm_db::DbPool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{
    DataPermissionCreate, DataPermissionDelete, DataPermissionEdit, DataPermissionList,
    DataPermissionView, RequireAuth, RequirePermission,
};
use crate::response::DataResponse;
use crate::state::AppState;

const ENTITY: &str = "DataPermission";

// ---------------------------------------------------------------------------
// Screen data source
// ---------------------------------------------------------------------------

/// Feeds the admin screen straight from the database.
pub struct PoolRecordSource {
    pool: DbPool,
}

impl PoolRecordSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PoolRecordSource {
    async fn list(&self) -> Result<ListPage, CoreError> {
        let rows = DataPermissionRepo::list_all(&self.pool)
            .await
            .map_err(|e| CoreError::Upstream(e.to_string()))?;
        let total = rows.len() as i64;
        let items = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        Ok(ListPage {
            items,
            total: Some(total),
        })
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/system/data-permissions
///
/// One page of data permissions plus the total match count.
pub async fn list_data_permissions(
    _auth: RequirePermission<DataPermissionList>,
    State(state): State<AppState>,
    Query(params): Query<DataPermissionListParams>,
) -> AppResult<impl IntoResponse> {
    let page = DataPermissionRepo::list(&state.pool, &params).await?;

    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/system/data-permissions/tree
///
/// The filtered hierarchy. Records whose parent is missing or filtered out
/// are promoted to roots so no match is hidden.
pub async fn data_permission_tree(
    _auth: RequirePermission<DataPermissionList>,
    State(state): State<AppState>,
    Query(params): Query<DataPermissionListParams>,
) -> AppResult<impl IntoResponse> {
    let rows = DataPermissionRepo::list_all(&state.pool).await?;
    let filter = RecordFilter::new(params.name_filter().map(str::to_owned), params.is_active);
    let tree = build_filtered_tree(rows, &filter, OrphanPolicy::PromoteToRoot)?;

    Ok(Json(DataResponse { data: tree }))
}

/// Search-bar values for the page endpoint. `status` follows the same rules
/// as the list filters, so an unknown value is rejected.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub status: Option<bool>,
}

/// Everything the admin client needs to render the screen in one response.
#[derive(Debug, Serialize)]
pub struct DataPermissionPageView {
    #[serde(flatten)]
    pub config: PageConfig,
    pub dialog_columns: Vec<ColumnMeta>,
    pub dialog_defaults: Map<String, Value>,
    pub data_list: Vec<TreeNode<FlatRecord>>,
}

/// GET /api/v1/system/data-permissions/page
///
/// Column metadata, search fields, the caller's permission snapshot and
/// the filtered tree as the admin screen shows it.
pub async fn data_permission_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let mut screen = DataPermissionScreen::data_permission();
    let form = screen.search_form_mut();
    form.name = params.name.unwrap_or_default();
    form.status = params.status;

    screen
        .activate(&user, &PoolRecordSource::new(state.pool.clone()))
        .await?;

    tracing::debug!(user_id = user.user_id, auth = ?screen.permissions(), "Page config served");

    Ok(Json(DataResponse {
        data: DataPermissionPageView {
            config: screen.page_config(),
            dialog_columns: screen.dialog_columns(),
            dialog_defaults: screen.dialog_row(None),
            data_list: screen.data_list().to_vec(),
        },
    }))
}

/// GET /api/v1/system/data-permissions/{id}
pub async fn get_data_permission(
    _auth: RequirePermission<DataPermissionView>,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let row = find_or_404(&state.pool, id).await?;

    Ok(Json(DataResponse { data: row }))
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// POST /api/v1/system/data-permissions
///
/// A missing `parent_id` stores the record as a root.
pub async fn create_data_permission(
    RequirePermission(user, _): RequirePermission<DataPermissionCreate>,
    State(state): State<AppState>,
    Json(input): Json<CreateDataPermission>,
) -> AppResult<impl IntoResponse> {
    input.check()?;

    let parent_id = input.parent_id_or_root();
    if parent_id != ROOT_PARENT_ID {
        let rows = DataPermissionRepo::list_all(&state.pool).await?;
        check_placement(&rows, None, parent_id)?;
    }

    let row = DataPermissionRepo::create(&state.pool, &input, Some(user.user_id)).await?;

    tracing::info!(
        data_permission_id = row.id,
        parent_id = row.parent_id,
        user_id = user.user_id,
        "Data permission created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: row })))
}

/// PATCH /api/v1/system/data-permissions/{id}
///
/// Partial update. Re-parenting under the record itself or one of its
/// descendants, or deeper than [`MAX_TREE_DEPTH`], is rejected.
pub async fn update_data_permission(
    RequirePermission(user, _): RequirePermission<DataPermissionEdit>,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateDataPermission>,
) -> AppResult<impl IntoResponse> {
    input.check(id)?;

    if let Some(new_parent) = input.parent_id.filter(|&p| p != ROOT_PARENT_ID) {
        let rows = DataPermissionRepo::list_all(&state.pool).await?;
        check_placement(&rows, Some(id), new_parent)?;
    }

    let row = DataPermissionRepo::update(&state.pool, id, &input, Some(user.user_id))
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: ENTITY, id }))?;

    tracing::info!(data_permission_id = id, user_id = user.user_id, "Data permission updated");

    Ok(Json(DataResponse { data: row }))
}

/// DELETE /api/v1/system/data-permissions/{id}
///
/// Children are left in place and show up as orphans.
pub async fn delete_data_permission(
    RequirePermission(user, _): RequirePermission<DataPermissionDelete>,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let orphans_children = DataPermissionRepo::has_children(&state.pool, id).await?;
    let deleted = DataPermissionRepo::delete(&state.pool, id).await?;

    if !deleted {
        return Err(AppError::Core(CoreError::NotFound { entity: ENTITY, id }));
    }

    if orphans_children {
        tracing::warn!(data_permission_id = id, "Deleted data permission had children");
    }
    tracing::info!(data_permission_id = id, user_id = user.user_id, "Data permission deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_or_404(pool: &DbPool, id: DbId) -> AppResult<DataPermission> {
    DataPermissionRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: ENTITY, id }))
}

/// Validate putting `id` (or a new record, when `None`) under `parent_id`.
fn check_placement(rows: &[DataPermission], id: Option<DbId>, parent_id: DbId) -> AppResult<()> {
    if !rows.iter().any(|r| r.id == parent_id) {
        return Err(parent_not_found(parent_id));
    }
    if let Some(id) = id {
        if reparent_creates_cycle(rows, id, parent_id) {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Parent {parent_id} is a descendant of data permission {id}"
            ))));
        }
    }
    if depth_after_move(rows, id, parent_id) > MAX_TREE_DEPTH {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Data permission trees are limited to {MAX_TREE_DEPTH} levels"
        ))));
    }
    Ok(())
}

fn parent_not_found(parent_id: DbId) -> AppError {
    AppError::Core(CoreError::Validation(format!(
        "Parent data permission {parent_id} does not exist"
    )))
}
