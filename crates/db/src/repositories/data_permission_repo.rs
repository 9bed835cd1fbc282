//! Repository for the `data_permissions` table.

use dataperm_core::rules::DataPermissionMode;
use dataperm_core::types::DbId;
use sqlx::PgPool;

use crate::models::data_permission::{
    CreateDataPermission, DataPermission, DataPermissionListParams, DataPermissionPage,
    UpdateDataPermission,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, parent_id, name, rules, mode_type, is_active, description, \
    creator_id, modifier_id, created_at, updated_at";

/// Shared `WHERE` clause for list and count queries. Every filter is optional.
const FILTER: &str = "\
    WHERE ($1::TEXT IS NULL OR strpos(name, $1) > 0) \
      AND ($2::SMALLINT IS NULL OR mode_type = $2) \
      AND ($3::BOOLEAN IS NULL OR is_active = $3) \
      AND ($4::TEXT IS NULL OR strpos(description, $4) > 0)";

/// Default page size for listing.
const DEFAULT_LIMIT: i64 = 100;

/// Maximum page size for listing.
const MAX_LIMIT: i64 = 1000;

/// Clamp a requested page size to `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a requested offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Provides CRUD operations for data permissions.
pub struct DataPermissionRepo;

impl DataPermissionRepo {
    /// Insert a new data permission, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDataPermission,
        creator_id: Option<DbId>,
    ) -> Result<DataPermission, sqlx::Error> {
        let query = format!(
            "INSERT INTO data_permissions \
                 (parent_id, name, rules, mode_type, is_active, description, creator_id, modifier_id) \
             VALUES ($1, $2, $3, $4, COALESCE($5, TRUE), $6, $7, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DataPermission>(&query)
            .bind(input.parent_id_or_root())
            .bind(&input.name)
            .bind(&input.rules)
            .bind(input.mode_type.unwrap_or_default().code())
            .bind(input.is_active)
            .bind(&input.description)
            .bind(creator_id)
            .fetch_one(pool)
            .await
    }

    /// Find a data permission by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DataPermission>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM data_permissions WHERE id = $1");
        sqlx::query_as::<_, DataPermission>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List one page of matching rows, newest first, with the total match count.
    pub async fn list(
        pool: &PgPool,
        params: &DataPermissionListParams,
    ) -> Result<DataPermissionPage, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM data_permissions {FILTER} \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        let items = sqlx::query_as::<_, DataPermission>(&query)
            .bind(params.name_filter())
            .bind(params.mode_type)
            .bind(params.is_active)
            .bind(params.description_filter())
            .bind(clamp_limit(params.limit))
            .bind(clamp_offset(params.offset))
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM data_permissions {FILTER}");
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(params.name_filter())
            .bind(params.mode_type)
            .bind(params.is_active)
            .bind(params.description_filter())
            .fetch_one(pool)
            .await?;

        Ok(DataPermissionPage { items, total })
    }

    /// All rows in insertion order, unpaginated. Feeds tree building, which
    /// needs every potential parent.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<DataPermission>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM data_permissions ORDER BY id");
        sqlx::query_as::<_, DataPermission>(&query)
            .fetch_all(pool)
            .await
    }

    /// Patch a data permission. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateDataPermission,
        modifier_id: Option<DbId>,
    ) -> Result<Option<DataPermission>, sqlx::Error> {
        let query = format!(
            "UPDATE data_permissions SET \
                 parent_id = COALESCE($2, parent_id), \
                 name = COALESCE($3, name), \
                 rules = COALESCE($4, rules), \
                 mode_type = COALESCE($5, mode_type), \
                 is_active = COALESCE($6, is_active), \
                 description = COALESCE($7, description), \
                 modifier_id = COALESCE($8, modifier_id) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DataPermission>(&query)
            .bind(id)
            .bind(input.parent_id)
            .bind(&input.name)
            .bind(&input.rules)
            .bind(input.mode_type.map(DataPermissionMode::code))
            .bind(input.is_active)
            .bind(&input.description)
            .bind(modifier_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a data permission by ID. Returns `true` if a row was deleted.
    ///
    /// Children keep their `parent_id` and surface as orphans.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM data_permissions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether any row names `id` as its parent.
    pub async fn has_children(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM data_permissions WHERE parent_id = $1)")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(5000)), MAX_LIMIT);
    }

    #[test]
    fn test_clamp_offset() {
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(-3)), 0);
        assert_eq!(clamp_offset(Some(40)), 40);
    }
}
