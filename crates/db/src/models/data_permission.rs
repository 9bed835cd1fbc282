//! Data-permission entity model and DTOs.

use dataperm_core::error::CoreError;
use dataperm_core::rules::{validate_rules, DataPermissionMode};
use dataperm_core::tree::TreeRecord;
use dataperm_core::types::{DbId, Timestamp, ROOT_PARENT_ID};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

/// A row from the `data_permissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataPermission {
    pub id: DbId,
    pub parent_id: DbId,
    pub name: String,
    pub rules: Value,
    #[sqlx(try_from = "i16")]
    pub mode_type: DataPermissionMode,
    pub is_active: bool,
    pub description: Option<String>,
    pub creator_id: Option<DbId>,
    pub modifier_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TreeRecord for DataPermission {
    fn id(&self) -> DbId {
        self.id
    }

    fn parent_id(&self) -> Option<DbId> {
        Some(self.parent_id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Option<bool> {
        Some(self.is_active)
    }
}

fn empty_rules() -> Value {
    Value::Array(Vec::new())
}

/// DTO for creating a data permission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDataPermission {
    /// Defaults to the root sentinel when omitted.
    #[serde(default)]
    pub parent_id: Option<DbId>,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[serde(default = "empty_rules")]
    pub rules: Value,
    #[serde(default)]
    pub mode_type: Option<DataPermissionMode>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[validate(length(max = 256))]
    pub description: Option<String>,
}

impl CreateDataPermission {
    /// Field-level checks plus rule-shape validation.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("name must not be blank".into()));
        }
        validate_rules(&self.rules)
    }

    pub fn parent_id_or_root(&self) -> DbId {
        self.parent_id.unwrap_or(ROOT_PARENT_ID)
    }
}

/// DTO for patching a data permission. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateDataPermission {
    pub parent_id: Option<DbId>,
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    pub rules: Option<Value>,
    pub mode_type: Option<DataPermissionMode>,
    pub is_active: Option<bool>,
    #[validate(length(max = 256))]
    pub description: Option<String>,
}

impl UpdateDataPermission {
    /// Field-level checks; `id` is the row being patched.
    pub fn check(&self, id: DbId) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CoreError::Validation("name must not be blank".into()));
        }
        if self.parent_id == Some(id) {
            return Err(CoreError::Validation(
                "A data permission cannot be its own parent".into(),
            ));
        }
        match &self.rules {
            Some(rules) => validate_rules(rules),
            None => Ok(()),
        }
    }
}

/// Query parameters for listing data permissions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPermissionListParams {
    /// Case-sensitive substring of `name`.
    pub name: Option<String>,
    pub mode_type: Option<i16>,
    /// Accepts `status` as well; empty strings mean "no filter".
    #[serde(default, alias = "status", deserialize_with = "optional_flag")]
    pub is_active: Option<bool>,
    /// Case-sensitive substring of `description`.
    pub description: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DataPermissionListParams {
    /// `name` with empty strings treated as absent.
    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn description_filter(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}

/// A page of data permissions plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct DataPermissionPage {
    pub items: Vec<DataPermission>,
    pub total: i64,
}

/// Query-string boolean: `true`/`false`/`1`/`0`, with blank meaning absent.
/// Any other value is a deserialization error.
pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected true or false, got '{other}'"
        ))),
    }
}
