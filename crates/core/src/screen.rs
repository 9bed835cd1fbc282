//! State and strategy hooks of a tree-shaped CRUD management screen.
//!
//! [`CrudScreen`] is a plain owned state object: the search form, the loaded
//! tree, the column metadata and the permission snapshot, each behind an
//! explicit accessor. Per-page behaviour of the add/edit dialog is supplied
//! through a [`CrudHooks`] implementation.
//!
//! Lifecycle: [`CrudScreen::activate`] resolves permissions once and loads
//! the first tree; [`CrudScreen::refresh`] re-fetches and replaces all derived
//! state wholesale. A failed fetch leaves the tree and the parent choices
//! empty and returns the error unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::columns::{
    data_permission_columns, data_permission_search_fields, find_column_mut, CascaderConfig,
    Choice, ColumnMeta, OperationButtons, PageConfig, SearchField, Widget, PROP_PARENT_ID,
};
use crate::error::CoreError;
use crate::permissions::{AuthorizationLookup, PermissionSnapshot, DATA_PERMISSION_RESOURCE};
use crate::tree::{
    build_filtered_tree, build_tree, parse_status_value, records_from_json, FlatRecord,
    OrphanPolicy, RecordFilter, TreeNode,
};
use crate::types::ROOT_PARENT_ID;

// ---------------------------------------------------------------------------
// Upstream data source
// ---------------------------------------------------------------------------

/// One response of a list operation. Only `items` feed the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<Value>,
    #[serde(default)]
    pub total: Option<i64>,
}

/// The remote list operation backing a screen.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn list(&self) -> Result<ListPage, CoreError>;
}

// ---------------------------------------------------------------------------
// Search form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchForm {
    pub name: String,
    pub status: Option<bool>,
}

impl SearchForm {
    /// Set `status` from the raw select value (`"true"`, `"false"`, `""`).
    pub fn set_status_raw(&mut self, raw: &Value) {
        self.status = parse_status_value(raw);
    }

    pub fn to_filter(&self) -> RecordFilter {
        RecordFilter::new(
            Some(self.name.clone()).filter(|n| !n.is_empty()),
            self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Dialog strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogCommand {
    Sure,
    Cancel,
}

/// How the add/edit dialog was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogOutcome {
    /// The form had no `id`, i.e. it was an "add" dialog.
    pub is_add: bool,
    pub command: DialogCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Nothing,
    Refresh,
}

/// Per-page strategies plugged into the generic CRUD dialog.
///
/// Every method has a pass-through default.
pub trait CrudHooks: Send + Sync {
    /// Initial values of the dialog form for `raw_row` (`None` when adding).
    fn row_defaults(&self, _raw_row: Option<&Map<String, Value>>) -> Map<String, Value> {
        Map::new()
    }

    /// Adjust one column of the dialog, given the screen's current tree.
    fn configure_column(
        &self,
        column: ColumnMeta,
        _tree: &[TreeNode<FlatRecord>],
    ) -> ColumnMeta {
        column
    }

    /// Rewrite the form data just before it is sent.
    fn before_submit(&self, form_data: Map<String, Value>, _is_add: bool) -> Map<String, Value> {
        form_data
    }

    fn on_dialog_close(&self, _outcome: &DialogOutcome) -> DialogAction {
        DialogAction::Nothing
    }
}

/// Dialog behaviour of the data-permission page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataPermissionHooks;

fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

impl CrudHooks for DataPermissionHooks {
    /// Pre-select the row's parent; an empty string when it has none.
    fn row_defaults(&self, raw_row: Option<&Map<String, Value>>) -> Map<String, Value> {
        let parent = raw_row
            .and_then(|row| row.get(PROP_PARENT_ID))
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        let mut row = Map::new();
        row.insert(PROP_PARENT_ID.into(), parent);
        row
    }

    /// Render `parent_id` as a single-value cascader over the loaded tree.
    fn configure_column(&self, mut column: ColumnMeta, tree: &[TreeNode<FlatRecord>]) -> ColumnMeta {
        if column.prop == PROP_PARENT_ID {
            column.widget = Some(Widget::Cascader(CascaderConfig::single_node(
                Choice::from_tree(tree),
            )));
        }
        column
    }

    /// New records without a parent are stored as roots.
    fn before_submit(&self, mut form_data: Map<String, Value>, is_add: bool) -> Map<String, Value> {
        if is_add && is_falsy(form_data.get(PROP_PARENT_ID)) {
            form_data.insert(PROP_PARENT_ID.into(), Value::from(ROOT_PARENT_ID));
        }
        form_data
    }

    /// Reload after a confirmed add.
    fn on_dialog_close(&self, outcome: &DialogOutcome) -> DialogAction {
        if outcome.is_add && outcome.command == DialogCommand::Sure {
            DialogAction::Refresh
        } else {
            DialogAction::Nothing
        }
    }
}

// ---------------------------------------------------------------------------
// Screen
// ---------------------------------------------------------------------------

pub struct CrudScreen<H> {
    resource: String,
    permissions: PermissionSnapshot,
    search_form: SearchForm,
    columns: Vec<ColumnMeta>,
    search_fields: Vec<SearchField>,
    operation: OperationButtons,
    data_list: Vec<TreeNode<FlatRecord>>,
    hooks: H,
}

pub type DataPermissionScreen = CrudScreen<DataPermissionHooks>;

impl DataPermissionScreen {
    pub fn data_permission() -> Self {
        CrudScreen::new(
            DATA_PERMISSION_RESOURCE,
            data_permission_columns(),
            data_permission_search_fields(),
            DataPermissionHooks,
        )
    }
}

impl<H: CrudHooks> CrudScreen<H> {
    pub fn new(
        resource: impl Into<String>,
        columns: Vec<ColumnMeta>,
        search_fields: Vec<SearchField>,
        hooks: H,
    ) -> Self {
        Self {
            resource: resource.into(),
            permissions: PermissionSnapshot::default(),
            search_form: SearchForm::default(),
            columns,
            search_fields,
            operation: OperationButtons::default(),
            data_list: Vec::new(),
            hooks,
        }
    }

    /// Resolve the permission snapshot and load the first tree.
    pub async fn activate(
        &mut self,
        lookup: &(dyn AuthorizationLookup + Sync),
        source: &dyn RecordSource,
    ) -> Result<(), CoreError> {
        self.permissions = PermissionSnapshot::resolve(lookup, &self.resource);
        tracing::debug!(resource = %self.resource, auth = ?self.permissions, "Screen activated");
        self.refresh(source).await
    }

    /// Fetch the list and rebuild the parent choices and the filtered tree.
    pub async fn refresh(&mut self, source: &dyn RecordSource) -> Result<(), CoreError> {
        let loaded = match source.list().await {
            Ok(page) => self.derive(page),
            Err(err) => Err(err),
        };

        match loaded {
            Ok((parent_choices, data_list)) => {
                self.set_parent_choices(parent_choices);
                tracing::debug!(
                    resource = %self.resource,
                    roots = data_list.len(),
                    "Screen tree rebuilt",
                );
                self.data_list = data_list;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(resource = %self.resource, error = %err, "Screen refresh failed");
                self.set_parent_choices(Vec::new());
                self.data_list = Vec::new();
                Err(err)
            }
        }
    }

    fn derive(
        &self,
        page: ListPage,
    ) -> Result<(Vec<Choice>, Vec<TreeNode<FlatRecord>>), CoreError> {
        let records = records_from_json(page.items)?;
        let full_tree = build_tree(records.clone())?;
        let filtered = build_filtered_tree(
            records,
            &self.search_form.to_filter(),
            OrphanPolicy::Drop,
        )?;
        Ok((Choice::from_tree(&full_tree), filtered))
    }

    fn set_parent_choices(&mut self, choices: Vec<Choice>) {
        if let Some(column) = find_column_mut(&mut self.columns, PROP_PARENT_ID) {
            column.choices = choices;
        }
    }

    /// Columns as the add/edit dialog should render them.
    pub fn dialog_columns(&self) -> Vec<ColumnMeta> {
        self.columns
            .iter()
            .cloned()
            .map(|c| self.hooks.configure_column(c, &self.data_list))
            .collect()
    }

    pub fn dialog_row(&self, raw_row: Option<&Map<String, Value>>) -> Map<String, Value> {
        self.hooks.row_defaults(raw_row)
    }

    pub fn prepare_submit(&self, form_data: Map<String, Value>, is_add: bool) -> Map<String, Value> {
        self.hooks.before_submit(form_data, is_add)
    }

    /// Run the close strategy and refresh when it asks for it.
    pub async fn close_dialog(
        &mut self,
        outcome: DialogOutcome,
        source: &dyn RecordSource,
    ) -> Result<DialogAction, CoreError> {
        let action = self.hooks.on_dialog_close(&outcome);
        if action == DialogAction::Refresh {
            self.refresh(source).await?;
        }
        Ok(action)
    }

    pub fn page_config(&self) -> PageConfig {
        PageConfig {
            columns: self.columns.clone(),
            search_fields: self.search_fields.clone(),
            operation: self.operation.clone(),
            auth: self.permissions,
        }
    }

    pub fn permissions(&self) -> PermissionSnapshot {
        self.permissions
    }

    pub fn search_form(&self) -> &SearchForm {
        &self.search_form
    }

    pub fn search_form_mut(&mut self) -> &mut SearchForm {
        &mut self.search_form
    }

    pub fn data_list(&self) -> &[TreeNode<FlatRecord>] {
        &self.data_list
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn search_fields(&self) -> &[SearchField] {
        &self.search_fields
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::permissions::GrantedPermissions;
    use crate::tree::count_nodes;

    struct StaticSource {
        items: Vec<Value>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(items: Vec<Value>) -> Self {
            Self {
                items,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordSource for StaticSource {
        async fn list(&self) -> Result<ListPage, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ListPage {
                items: self.items.clone(),
                total: Some(self.items.len() as i64),
            })
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        async fn list(&self) -> Result<ListPage, CoreError> {
            Err(CoreError::Upstream("connection refused".into()))
        }
    }

    fn items() -> Vec<Value> {
        vec![
            json!({"id": 1, "parent_id": 0, "name": "A", "status": true}),
            json!({"id": 2, "parent_id": 1, "name": "B", "status": false}),
            json!({"id": 3, "parent_id": 1, "name": "C", "status": true}),
        ]
    }

    fn viewer() -> GrantedPermissions {
        GrantedPermissions::new(["system:data_permission:list", "system:data_permission:view"])
    }

    fn parent_choices<H: CrudHooks>(screen: &CrudScreen<H>) -> &[Choice] {
        &screen
            .columns()
            .iter()
            .find(|c| c.prop == PROP_PARENT_ID)
            .unwrap()
            .choices
    }

    #[tokio::test]
    async fn test_activate_resolves_permissions_and_loads_tree() {
        let source = StaticSource::new(items());
        let mut screen = DataPermissionScreen::data_permission();

        screen.activate(&viewer(), &source).await.unwrap();

        let auth = screen.permissions();
        assert!(auth.list && auth.detail);
        assert!(!auth.create && !auth.edit && !auth.delete);
        assert_eq!(screen.data_list().len(), 1);
        assert_eq!(count_nodes(screen.data_list()), 3);
        assert_eq!(parent_choices(&screen).len(), 1);
    }

    #[tokio::test]
    async fn test_filters_apply_to_tree_but_not_parent_choices() {
        let source = StaticSource::new(items());
        let mut screen = DataPermissionScreen::data_permission();
        screen.search_form_mut().name = "A".into();

        screen.refresh(&source).await.unwrap();

        assert_eq!(count_nodes(screen.data_list()), 1);
        assert!(screen.data_list()[0].children.is_empty());
        assert_eq!(parent_choices(&screen)[0].children.len(), 2);
    }

    #[tokio::test]
    async fn test_status_filter_from_raw_select_value() {
        let source = StaticSource::new(items());
        let mut screen = DataPermissionScreen::data_permission();
        screen.search_form_mut().set_status_raw(&json!("false"));

        screen.refresh(&source).await.unwrap();

        // Only B is inactive and its parent is filtered out.
        assert!(screen.data_list().is_empty());

        screen.search_form_mut().set_status_raw(&json!(""));
        screen.refresh(&source).await.unwrap();
        assert_eq!(count_nodes(screen.data_list()), 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_tree_empty() {
        let mut screen = DataPermissionScreen::data_permission();
        screen.refresh(&StaticSource::new(items())).await.unwrap();
        assert!(!screen.data_list().is_empty());

        let result = screen.refresh(&FailingSource).await;

        assert_matches!(result, Err(CoreError::Upstream(_)));
        assert!(screen.data_list().is_empty());
        assert!(parent_choices(&screen).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_fails_refresh() {
        let source = StaticSource::new(vec![json!({"id": 1, "parent_id": 0}), json!({"name": "x"})]);
        let mut screen = DataPermissionScreen::data_permission();

        let result = screen.refresh(&source).await;

        assert_matches!(result, Err(CoreError::MalformedRecord { index: 1, .. }));
        assert!(screen.data_list().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_add_close_refreshes() {
        let source = StaticSource::new(items());
        let mut screen = DataPermissionScreen::data_permission();

        let add = DialogOutcome {
            is_add: true,
            command: DialogCommand::Sure,
        };
        let edit = DialogOutcome {
            is_add: false,
            command: DialogCommand::Sure,
        };
        let cancelled = DialogOutcome {
            is_add: true,
            command: DialogCommand::Cancel,
        };

        assert_eq!(screen.close_dialog(edit, &source).await.unwrap(), DialogAction::Nothing);
        assert_eq!(
            screen.close_dialog(cancelled, &source).await.unwrap(),
            DialogAction::Nothing
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        assert_eq!(screen.close_dialog(add, &source).await.unwrap(), DialogAction::Refresh);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(count_nodes(screen.data_list()), 3);
    }

    #[tokio::test]
    async fn test_dialog_parent_column_uses_loaded_tree() {
        let source = StaticSource::new(items());
        let mut screen = DataPermissionScreen::data_permission();
        screen.refresh(&source).await.unwrap();

        let columns = screen.dialog_columns();
        let parent = columns.iter().find(|c| c.prop == PROP_PARENT_ID).unwrap();
        let Some(Widget::Cascader(config)) = &parent.widget else {
            panic!("parent_id should render as a cascader");
        };
        assert_eq!(config.options.len(), 1);
        assert!(!config.emit_path);
        assert!(columns
            .iter()
            .filter(|c| c.prop != PROP_PARENT_ID)
            .all(|c| c.widget.is_none()));
    }

    #[test]
    fn test_before_submit_defaults_parent_on_add_only() {
        let hooks = DataPermissionHooks;

        let mut form = Map::new();
        form.insert("parent_id".into(), json!(""));
        let added = hooks.before_submit(form.clone(), true);
        assert_eq!(added["parent_id"], json!(0));

        let edited = hooks.before_submit(form, false);
        assert_eq!(edited["parent_id"], json!(""));

        let mut kept = Map::new();
        kept.insert("parent_id".into(), json!(7));
        assert_eq!(hooks.before_submit(kept, true)["parent_id"], json!(7));

        assert_eq!(hooks.before_submit(Map::new(), true)["parent_id"], json!(0));
    }

    #[test]
    fn test_row_defaults_preselect_parent() {
        let hooks = DataPermissionHooks;
        let mut row = Map::new();
        row.insert("parent_id".into(), json!(4));

        assert_eq!(hooks.row_defaults(Some(&row))["parent_id"], json!(4));
        assert_eq!(hooks.row_defaults(None)["parent_id"], json!(""));
    }

    #[test]
    fn test_page_config_carries_snapshot() {
        let screen = DataPermissionScreen::data_permission();
        let config = screen.page_config();
        assert_eq!(config.auth, PermissionSnapshot::default());
        assert_eq!(config.search_fields.len(), 2);
        assert_eq!(config.operation, OperationButtons::default());
    }
}
