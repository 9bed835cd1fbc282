//! Column, search-field and operation-button metadata for CRUD pages.
//!
//! These structures are serialized as-is to the admin client, which renders
//! the table, the search bar and the add/edit dialog from them.

use serde::Serialize;
use serde_json::Value;

use crate::permissions::PermissionSnapshot;
use crate::rules::DataPermissionMode;
use crate::tree::{TreeNode, TreeRecord};

/// Default width of the operation column, in pixels.
pub const DEFAULT_OPERATION_WIDTH: u32 = 260;

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// How a field is edited and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    String,
    Text,
    Integer,
    Boolean,
    Datetime,
    Select,
    Json,
    ObjectRelatedField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// A selectable option. Tree-shaped choices carry `children`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub value: Value,
    pub label: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Choice>,
}

impl Choice {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            disabled: false,
            children: Vec::new(),
        }
    }

    fn for_node<T: TreeRecord>(node: &TreeNode<T>) -> Self {
        Self {
            value: Value::from(node.record.id()),
            label: node.record.name().to_string(),
            disabled: node.record.status() == Some(false),
            children: Vec::new(),
        }
    }

    /// Map a record tree onto choices (`id` → value, `name` → label).
    ///
    /// Records whose status is explicitly `false` are disabled so they
    /// cannot be picked as a parent.
    pub fn from_tree<T: TreeRecord>(forest: &[TreeNode<T>]) -> Vec<Choice> {
        let mut roots = Vec::with_capacity(forest.len());
        for root in forest {
            let mut stack = vec![(Choice::for_node(root), root.children.iter())];
            while let Some((_, pending)) = stack.last_mut() {
                if let Some(child) = pending.next() {
                    stack.push((Choice::for_node(child), child.children.iter()));
                    continue;
                }
                let Some((choice, _)) = stack.pop() else {
                    break;
                };
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(choice),
                    None => roots.push(choice),
                }
            }
        }
        roots
    }
}

impl Drop for Choice {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut choice) = pending.pop() {
            pending.append(&mut choice.children);
        }
    }
}

/// Cascading selector settings for relation fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascaderConfig {
    pub value_key: String,
    pub label_key: String,
    /// When false the selector yields only the leaf value, not the full path.
    pub emit_path: bool,
    /// Allow selecting any level, not only leaves.
    pub check_strictly: bool,
    /// Value written back when the selection is cleared.
    pub value_on_clear: Value,
    pub options: Vec<Choice>,
}

impl CascaderConfig {
    /// Single-value selector over an `id`/`name` tree.
    pub fn single_node(options: Vec<Choice>) -> Self {
        Self {
            value_key: "id".into(),
            label_key: "name".into(),
            emit_path: false,
            check_strictly: true,
            value_on_clear: Value::String(String::new()),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    Cascader(CascaderConfig),
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub prop: String,
    pub label: String,
    pub input_type: InputType,
    pub required: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub default: Value,
    pub help_text: String,
    pub choices: Vec<Choice>,
    /// Display order in the table; `None` hides the column from the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_show: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget: Option<Widget>,
}

impl ColumnMeta {
    pub fn new(prop: impl Into<String>, label: impl Into<String>, input_type: InputType) -> Self {
        Self {
            prop: prop.into(),
            label: label.into(),
            input_type,
            required: false,
            read_only: false,
            write_only: false,
            default: Value::Null,
            help_text: String::new(),
            choices: Vec::new(),
            table_show: None,
            min_width: None,
            align: None,
            widget: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn table_show(mut self, order: u32) -> Self {
        self.table_show = Some(order);
        self
    }

    pub fn min_width(mut self, width: u32) -> Self {
        self.min_width = Some(width);
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }
}

/// Look up a column by `prop`.
pub fn find_column_mut<'a>(columns: &'a mut [ColumnMeta], prop: &str) -> Option<&'a mut ColumnMeta> {
    columns.iter_mut().find(|c| c.prop == prop)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchField {
    pub prop: String,
    pub label: String,
    pub help_text: String,
    pub input_type: InputType,
    pub choices: Vec<Choice>,
    pub default: Value,
}

// ---------------------------------------------------------------------------
// Operation column and page envelope
// ---------------------------------------------------------------------------

/// An extra per-row button next to the built-in edit/delete actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationButton {
    pub text: String,
    pub code: String,
    pub show: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationButtons {
    pub width: u32,
    pub buttons: Vec<OperationButton>,
}

impl Default for OperationButtons {
    fn default() -> Self {
        Self {
            width: DEFAULT_OPERATION_WIDTH,
            buttons: Vec::new(),
        }
    }
}

/// Everything the client needs to render a CRUD page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageConfig {
    pub columns: Vec<ColumnMeta>,
    pub search_fields: Vec<SearchField>,
    pub operation: OperationButtons,
    pub auth: PermissionSnapshot,
}

// ---------------------------------------------------------------------------
// Data-permission page
// ---------------------------------------------------------------------------

pub const PROP_PARENT_ID: &str = "parent_id";

/// Column set of the data-permission table and dialog.
///
/// `parent_id` starts with no choices; they are filled from the record tree
/// on every refresh.
pub fn data_permission_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta::new(PROP_PARENT_ID, "Parent", InputType::ObjectRelatedField)
            .default_value(0),
        ColumnMeta::new("name", "Name", InputType::String)
            .required()
            .align(Align::Left)
            .table_show(1),
        ColumnMeta::new("mode_type", "Mode", InputType::Select)
            .default_value(DataPermissionMode::Or.code())
            .choices(
                DataPermissionMode::ALL
                    .iter()
                    .map(|m| Choice::new(m.code(), m.label()))
                    .collect(),
            )
            .help("AND requires every rule to match; OR requires any rule to match")
            .table_show(2),
        ColumnMeta::new("rules", "Rules", InputType::Json)
            .required()
            .write_only()
            .default_value(Value::Array(Vec::new())),
        ColumnMeta::new("is_active", "Active", InputType::Boolean)
            .default_value(true)
            .table_show(3),
        ColumnMeta::new("created_at", "Created", InputType::Datetime)
            .read_only()
            .min_width(200)
            .table_show(4),
        ColumnMeta::new("description", "Description", InputType::String)
            .min_width(320)
            .table_show(5),
    ]
}

/// Search bar of the data-permission page.
pub fn data_permission_search_fields() -> Vec<SearchField> {
    vec![
        SearchField {
            prop: "name".into(),
            label: "Name".into(),
            help_text: String::new(),
            input_type: InputType::Text,
            choices: Vec::new(),
            default: Value::String(String::new()),
        },
        SearchField {
            prop: "status".into(),
            label: "Status".into(),
            help_text: String::new(),
            input_type: InputType::Select,
            choices: vec![Choice::new("true", "Enabled"), Choice::new("false", "Disabled")],
            default: Value::String(String::new()),
        },
    ]
}
