//! Flat-list to tree conversion with optional pre-filtering.
//!
//! Records carry an `id` and a `parent_id`; the builder groups them by parent
//! in a single pass and then assembles nested [`TreeNode`]s starting from the
//! root-parented records. Sibling order always follows input order.
//!
//! Filtering happens *before* assembly. A record removed by the filter can no
//! longer act as a parent, so under [`OrphanPolicy::Drop`] its whole subtree
//! disappears from the output.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{DbId, ROOT_PARENT_ID};

// ---------------------------------------------------------------------------
// Record abstraction
// ---------------------------------------------------------------------------

/// Anything that can be placed in a parent/child tree and filtered.
pub trait TreeRecord {
    fn id(&self) -> DbId;

    /// `None` and [`ROOT_PARENT_ID`] both mark a root.
    fn parent_id(&self) -> Option<DbId>;

    fn name(&self) -> &str;

    fn status(&self) -> Option<bool>;
}

/// A loosely-typed record as delivered by a list endpoint.
///
/// Only `id`, `parent_id`, `name` and `status` are interpreted; every other
/// attribute is carried through untouched in `extra`. Rows without a
/// `status` fall back to `is_active` when filtered, without gaining a
/// `status` key of their own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlatRecord {
    /// Convert one JSON item into a record.
    ///
    /// `index` is the item's position in the fetched list and only feeds the
    /// error message. A missing or non-integer `id` is rejected instead of
    /// silently dropping the item, which would corrupt the tree invisibly.
    pub fn from_json(index: usize, value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut fields) = value else {
            return Err(malformed(index, "expected a JSON object"));
        };

        let id = match fields.remove("id") {
            Some(raw) => as_db_id(&raw)
                .ok_or_else(|| malformed(index, format!("`id` is not an integer: {raw}")))?,
            None => return Err(malformed(index, "missing `id`")),
        };

        let parent_id = match fields.remove("parent_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(raw) => Some(as_db_id(&raw).ok_or_else(|| {
                malformed(index, format!("`parent_id` is not an integer: {raw}"))
            })?),
        };

        let name = match fields.remove("name") {
            Some(Value::String(s)) => s,
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        let status = fields.remove("status").and_then(|raw| parse_status_value(&raw));

        Ok(Self {
            id,
            parent_id,
            name,
            status,
            extra: fields,
        })
    }
}

impl TreeRecord for FlatRecord {
    fn id(&self) -> DbId {
        self.id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.parent_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Option<bool> {
        self.status
            .or_else(|| self.extra.get("is_active").and_then(parse_status_value))
    }
}

/// Convert a fetched item collection into records, failing on the first
/// malformed item.
pub fn records_from_json(items: Vec<Value>) -> Result<Vec<FlatRecord>, CoreError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| FlatRecord::from_json(index, item))
        .collect()
}

/// Interpret a boolean-like JSON value.
///
/// Accepts booleans, integers (`0` is false) and the strings `"true"`,
/// `"false"`, `"1"`, `"0"`. Anything else, including `""`, yields `None`.
pub fn parse_status_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_db_id(value: &Value) -> Option<DbId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn malformed(index: usize, reason: impl Into<String>) -> CoreError {
    CoreError::MalformedRecord {
        index,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Pre-build filter on the flat list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-sensitive substring of `name`. Empty or `None` disables it.
    pub name: Option<String>,
    /// Exact `status` value. `None` disables it.
    pub status: Option<bool>,
}

impl RecordFilter {
    pub fn new(name: Option<String>, status: Option<bool>) -> Self {
        Self { name, status }
    }

    /// True when neither criterion is active.
    pub fn is_noop(&self) -> bool {
        self.active_name().is_none() && self.status.is_none()
    }

    fn active_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn matches<T: TreeRecord>(&self, record: &T) -> bool {
        if let Some(needle) = self.active_name() {
            if !record.name().contains(needle) {
                return false;
            }
        }
        match self.status {
            Some(wanted) => record.status() == Some(wanted),
            None => true,
        }
    }

    pub fn apply<T: TreeRecord>(&self, records: Vec<T>) -> Vec<T> {
        if self.is_noop() {
            return records;
        }
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tree assembly
// ---------------------------------------------------------------------------

/// What to do with a record whose parent is not in the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// The record and its descendants are left out.
    #[default]
    Drop,
    /// The record becomes an additional root.
    PromoteToRoot,
}

/// Deepest hierarchy the write endpoints accept, counting the root as level 1.
pub const MAX_TREE_DEPTH: usize = 32;

/// A record with its ordered children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub record: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_size(&self) -> usize {
        1 + count_nodes(&self.children)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl<T> Drop for TreeNode<T> {
    // Flatten the subtree first so deep chains are freed without recursion.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Total number of nodes in a forest.
pub fn count_nodes<T>(forest: &[TreeNode<T>]) -> usize {
    let mut pending: Vec<&TreeNode<T>> = forest.iter().collect();
    let mut count = 0;
    while let Some(node) = pending.pop() {
        count += 1;
        pending.extend(&node.children);
    }
    count
}

/// Build a tree, dropping records whose parent is absent.
pub fn build_tree<T: TreeRecord>(records: Vec<T>) -> Result<Vec<TreeNode<T>>, CoreError> {
    build_tree_with(records, OrphanPolicy::Drop)
}

/// Filter the flat list, then build the tree from the survivors.
pub fn build_filtered_tree<T: TreeRecord>(
    records: Vec<T>,
    filter: &RecordFilter,
    policy: OrphanPolicy,
) -> Result<Vec<TreeNode<T>>, CoreError> {
    build_tree_with(filter.apply(records), policy)
}

/// Build a tree with an explicit orphan policy.
///
/// Runs in O(n): one pass indexes ids and groups children by parent, then
/// each record is moved into the output at most once. Because a record can
/// only be placed once, cycles that are unreachable from a root are simply
/// absent from the result.
pub fn build_tree_with<T: TreeRecord>(
    records: Vec<T>,
    policy: OrphanPolicy,
) -> Result<Vec<TreeNode<T>>, CoreError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut known_ids: HashMap<DbId, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if known_ids.insert(record.id(), index).is_some() {
            return Err(CoreError::DuplicateId {
                index,
                id: record.id(),
            });
        }
    }

    let mut roots = Vec::new();
    let mut children_of: HashMap<DbId, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        match record.parent_id().filter(|&p| p != ROOT_PARENT_ID) {
            None => roots.push(index),
            Some(parent)
                if policy == OrphanPolicy::PromoteToRoot && !known_ids.contains_key(&parent) =>
            {
                roots.push(index)
            }
            Some(parent) => children_of.entry(parent).or_default().push(index),
        }
    }

    let mut slots: Vec<Option<T>> = records.into_iter().map(Some).collect();
    Ok(roots
        .into_iter()
        .filter_map(|index| assemble(index, &mut slots, &children_of))
        .collect())
}

/// A node under construction plus the child indices not yet visited.
struct Frame<'a, T> {
    node: TreeNode<T>,
    pending: std::slice::Iter<'a, usize>,
}

impl<'a, T: TreeRecord> Frame<'a, T> {
    fn new(record: T, children_of: &'a HashMap<DbId, Vec<usize>>) -> Self {
        let pending = children_of
            .get(&record.id())
            .map_or(&[][..], Vec::as_slice)
            .iter();
        Self {
            node: TreeNode {
                record,
                children: Vec::new(),
            },
            pending,
        }
    }
}

/// Depth-first assembly with an explicit stack, so chain depth is bounded
/// by the heap rather than the call stack.
fn assemble<T: TreeRecord>(
    index: usize,
    slots: &mut [Option<T>],
    children_of: &HashMap<DbId, Vec<usize>>,
) -> Option<TreeNode<T>> {
    let record = slots[index].take()?;
    let mut stack = vec![Frame::new(record, children_of)];

    while let Some(frame) = stack.last_mut() {
        match frame.pending.next() {
            Some(&child) => {
                if let Some(record) = slots[child].take() {
                    stack.push(Frame::new(record, children_of));
                }
            }
            None => {
                let node = stack.pop()?.node;
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(node),
                    None => return Some(node),
                }
            }
        }
    }
    None
}

fn parent_map<T: TreeRecord>(records: &[T]) -> HashMap<DbId, DbId> {
    records
        .iter()
        .filter_map(|r| r.parent_id().map(|p| (r.id(), p)))
        .collect()
}

/// Levels from the root down to `id`, inclusive. The root sentinel is level 0.
fn level_of(parent_of: &HashMap<DbId, DbId>, id: DbId, bound: usize) -> usize {
    if id == ROOT_PARENT_ID {
        return 0;
    }
    let mut level = 1;
    let mut current = id;
    while level <= bound {
        match parent_of.get(&current) {
            Some(&parent) if parent != ROOT_PARENT_ID => {
                current = parent;
                level += 1;
            }
            _ => break,
        }
    }
    level
}

/// Levels in the subtree rooted at `id`, inclusive.
fn subtree_height<T: TreeRecord>(records: &[T], id: DbId) -> usize {
    let mut children_of: HashMap<DbId, Vec<DbId>> = HashMap::new();
    for record in records {
        if let Some(parent) = record.parent_id() {
            children_of.entry(parent).or_default().push(record.id());
        }
    }

    let mut seen = HashSet::from([id]);
    let mut pending = vec![(id, 1)];
    let mut height = 0;
    while let Some((current, level)) = pending.pop() {
        height = height.max(level);
        for &child in children_of.get(&current).into_iter().flatten() {
            if seen.insert(child) {
                pending.push((child, level + 1));
            }
        }
    }
    height
}

/// Depth of the deepest node once `id` (or a new leaf, when `None`) sits
/// under `new_parent`.
pub fn depth_after_move<T: TreeRecord>(
    records: &[T],
    id: Option<DbId>,
    new_parent: DbId,
) -> usize {
    let parent_of = parent_map(records);
    let above = level_of(&parent_of, new_parent, records.len());
    let height = match id {
        Some(id) => subtree_height(records, id),
        None => 1,
    };
    above + height
}

/// Whether moving record `id` under `new_parent` would close a loop, i.e.
/// `new_parent` is `id` itself or one of its descendants.
pub fn reparent_creates_cycle<T: TreeRecord>(records: &[T], id: DbId, new_parent: DbId) -> bool {
    let parent_of = parent_map(records);

    let mut current = new_parent;
    // Bounded walk: pre-existing loops in the data must not hang the check.
    for _ in 0..=records.len() {
        if current == id {
            return true;
        }
        match parent_of.get(&current) {
            Some(&parent) if parent != ROOT_PARENT_ID => current = parent,
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn rec(id: DbId, parent_id: DbId, name: &str) -> FlatRecord {
        FlatRecord {
            id,
            parent_id: Some(parent_id),
            name: name.to_string(),
            status: Some(true),
            extra: Map::new(),
        }
    }

    fn with_status(mut record: FlatRecord, status: bool) -> FlatRecord {
        record.status = Some(status);
        record
    }

    fn ids<T: TreeRecord>(forest: &[TreeNode<T>]) -> Vec<DbId> {
        forest.iter().map(|n| n.record.id()).collect()
    }

    fn sample() -> Vec<FlatRecord> {
        vec![rec(1, 0, "A"), rec(2, 1, "B"), rec(3, 1, "C")]
    }

    #[test]
    fn test_builds_single_root_with_ordered_children() {
        let tree = build_tree(sample()).unwrap();

        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(ids(&tree[0].children), vec![2, 3]);
        assert!(tree[0].children.iter().all(TreeNode::is_leaf));
    }

    #[test]
    fn test_name_filter_orphans_children_of_unmatched_parent() {
        let filter = RecordFilter::new(Some("A".into()), None);
        let tree = build_filtered_tree(sample(), &filter, OrphanPolicy::Drop).unwrap();

        assert_eq!(ids(&tree), vec![1]);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_filtered_out_parent_drops_whole_subtree() {
        let records = vec![
            rec(1, 0, "keep root"),
            rec(2, 1, "gone"),
            rec(3, 2, "keep grandchild"),
            rec(4, 1, "keep child"),
        ];
        let filter = RecordFilter::new(Some("keep".into()), None);
        let tree = build_filtered_tree(records, &filter, OrphanPolicy::Drop).unwrap();

        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(ids(&tree[0].children), vec![4]);
        assert_eq!(count_nodes(&tree), 2);
    }

    #[test]
    fn test_sibling_order_follows_input_order() {
        let records = vec![
            rec(10, 0, "root"),
            rec(7, 10, "x"),
            rec(3, 10, "y"),
            rec(9, 10, "z"),
            rec(1, 0, "second root"),
        ];
        let tree = build_tree(records).unwrap();

        assert_eq!(ids(&tree), vec![10, 1]);
        assert_eq!(ids(&tree[0].children), vec![7, 3, 9]);
    }

    #[test]
    fn test_children_listed_before_parent_are_still_attached() {
        let records = vec![rec(3, 2, "leaf"), rec(2, 1, "mid"), rec(1, 0, "root")];
        let tree = build_tree(records).unwrap();

        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(ids(&tree[0].children), vec![2]);
        assert_eq!(ids(&tree[0].children[0].children), vec![3]);
    }

    #[test]
    fn test_empty_name_filter_is_noop() {
        let filter = RecordFilter::new(Some(String::new()), None);
        assert!(filter.is_noop());

        let filtered = build_filtered_tree(sample(), &filter, OrphanPolicy::Drop).unwrap();
        assert_eq!(filtered, build_tree(sample()).unwrap());
    }

    #[test]
    fn test_absent_status_filter_is_noop() {
        let records = vec![
            with_status(rec(1, 0, "A"), false),
            with_status(rec(2, 1, "B"), true),
        ];
        let filtered =
            build_filtered_tree(records.clone(), &RecordFilter::default(), OrphanPolicy::Drop)
                .unwrap();
        assert_eq!(filtered, build_tree(records).unwrap());
    }

    #[test]
    fn test_status_filter_requires_exact_match() {
        let records = vec![
            with_status(rec(1, 0, "A"), true),
            with_status(rec(2, 0, "B"), false),
            FlatRecord {
                status: None,
                ..rec(3, 0, "C")
            },
        ];
        let filter = RecordFilter::new(None, Some(false));
        let tree = build_filtered_tree(records, &filter, OrphanPolicy::Drop).unwrap();

        assert_eq!(ids(&tree), vec![2]);
    }

    #[test]
    fn test_name_filter_is_case_sensitive() {
        let filter = RecordFilter::new(Some("a".into()), None);
        let tree = build_filtered_tree(sample(), &filter, OrphanPolicy::Drop).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_node_count_matches_surviving_records() {
        let records = vec![
            rec(1, 0, "r1"),
            rec(2, 1, "c1"),
            rec(3, 1, "c2"),
            rec(4, 3, "g1"),
            rec(5, 0, "r2"),
        ];
        let tree = build_tree(records).unwrap();
        assert_eq!(count_nodes(&tree), 5);
        assert_eq!(tree[0].subtree_size(), 4);
    }

    #[test]
    fn test_no_root_yields_empty_tree() {
        let records = vec![rec(2, 1, "B"), rec(3, 1, "C")];
        assert!(build_tree(records).unwrap().is_empty());
        assert!(build_tree(Vec::<FlatRecord>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_parent_id_counts_as_root() {
        let records = vec![FlatRecord {
            parent_id: None,
            ..rec(1, 0, "A")
        }];
        assert_eq!(ids(&build_tree(records).unwrap()), vec![1]);
    }

    #[test]
    fn test_promote_orphans_to_roots() {
        let records = vec![rec(2, 1, "B"), rec(3, 2, "C"), rec(4, 0, "D")];
        let tree = build_tree_with(records, OrphanPolicy::PromoteToRoot).unwrap();

        assert_eq!(ids(&tree), vec![2, 4]);
        assert_eq!(ids(&tree[0].children), vec![3]);
    }

    #[test]
    fn test_cycle_unreachable_from_root_is_left_out() {
        let records = vec![rec(1, 0, "root"), rec(2, 3, "a"), rec(3, 2, "b")];
        let tree = build_tree(records).unwrap();
        assert_eq!(count_nodes(&tree), 1);
    }

    #[test]
    fn test_self_parented_record_does_not_loop() {
        let records = vec![rec(1, 1, "self")];
        let tree = build_tree_with(records, OrphanPolicy::PromoteToRoot).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let records = vec![rec(1, 0, "A"), rec(1, 0, "A again")];
        assert_matches!(
            build_tree(records),
            Err(CoreError::DuplicateId { index: 1, id: 1 })
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let first = build_tree(sample()).unwrap();
        let second = build_tree(sample()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_json_requires_id() {
        let result = records_from_json(vec![
            json!({"id": 1, "parent_id": 0, "name": "A"}),
            json!({"parent_id": 1, "name": "B"}),
        ]);
        assert_matches!(result, Err(CoreError::MalformedRecord { index: 1, .. }));
    }

    #[test]
    fn test_from_json_rejects_non_object_and_bad_id() {
        assert_matches!(
            FlatRecord::from_json(0, json!([1, 2])),
            Err(CoreError::MalformedRecord { index: 0, .. })
        );
        assert_matches!(
            FlatRecord::from_json(4, json!({"id": "abc"})),
            Err(CoreError::MalformedRecord { index: 4, .. })
        );
    }

    #[test]
    fn test_from_json_keeps_extra_attributes() {
        let record = FlatRecord::from_json(
            0,
            json!({"id": "5", "parent_id": "", "name": "P", "is_active": false, "rank": 3}),
        )
        .unwrap();

        assert_eq!(record.id, 5);
        assert_eq!(record.parent_id, None);
        assert_eq!(TreeRecord::status(&record), Some(false));
        assert_eq!(record.extra["rank"], json!(3));
        assert_eq!(record.extra["is_active"], json!(false));
    }

    #[test]
    fn test_status_from_is_active_is_not_serialized() {
        let record =
            FlatRecord::from_json(0, json!({"id": 1, "name": "P", "is_active": true})).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(record.status, None);
        assert!(value.get("status").is_none());
        assert_eq!(value["is_active"], true);

        let filter = RecordFilter::new(None, Some(true));
        assert!(filter.matches(&record));
    }

    #[test]
    fn test_explicit_status_wins_over_is_active() {
        let record = FlatRecord::from_json(
            0,
            json!({"id": 1, "name": "P", "status": "false", "is_active": true}),
        )
        .unwrap();

        assert_eq!(TreeRecord::status(&record), Some(false));
        assert_eq!(serde_json::to_value(&record).unwrap()["status"], false);
    }

    #[test]
    fn test_tree_node_serializes_flat_with_children() {
        let tree = build_tree(sample()).unwrap();
        let value = serde_json::to_value(&tree).unwrap();

        assert_eq!(value[0]["id"], 1);
        assert_eq!(value[0]["name"], "A");
        assert_eq!(value[0]["children"][1]["id"], 3);
        assert_eq!(value[0]["children"][1]["children"], json!([]));
    }

    #[test]
    fn test_parse_status_value_variants() {
        assert_eq!(parse_status_value(&json!(true)), Some(true));
        assert_eq!(parse_status_value(&json!(0)), Some(false));
        assert_eq!(parse_status_value(&json!("true")), Some(true));
        assert_eq!(parse_status_value(&json!("false")), Some(false));
        assert_eq!(parse_status_value(&json!("")), None);
        assert_eq!(parse_status_value(&json!(null)), None);
    }

    #[test]
    fn test_reparent_cycle_detection() {
        let records = vec![rec(1, 0, "A"), rec(2, 1, "B"), rec(3, 2, "C"), rec(4, 0, "D")];

        assert!(reparent_creates_cycle(&records, 1, 1));
        assert!(reparent_creates_cycle(&records, 1, 3));
        assert!(!reparent_creates_cycle(&records, 3, 4));
        assert!(!reparent_creates_cycle(&records, 2, ROOT_PARENT_ID));
    }

    fn chain(len: DbId) -> Vec<FlatRecord> {
        (1..=len).map(|i| rec(i, i - 1, "link")).collect()
    }

    #[test]
    fn test_deep_chain_builds_and_counts_without_recursion() {
        let depth = 50_000;
        let tree = build_tree(chain(depth)).unwrap();

        assert_eq!(count_nodes(&tree), depth as usize);
        assert_eq!(tree[0].subtree_size(), depth as usize);

        let mut levels = 1;
        let mut node = &tree[0];
        while let Some(child) = node.children.first() {
            node = child;
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(node.record.id, depth);
    }

    #[test]
    fn test_deep_chain_in_reverse_order() {
        let mut records = chain(20_000);
        records.reverse();
        let tree = build_tree_with(records, OrphanPolicy::PromoteToRoot).unwrap();

        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(count_nodes(&tree), 20_000);
    }

    #[test]
    fn test_depth_after_move() {
        let records = vec![
            rec(1, 0, "A"),
            rec(2, 1, "B"),
            rec(3, 2, "C"),
            rec(4, 0, "D"),
            rec(5, 4, "E"),
        ];

        assert_eq!(depth_after_move(&records, None, ROOT_PARENT_ID), 1);
        assert_eq!(depth_after_move(&records, None, 3), 4);
        // D (with child E) moved under C: C is level 3, the subtree adds 2.
        assert_eq!(depth_after_move(&records, Some(4), 3), 5);

        let deepest = MAX_TREE_DEPTH as DbId;
        assert_eq!(depth_after_move(&chain(deepest), None, deepest), MAX_TREE_DEPTH + 1);
    }

    #[test]
    fn test_depth_check_terminates_on_existing_loop() {
        let records = vec![rec(1, 2, "A"), rec(2, 1, "B")];
        assert!(depth_after_move(&records, None, 1) <= records.len() + 2);
        assert_eq!(depth_after_move(&records, Some(1), ROOT_PARENT_ID), 2);
    }

    #[test]
    fn test_reparent_check_terminates_on_existing_loop() {
        let records = vec![rec(1, 2, "A"), rec(2, 1, "B"), rec(3, 0, "C")];
        assert!(!reparent_creates_cycle(&records, 3, 1));
    }
}
