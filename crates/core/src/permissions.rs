//! Button-level permission codes and the per-activation snapshot.
//!
//! Permission codes follow the `system:<resource>:<action>` convention. A
//! screen resolves the five capabilities once when it is activated; the
//! resulting [`PermissionSnapshot`] is immutable and is not re-evaluated.

use std::collections::HashSet;

use serde::Serialize;

use crate::roles::ROLE_ADMIN;

/// Resource segment used by the data-permission screen.
pub const DATA_PERMISSION_RESOURCE: &str = "system:data_permission";

/// The five gated actions of a CRUD screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrudAction {
    List,
    Create,
    Delete,
    Edit,
    View,
}

impl CrudAction {
    pub const ALL: [CrudAction; 5] = [
        CrudAction::List,
        CrudAction::Create,
        CrudAction::Delete,
        CrudAction::Edit,
        CrudAction::View,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CrudAction::List => "list",
            CrudAction::Create => "create",
            CrudAction::Delete => "delete",
            CrudAction::Edit => "edit",
            CrudAction::View => "view",
        }
    }
}

/// Build the permission code for an action on a resource,
/// e.g. `system:data_permission:list`.
pub fn permission_code(resource: &str, action: CrudAction) -> String {
    format!("{resource}:{}", action.as_str())
}

/// Answers "does the current principal hold this permission code?".
pub trait AuthorizationLookup {
    fn has_auth(&self, code: &str) -> bool;
}

/// A fixed set of granted codes, optionally backed by an all-access role.
#[derive(Debug, Clone, Default)]
pub struct GrantedPermissions {
    codes: HashSet<String>,
    superuser: bool,
}

impl GrantedPermissions {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            superuser: false,
        }
    }

    /// Grants built from a role name and the codes attached to it.
    /// The admin role implies every code.
    pub fn for_role<I, S>(role: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            superuser: role == ROLE_ADMIN,
            ..Self::new(codes)
        }
    }
}

impl AuthorizationLookup for GrantedPermissions {
    fn has_auth(&self, code: &str) -> bool {
        self.superuser || self.codes.contains(code)
    }
}

/// Capability booleans gating the screen's actions.
///
/// `detail` is resolved from the `view` code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSnapshot {
    pub list: bool,
    pub create: bool,
    pub delete: bool,
    pub edit: bool,
    pub detail: bool,
}

impl PermissionSnapshot {
    /// Query the lookup once per action for `resource`.
    pub fn resolve(lookup: &dyn AuthorizationLookup, resource: &str) -> Self {
        let check = |action| lookup.has_auth(&permission_code(resource, action));
        Self {
            list: check(CrudAction::List),
            create: check(CrudAction::Create),
            delete: check(CrudAction::Delete),
            edit: check(CrudAction::Edit),
            detail: check(CrudAction::View),
        }
    }

    pub fn allows(&self, action: CrudAction) -> bool {
        match action {
            CrudAction::List => self.list,
            CrudAction::Create => self.create,
            CrudAction::Delete => self.delete,
            CrudAction::Edit => self.edit,
            CrudAction::View => self.detail,
        }
    }
}
