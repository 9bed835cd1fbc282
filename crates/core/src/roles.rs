//! Role names carried in access-token claims.

/// Holders of this role pass every permission-code check.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operator";
