//! Permission-code access control extractors.
//!
//! [`RequirePermission`] wraps [`AuthUser`] and rejects requests whose
//! grants do not include the code named by its marker type. Use these in
//! route handlers to enforce authorization at the type level.

use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dataperm_core::error::CoreError;
use dataperm_core::permissions::{
    permission_code, AuthorizationLookup, CrudAction, DATA_PERMISSION_RESOURCE,
};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Names the permission code a [`RequirePermission`] extractor checks.
pub trait PermissionCode {
    const RESOURCE: &'static str;
    const ACTION: CrudAction;

    fn code() -> String {
        permission_code(Self::RESOURCE, Self::ACTION)
    }
}

macro_rules! data_permission_code {
    ($name:ident, $action:expr) => {
        pub struct $name;

        impl PermissionCode for $name {
            const RESOURCE: &'static str = DATA_PERMISSION_RESOURCE;
            const ACTION: CrudAction = $action;
        }
    };
}

data_permission_code!(DataPermissionList, CrudAction::List);
data_permission_code!(DataPermissionCreate, CrudAction::Create);
data_permission_code!(DataPermissionEdit, CrudAction::Edit);
data_permission_code!(DataPermissionDelete, CrudAction::Delete);
data_permission_code!(DataPermissionView, CrudAction::View);

/// Requires the permission code of `P`. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn list(RequirePermission(user, _): RequirePermission<DataPermissionList>) { ... }
/// ```
pub struct RequirePermission<P>(pub AuthUser, pub PhantomData<P>);

impl<P> FromRequestParts<AppState> for RequirePermission<P>
where
    P: PermissionCode + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let code = P::code();
        if !user.has_auth(&code) {
            tracing::debug!(user_id = user.user_id, %code, "Permission denied");
            return Err(AppError::Core(CoreError::Forbidden(format!(
                "Permission required: {code}"
            ))));
        }
        Ok(RequirePermission(user, PhantomData))
    }
}

/// Requires any authenticated user.
///
/// Functionally equivalent to [`AuthUser`] but named explicitly so route
/// handlers document that authentication is the only requirement.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequireAuth(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_codes() {
        assert_eq!(DataPermissionList::code(), "system:data_permission:list");
        assert_eq!(DataPermissionCreate::code(), "system:data_permission:create");
        assert_eq!(DataPermissionEdit::code(), "system:data_permission:edit");
        assert_eq!(DataPermissionDelete::code(), "system:data_permission:delete");
        assert_eq!(DataPermissionView::code(), "system:data_permission:view");
    }
}
