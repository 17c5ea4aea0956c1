//! Who is acting. Authentication lives elsewhere; the role is only used to
//! pick routes and gate views.

use crate::core::directory::Directory;
use crate::errors::{AppError, AppResult};
use crate::models::ids::UserId;
use crate::models::role::{CurrentUser, Route};
use std::sync::Arc;

pub trait IdentityProvider {
    fn current_user(&self) -> AppResult<CurrentUser>;

    /// The current user, if `route` is open to their role.
    fn authorize(&self, route: Route) -> AppResult<CurrentUser> {
        let user = self.current_user()?;
        if !route.permits(user.role) {
            return Err(AppError::Forbidden(format!(
                "{} ({}) cannot open {}",
                user.id,
                user.role,
                route.path()
            )));
        }
        Ok(user)
    }
}

/// Resolves a user id (the CLI's `--as`) against the users table.
pub struct StoreIdentity {
    directory: Arc<Directory>,
    user_id: Option<UserId>,
}

impl StoreIdentity {
    pub fn new(directory: Arc<Directory>, user_id: Option<UserId>) -> Self {
        Self { directory, user_id }
    }
}

impl IdentityProvider for StoreIdentity {
    fn current_user(&self) -> AppResult<CurrentUser> {
        let id = self
            .user_id
            .as_ref()
            .ok_or_else(|| AppError::InvalidInput("no acting user, pass --as <user_id>".into()))?;
        let user = self.directory.user(id)?;
        Ok(CurrentUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// Fixed identity; embedding callers that authenticate on their own.
pub struct StaticIdentity(pub CurrentUser);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> AppResult<CurrentUser> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;

    fn as_role(role: Role) -> StaticIdentity {
        StaticIdentity(CurrentUser {
            id: UserId::from("u1"),
            role,
        })
    }

    #[test]
    fn leads_open_projects_assemblers_do_not() {
        assert!(as_role(Role::ProjectLead).authorize(Route::Projects).is_ok());
        let err = as_role(Role::Assembler).authorize(Route::Projects).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn work_history_is_open_to_both() {
        for role in [Role::ProjectLead, Role::Assembler] {
            assert!(as_role(role).authorize(Route::WorkHistory).is_ok());
        }
    }
}
