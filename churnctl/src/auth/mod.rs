//! Authentication: Argon2id password hashing, JWT session cookies, and the
//! `CurrentUser` extractor.

pub mod current_user;
pub mod password;
pub mod session;

use crate::api::models::users::{CurrentUser, Role};
use crate::errors::{Error, Result};
use crate::types::{Operation, Permission, Resource};

/// Reject non-admin callers.
pub fn require_admin(user: &CurrentUser) -> Result<()> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Users, Operation::ReadAll),
            action: Operation::ReadAll,
            resource: "admin endpoints".to_string(),
        })
    }
}

/// Owner-or-admin gate for a record belonging to `owner_id`.
pub fn require_owner_or_admin(user: &CurrentUser, owner_id: crate::types::UserId) -> Result<()> {
    if user.id == owner_id || user.role == Role::Admin {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Predictions, Operation::ReadOwn),
            action: Operation::ReadOwn,
            resource: "prediction records".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "u".to_string(),
            email: "u@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn admin_gate() {
        assert!(require_admin(&user(Role::Admin)).is_ok());
        let err = require_admin(&user(Role::User)).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn owner_or_admin_gate() {
        let owner = user(Role::User);
        assert!(require_owner_or_admin(&owner, owner.id).is_ok());
        assert!(require_owner_or_admin(&user(Role::Admin), owner.id).is_ok());
        assert!(require_owner_or_admin(&user(Role::User), owner.id).is_err());
    }
}
