//! Caller identity and role checks.
//!
//! Credentials are verified upstream; this module only trusts the supplied
//! `(user_id, roles)` pair and enforces ownership and staff-only operations.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role granted to a caller by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Officer,
    Admin,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "officer" => Ok(Self::Officer),
            "admin" => Ok(Self::Admin),
            other => Err(Error::invalid("roles", format!("unknown role `{other}`"))),
        }
    }
}

/// Verified identity of whoever invokes an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub roles: Vec<Role>,
}

impl Caller {
    /// Builds a caller from an identity and its roles.
    pub fn new(user_id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// A student caller.
    pub fn student(user_id: impl Into<String>) -> Self {
        Self::new(user_id, [Role::Student])
    }

    /// A scholarship officer.
    pub fn officer(user_id: impl Into<String>) -> Self {
        Self::new(user_id, [Role::Officer])
    }

    /// Identity used for configuration seeding at startup.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system", [Role::Admin])
    }

    /// Whether the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Admins and officers are staff.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::Officer)
    }

    /// Fails with `Forbidden` unless the caller is staff.
    pub fn require_staff(&self) -> Result<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(Error::forbidden("This action requires an officer or admin role"))
        }
    }

    /// Fails with `Forbidden` unless the caller is the owning student.
    pub fn require_owner(&self, student_id: &str) -> Result<()> {
        if self.user_id == student_id {
            Ok(())
        } else {
            Err(Error::forbidden("You do not have access to this application"))
        }
    }

    /// Owner or staff may read an application.
    pub fn require_owner_or_staff(&self, student_id: &str) -> Result<()> {
        if self.is_staff() {
            return Ok(());
        }
        self.require_owner(student_id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" officer ".parse::<Role>().unwrap(), Role::Officer);
        let err = "dean".parse::<Role>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_staff_checks() {
        assert!(Caller::officer("o1").require_staff().is_ok());
        assert!(Caller::system().require_staff().is_ok());

        let err = Caller::student("s1").require_staff().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_owner_checks() {
        let student = Caller::student("s1");
        assert!(student.require_owner("s1").is_ok());
        assert_eq!(
            student.require_owner("s2").unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert!(Caller::officer("o1").require_owner_or_staff("s2").is_ok());
    }
}
