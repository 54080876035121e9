//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
///
/// Every user may post and comment; only hosts list accommodations and only
/// admins moderate content and read reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Stored avatar URL; see [`User::avatar_url`] for the fallback
    pub avatar: Option<String>,
    pub role: UserRole,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_host(&self) -> bool {
        self.role == UserRole::Host
    }

    /// Owners manage their own content, admins manage everything.
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// Uploaded avatar, or a gravatar derived from the email address
    pub fn avatar_url(&self) -> String {
        avatar_or_gravatar(self.avatar.as_deref(), &self.email)
    }
}

pub fn avatar_or_gravatar(avatar: Option<&str>, email: &str) -> String {
    match avatar {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            let digest = md5::compute(email.trim().to_lowercase().as_bytes());
            format!("https://www.gravatar.com/avatar/{:x}?d=identicon", digest)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    #[default]
    Tenant,
    Admin,
    Host,
}

impl UserRole {
    /// Whether registering with this role requires an avatar upload
    pub fn requires_avatar(&self) -> bool {
        !matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Tenant => write!(f, "TENANT"),
            UserRole::Admin => write!(f, "ADMIN"),
            UserRole::Host => write!(f, "HOST"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TENANT" => Ok(UserRole::Tenant),
            "ADMIN" => Ok(UserRole::Admin),
            "HOST" => Ok(UserRole::Host),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Registration data before password hashing
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample_user(id: i64, username: &str, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        phone: None,
        avatar: None,
        role,
        last_login: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        for role in [UserRole::Tenant, UserRole::Admin, UserRole::Host] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("host".parse::<UserRole>().unwrap(), UserRole::Host);
        assert!("landlord".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&UserRole::Host).unwrap(), "\"HOST\"");
    }

    #[test]
    fn test_only_admin_skips_avatar() {
        assert!(!UserRole::Admin.requires_avatar());
        assert!(UserRole::Host.requires_avatar());
        assert!(UserRole::Tenant.requires_avatar());
    }

    #[test]
    fn test_can_manage() {
        let admin = sample_user(1, "admin", UserRole::Admin);
        let host = sample_user(2, "host", UserRole::Host);

        assert!(admin.can_manage(2));
        assert!(host.can_manage(2));
        assert!(!host.can_manage(1));
    }

    #[test]
    fn test_avatar_falls_back_to_gravatar() {
        let mut user = sample_user(1, "bob", UserRole::Tenant);
        assert!(user.avatar_url().starts_with("https://www.gravatar.com/avatar/"));

        user.avatar = Some("/uploads/avatars/bob.png".to_string());
        assert_eq!(user.avatar_url(), "/uploads/avatars/bob.png");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let mut user = sample_user(1, "bob", UserRole::Tenant);
        user.password_hash = "secret".to_string();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("password_hash"));
    }
}
