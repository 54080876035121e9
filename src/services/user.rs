//! User service
//!
//! Registration, login/logout, session resolution and profile management.

use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    CreateUserInput, ImageUpload, ListParams, PagedResult, Session, UpdateProfileInput, User,
};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::storage::{delete_all, ObjectStorage, StorageError};

const AVATAR_FOLDER: &str = "avatars";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.@+-]{3,150}$").expect("valid username regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{6,14}$").expect("valid phone regex"));

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("User not found")]
    NotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<StorageError> for UserServiceError {
    fn from(e: StorageError) -> Self {
        if e.is_rejected_upload() {
            UserServiceError::ValidationError(e.to_string())
        } else {
            UserServiceError::InternalError(e.into())
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    storage: Arc<dyn ObjectStorage>,
    session_ttl: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        storage: Arc<dyn ObjectStorage>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            storage,
            session_ttl: Duration::days(session_days.max(1)),
        }
    }

    fn validate_register_input(input: &CreateUserInput) -> Result<(), UserServiceError> {
        if !USERNAME_RE.is_match(&input.username) {
            return Err(UserServiceError::ValidationError(
                "Username must be 3-150 characters of letters, digits and @.+-_".to_string(),
            ));
        }
        if input.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        validate_email(&input.email)?;
        if let Some(phone) = &input.phone {
            validate_phone(phone)?;
        }
        Ok(())
    }

    /// Register a new account.
    ///
    /// Hosts and tenants must upload an avatar; admins may register without
    /// one.
    pub async fn register(
        &self,
        input: CreateUserInput,
        avatar: Option<ImageUpload>,
    ) -> Result<User, UserServiceError> {
        Self::validate_register_input(&input)?;

        if input.role.requires_avatar() && avatar.is_none() {
            return Err(UserServiceError::ValidationError("Avatar user not found".to_string()));
        }

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::Conflict(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let avatar_url = match &avatar {
            Some(upload) => Some(self.storage.put(AVATAR_FOLDER, upload).await?),
            None => None,
        };

        let now = Utc::now();
        let user = User {
            id: 0,
            username: input.username,
            email: input.email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            avatar: avatar_url.clone(),
            role: input.role,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!("Registered {} as {}", created.username, created.role);
                Ok(created)
            }
            Err(e) => {
                delete_all(&self.storage, &avatar_url.into_iter().collect::<Vec<_>>()).await;
                Err(UserServiceError::InternalError(e.context("Failed to create user")))
            }
        }
    }

    /// Verify credentials, stamp `last_login` and open a session
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let mut user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to load user")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            return Err(invalid());
        }

        let now = Utc::now();
        self.user_repo
            .touch_last_login(user.id, now)
            .await
            .context("Failed to record login")?;
        user.last_login = Some(now);

        let session = Session::issue(user.id, self.session_ttl);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::debug!("{} logged in", user.username);
        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user
    pub async fn validate_session(&self, token: &str) -> Result<User, UserServiceError> {
        let session = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to load session")?
            .ok_or(UserServiceError::SessionNotFound)?;

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Err(UserServiceError::SessionExpired);
        }

        self.user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to load session user")?
            .ok_or(UserServiceError::SessionNotFound)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_username(username)
            .await
            .context("Failed to load user")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn get_many(&self, ids: &[i64]) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.get_many(ids).await?)
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self.user_repo.list(params).await?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Update the caller's own profile, optionally replacing the avatar
    pub async fn update_profile(
        &self,
        user: &User,
        input: UpdateProfileInput,
        avatar: Option<ImageUpload>,
    ) -> Result<User, UserServiceError> {
        let mut updated = user.clone();
        if let Some(first_name) = input.first_name {
            updated.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            updated.last_name = last_name;
        }
        if let Some(email) = input.email {
            validate_email(&email)?;
            updated.email = email;
        }
        if let Some(phone) = input.phone {
            if phone.is_empty() {
                updated.phone = None;
            } else {
                validate_phone(&phone)?;
                updated.phone = Some(phone);
            }
        }

        let previous_avatar = user.avatar.clone();
        if let Some(upload) = &avatar {
            updated.avatar = Some(self.storage.put(AVATAR_FOLDER, upload).await?);
        }

        match self.user_repo.update_profile(&updated).await {
            Ok(saved) => {
                if avatar.is_some() {
                    delete_all(&self.storage, &previous_avatar.into_iter().collect::<Vec<_>>()).await;
                }
                Ok(saved)
            }
            Err(e) => {
                if avatar.is_some() {
                    delete_all(&self.storage, &updated.avatar.into_iter().collect::<Vec<_>>()).await;
                }
                Err(UserServiceError::InternalError(e))
            }
        }
    }

    /// Delete the caller's account and everything it owns
    pub async fn delete_account(&self, user: &User) -> Result<(), UserServiceError> {
        self.user_repo
            .delete(user.id)
            .await
            .context("Failed to delete user")?;
        delete_all(&self.storage, &user.avatar.clone().into_iter().collect::<Vec<_>>()).await;
        tracing::info!("Deleted account {}", user.username);
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Ok(());
    }
    email
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|_| UserServiceError::ValidationError(format!("Invalid email: {}", email)))
}

fn validate_phone(phone: &str) -> Result<(), UserServiceError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError(
            "Phone must be 6-14 digits with an optional leading +".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::models::UserRole;
    use crate::services::storage::testing::{png, MemoryStorage};

    async fn setup() -> (UserService, Arc<MemoryStorage>) {
        let pool = setup_pool().await;
        let storage = Arc::new(MemoryStorage::default());
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            storage.clone(),
            7,
        );
        (service, storage)
    }

    fn input(username: &str, role: UserRole) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "secret123".to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            phone: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_register_requires_avatar_except_admin() {
        let (service, storage) = setup().await;

        let err = service.register(input("host", UserRole::Host), None).await.unwrap_err();
        assert!(matches!(err, UserServiceError::ValidationError(ref m) if m == "Avatar user not found"));
        assert!(storage.stored.lock().unwrap().is_empty());

        let admin = service.register(input("admin", UserRole::Admin), None).await.unwrap();
        assert!(admin.avatar.is_none());

        let tenant = service
            .register(input("tenant", UserRole::Tenant), Some(png("me.png")))
            .await
            .unwrap();
        assert!(tenant.avatar.as_deref().unwrap().starts_with("/uploads/avatars/"));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let (service, _) = setup().await;
        service.register(input("admin", UserRole::Admin), None).await.unwrap();

        assert!(matches!(
            service.register(input("admin", UserRole::Admin), None).await,
            Err(UserServiceError::Conflict(_))
        ));

        let mut short = input("ab", UserRole::Admin);
        assert!(matches!(
            service.register(short.clone(), None).await,
            Err(UserServiceError::ValidationError(_))
        ));

        short.username = "valid_name".to_string();
        short.password = "123".to_string();
        assert!(matches!(
            service.register(short, None).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn test_contact_validation() {
        assert!(validate_email("").is_ok());
        assert!(validate_email("ann.smith@example.com").is_ok());
        assert!(validate_email("ann smith@example.com").is_err());
        assert!(validate_email("no-at-sign").is_err());

        assert!(validate_phone("+84912345678").is_ok());
        assert!(validate_phone("0901234567").is_ok());
        assert!(validate_phone("+849123456789012").is_err());
        assert!(validate_phone("84+912345").is_err());
    }

    #[tokio::test]
    async fn test_register_accepts_international_phone() {
        let (service, _) = setup().await;

        let mut admin = input("admin", UserRole::Admin);
        admin.phone = Some("+84912345678".to_string());
        let user = service.register(admin, None).await.unwrap();
        assert_eq!(user.phone.as_deref(), Some("+84912345678"));

        let mut spaced = input("spaced", UserRole::Admin);
        spaced.email = "ann smith@example.com".to_string();
        assert!(matches!(
            service.register(spaced, None).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_login_session_round_trip() {
        let (service, _) = setup().await;
        service.register(input("admin", UserRole::Admin), None).await.unwrap();

        assert!(matches!(
            service.login("admin", "wrong-password").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login("ghost", "secret123").await,
            Err(UserServiceError::AuthenticationError(_))
        ));

        let (user, session) = service.login("admin", "secret123").await.unwrap();
        assert!(user.last_login.is_some());

        let resolved = service.validate_session(&session.id).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(resolved.last_login.is_some());

        service.logout(&session.id).await.unwrap();
        assert!(matches!(
            service.validate_session(&session.id).await,
            Err(UserServiceError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_profile_replaces_avatar() {
        let (service, storage) = setup().await;
        let user = service
            .register(input("tenant", UserRole::Tenant), Some(png("old.png")))
            .await
            .unwrap();
        let old_avatar = user.avatar.clone().unwrap();

        let changes = UpdateProfileInput {
            first_name: Some("New".to_string()),
            phone: Some("0901234567".to_string()),
            ..Default::default()
        };
        let updated = service
            .update_profile(&user, changes, Some(png("new.png")))
            .await
            .unwrap();

        assert_eq!(updated.first_name, "New");
        assert_eq!(updated.last_name, "Last");
        assert_ne!(updated.avatar.as_deref(), Some(old_avatar.as_str()));
        assert_eq!(*storage.deleted.lock().unwrap(), vec![old_avatar]);

        let bad_phone = UpdateProfileInput {
            phone: Some("call me".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(&updated, bad_phone, None).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_account() {
        let (service, _) = setup().await;
        let user = service.register(input("admin", UserRole::Admin), None).await.unwrap();

        service.delete_account(&user).await.unwrap();
        assert!(matches!(
            service.get_by_username("admin").await,
            Err(UserServiceError::NotFound)
        ));
    }
}
