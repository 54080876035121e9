//! Follow graph service
//!
//! A single toggle action both follows and unfollows. The insert is one
//! conditional statement on the unique pair, so two concurrent toggles can
//! never create a duplicate edge.

use std::sync::Arc;

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::{FollowToggle, User};
use crate::services::notification::{log_dispatch_failure, NotificationService};

#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FollowService {
    follow_repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifier: Arc<NotificationService>,
    allow_self_follow: bool,
}

impl FollowService {
    pub fn new(
        follow_repo: Arc<dyn FollowRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifier: Arc<NotificationService>,
        allow_self_follow: bool,
    ) -> Self {
        Self {
            follow_repo,
            user_repo,
            notifier,
            allow_self_follow,
        }
    }

    /// Follow `target_username` if not yet followed, otherwise unfollow.
    pub async fn toggle(
        &self,
        actor: &User,
        target_username: &str,
    ) -> Result<FollowToggle, FollowServiceError> {
        let target = self
            .user_repo
            .get_by_username(target_username)
            .await?
            .ok_or_else(|| FollowServiceError::NotFound(target_username.to_string()))?;

        if target.id == actor.id && !self.allow_self_follow {
            return Err(FollowServiceError::ValidationError(
                "You cannot follow yourself".to_string(),
            ));
        }

        match self.follow_repo.insert_if_absent(actor.id, target.id).await? {
            Some(edge) => {
                tracing::info!("{} followed {}", actor.username, target.username);
                log_dispatch_failure("follow", self.notifier.notify_follow(actor, &target).await);
                Ok(FollowToggle::Created(edge))
            }
            None => {
                self.follow_repo.delete(actor.id, target.id).await?;
                tracing::info!("{} unfollowed {}", actor.username, target.username);
                Ok(FollowToggle::Removed)
            }
        }
    }

    /// Ids of the users following `user`
    pub async fn followers(&self, user: &User) -> Result<Vec<i64>, FollowServiceError> {
        Ok(self.follow_repo.follower_ids(user.id).await?)
    }

    /// Ids of the users `user` follows
    pub async fn following(&self, user: &User) -> Result<Vec<i64>, FollowServiceError> {
        Ok(self.follow_repo.following_ids(user.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxFollowRepository, SqlxNotificationRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::services::notification::testing::RecordingMailer;

    struct Fixture {
        pool: DynDatabasePool,
        users: Arc<dyn UserRepository>,
        notifier: Arc<NotificationService>,
        mailer: Arc<RecordingMailer>,
    }

    impl Fixture {
        async fn new(mailer: RecordingMailer) -> Self {
            let pool = setup_pool().await;
            let users = SqlxUserRepository::boxed(pool.clone());
            let mailer = Arc::new(mailer);
            let notifier = Arc::new(NotificationService::new(
                SqlxNotificationRepository::boxed(pool.clone()),
                SqlxFollowRepository::boxed(pool.clone()),
                users.clone(),
                mailer.clone(),
            ));
            Self {
                pool,
                users,
                notifier,
                mailer,
            }
        }

        fn service(&self, allow_self_follow: bool) -> FollowService {
            FollowService::new(
                SqlxFollowRepository::boxed(self.pool.clone()),
                self.users.clone(),
                self.notifier.clone(),
                allow_self_follow,
            )
        }

        async fn user(&self, name: &str) -> User {
            let id = insert_user(&self.pool, name, "TENANT").await;
            self.users.get_by_id(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_toggle_creates_then_removes() {
        let f = Fixture::new(RecordingMailer::default()).await;
        let service = f.service(true);
        let ann = f.user("ann").await;
        let bob = f.user("bob").await;

        let created = service.toggle(&ann, "bob").await.unwrap();
        match created {
            FollowToggle::Created(edge) => {
                assert_eq!(edge.follower_id, ann.id);
                assert_eq!(edge.followee_id, bob.id);
            }
            FollowToggle::Removed => panic!("expected a new edge"),
        }
        assert_eq!(service.followers(&bob).await.unwrap(), vec![ann.id]);
        assert_eq!(service.following(&ann).await.unwrap(), vec![bob.id]);
        assert_eq!(f.notifier.list_for(&bob).await.unwrap().len(), 1);
        assert_eq!(f.mailer.calls().len(), 1);

        let removed = service.toggle(&ann, "bob").await.unwrap();
        assert!(matches!(removed, FollowToggle::Removed));
        assert!(service.followers(&bob).await.unwrap().is_empty());
        // Unfollowing sends nothing.
        assert_eq!(f.notifier.list_for(&bob).await.unwrap().len(), 1);
        assert_eq!(f.mailer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let f = Fixture::new(RecordingMailer::default()).await;
        let ann = f.user("ann").await;

        assert!(matches!(
            f.service(true).toggle(&ann, "nobody").await,
            Err(FollowServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_self_follow_switch() {
        let f = Fixture::new(RecordingMailer::default()).await;
        let ann = f.user("ann").await;

        assert!(matches!(
            f.service(false).toggle(&ann, "ann").await,
            Err(FollowServiceError::ValidationError(_))
        ));
        assert!(matches!(
            f.service(true).toggle(&ann, "ann").await,
            Ok(FollowToggle::Created(_))
        ));
    }

    #[tokio::test]
    async fn test_mail_failure_keeps_edge() {
        let f = Fixture::new(RecordingMailer::failing()).await;
        let service = f.service(true);
        let ann = f.user("ann").await;
        let bob = f.user("bob").await;

        assert!(matches!(
            service.toggle(&ann, "bob").await,
            Ok(FollowToggle::Created(_))
        ));
        assert_eq!(service.followers(&bob).await.unwrap(), vec![ann.id]);
        assert_eq!(f.notifier.list_for(&bob).await.unwrap().len(), 1);
    }
}
