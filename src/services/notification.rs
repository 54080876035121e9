//! Notification dispatcher
//!
//! Turns social events into notification rows and outbound email:
//!
//! - follow: one notification and one email to the followed user
//! - new content: one notification per follower of the creator, and a single
//!   email addressed to all of them
//! - comment: one notification to the content owner, unless the owner is
//!   the commenter
//!
//! Callers commit their primary write first and only then dispatch. A
//! dispatch error is reported back but must never undo the primary action;
//! see [`log_dispatch_failure`].

use std::sync::Arc;

use crate::db::repositories::{FollowRepository, NotificationRepository, UserRepository};
use crate::models::{ContentKind, ContentRef, NewNotification, Notification, User};
use crate::services::email::Mailer;

#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("Notification not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Notice text for a follow event
pub fn follow_notice(actor: &str, target: &str) -> String {
    format!("{} started following {}", actor, target)
}

/// Notice text sent to followers when `creator` publishes content
pub fn new_content_notice(creator: &str, kind: ContentKind) -> String {
    match kind {
        ContentKind::Post => format!("{} added new post", creator),
        ContentKind::Accommodation => format!("{} added new accommodation", creator),
    }
}

/// Notice text sent to a content owner when someone comments
pub fn comment_notice(commenter: &str, kind: ContentKind) -> String {
    match kind {
        ContentKind::Post => format!("{} commented your post", commenter),
        ContentKind::Accommodation => format!("{} commented your post accommodation", commenter),
    }
}

/// Log a failed dispatch; the triggering action has already been committed.
pub fn log_dispatch_failure(event: &str, result: Result<(), NotificationServiceError>) {
    if let Err(e) = result {
        tracing::warn!("Notification dispatch for {} failed: {}", event, e);
    }
}

pub struct NotificationService {
    notification_repo: Arc<dyn NotificationRepository>,
    follow_repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(
        notification_repo: Arc<dyn NotificationRepository>,
        follow_repo: Arc<dyn FollowRepository>,
        user_repo: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            notification_repo,
            follow_repo,
            user_repo,
            mailer,
        }
    }

    /// Email failures are logged; the notification rows stay written.
    async fn email(&self, notice: &str, recipients: &[String]) {
        if recipients.is_empty() {
            return;
        }
        if let Err(e) = self.mailer.send(notice, notice, recipients).await {
            tracing::warn!(count = recipients.len(), "Failed to email notification: {:#}", e);
        }
    }

    /// `actor` started following `target`
    pub async fn notify_follow(&self, actor: &User, target: &User) -> Result<(), NotificationServiceError> {
        let notice = follow_notice(&actor.username, &target.username);
        self.notification_repo
            .create_many(&[NewNotification {
                notice: notice.clone(),
                sender_id: actor.id,
                recipient_id: target.id,
            }])
            .await?;

        let recipients: Vec<String> = Some(target.email.clone())
            .filter(|email| !email.is_empty())
            .into_iter()
            .collect();
        self.email(&notice, &recipients).await;
        Ok(())
    }

    /// Fan a new post or accommodation out to the creator's followers.
    ///
    /// Returns the number of notifications written. The creator is never
    /// notified about their own content, even with a self-follow edge.
    pub async fn notify_new_content(
        &self,
        creator: &User,
        kind: ContentKind,
    ) -> Result<usize, NotificationServiceError> {
        let follower_ids: Vec<i64> = self
            .follow_repo
            .follower_ids(creator.id)
            .await?
            .into_iter()
            .filter(|id| *id != creator.id)
            .collect();
        if follower_ids.is_empty() {
            tracing::debug!("{} has no followers to notify", creator.username);
            return Ok(0);
        }

        let followers = self.user_repo.get_many(&follower_ids).await?;
        let notice = new_content_notice(&creator.username, kind);

        let rows: Vec<NewNotification> = followers
            .iter()
            .map(|follower| NewNotification {
                notice: notice.clone(),
                sender_id: creator.id,
                recipient_id: follower.id,
            })
            .collect();
        let written = self.notification_repo.create_many(&rows).await?;

        let recipients: Vec<String> = followers
            .iter()
            .map(|follower| follower.email.clone())
            .filter(|email| !email.is_empty())
            .collect();
        self.email(&notice, &recipients).await;

        tracing::info!("Notified {} follower(s) of new {} by {}", written, kind, creator.username);
        Ok(written)
    }

    /// Notify the owner of `target` that `commenter` commented on it.
    ///
    /// Returns whether a notification was written.
    pub async fn notify_comment(
        &self,
        commenter: &User,
        target: ContentRef,
    ) -> Result<bool, NotificationServiceError> {
        if commenter.id == target.owner_id {
            return Ok(false);
        }
        self.notification_repo
            .create_many(&[NewNotification {
                notice: comment_notice(&commenter.username, target.kind),
                sender_id: commenter.id,
                recipient_id: target.owner_id,
            }])
            .await?;
        Ok(true)
    }

    /// The user's notifications, newest first
    pub async fn list_for(&self, user: &User) -> Result<Vec<Notification>, NotificationServiceError> {
        Ok(self.notification_repo.list_for_recipient(user.id).await?)
    }

    pub async fn unread_count(&self, user: &User) -> Result<i64, NotificationServiceError> {
        Ok(self.notification_repo.count_unread(user.id).await?)
    }

    /// Mark one of the user's notifications as read
    pub async fn mark_read(&self, user: &User, id: i64) -> Result<Notification, NotificationServiceError> {
        let mut notification = self
            .notification_repo
            .get_by_id(id)
            .await?
            .ok_or(NotificationServiceError::NotFound)?;

        if notification.recipient_id != user.id {
            return Err(NotificationServiceError::Forbidden(
                "Notification belongs to another user".to_string(),
            ));
        }

        if !notification.is_read {
            self.notification_repo.mark_read(id).await?;
            notification.is_read = true;
        }
        Ok(notification)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxFollowRepository, SqlxNotificationRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;

    struct Fixture {
        pool: DynDatabasePool,
        service: NotificationService,
        mailer: Arc<RecordingMailer>,
        users: Arc<dyn UserRepository>,
        follows: Arc<dyn FollowRepository>,
    }

    async fn setup_with(mailer: RecordingMailer) -> Fixture {
        let pool = setup_pool().await;
        let mailer = Arc::new(mailer);
        let users = SqlxUserRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());
        let service = NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            follows.clone(),
            users.clone(),
            mailer.clone(),
        );
        Fixture {
            pool,
            service,
            mailer,
            users,
            follows,
        }
    }

    async fn setup() -> Fixture {
        setup_with(RecordingMailer::default()).await
    }

    async fn user(f: &Fixture, name: &str, role: &str) -> User {
        let id = insert_user(&f.pool, name, role).await;
        f.users.get_by_id(id).await.unwrap().unwrap()
    }

    #[test]
    fn test_notice_texts() {
        assert_eq!(follow_notice("ann", "bob"), "ann started following bob");
        assert_eq!(new_content_notice("ann", ContentKind::Post), "ann added new post");
        assert_eq!(
            new_content_notice("ann", ContentKind::Accommodation),
            "ann added new accommodation"
        );
        assert_eq!(comment_notice("ann", ContentKind::Post), "ann commented your post");
        assert_eq!(
            comment_notice("ann", ContentKind::Accommodation),
            "ann commented your post accommodation"
        );
    }

    #[tokio::test]
    async fn test_follow_notifies_target_and_emails_once() {
        let f = setup().await;
        let ann = user(&f, "ann", "TENANT").await;
        let bob = user(&f, "bob", "HOST").await;

        f.service.notify_follow(&ann, &bob).await.unwrap();

        let inbox = f.service.list_for(&bob).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notice, "ann started following bob");
        assert_eq!(inbox[0].sender_id, ann.id);
        assert_eq!(
            f.mailer.calls(),
            vec![("ann started following bob".to_string(), vec![bob.email.clone()])]
        );
    }

    #[tokio::test]
    async fn test_new_content_fans_out_to_every_follower() {
        let f = setup().await;
        let host = user(&f, "host", "HOST").await;
        let mut followers = Vec::new();
        for name in ["t1", "t2", "t3"] {
            let follower = user(&f, name, "TENANT").await;
            f.follows.insert_if_absent(follower.id, host.id).await.unwrap();
            followers.push(follower);
        }

        let written = f
            .service
            .notify_new_content(&host, ContentKind::Accommodation)
            .await
            .unwrap();
        assert_eq!(written, 3);

        for follower in &followers {
            let inbox = f.service.list_for(follower).await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].notice, "host added new accommodation");
        }

        let calls = f.mailer.calls();
        assert_eq!(calls.len(), 1);
        let mut recipients = calls[0].1.clone();
        recipients.sort();
        assert_eq!(recipients, vec!["t1@example.com", "t2@example.com", "t3@example.com"]);
    }

    #[tokio::test]
    async fn test_new_content_without_followers_sends_nothing() {
        let f = setup().await;
        let host = user(&f, "host", "HOST").await;

        let written = f.service.notify_new_content(&host, ContentKind::Post).await.unwrap();

        assert_eq!(written, 0);
        assert!(f.mailer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_new_content_skips_self_follow() {
        let f = setup().await;
        let host = user(&f, "host", "HOST").await;
        f.follows.insert_if_absent(host.id, host.id).await.unwrap();

        let written = f.service.notify_new_content(&host, ContentKind::Post).await.unwrap();

        assert_eq!(written, 0);
        assert!(f.service.list_for(&host).await.unwrap().is_empty());
        assert!(f.mailer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_keeps_notifications() {
        let f = setup_with(RecordingMailer::failing()).await;
        let ann = user(&f, "ann", "TENANT").await;
        let bob = user(&f, "bob", "HOST").await;

        f.service.notify_follow(&ann, &bob).await.unwrap();

        assert_eq!(f.service.list_for(&bob).await.unwrap().len(), 1);
        assert_eq!(f.mailer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_comment_notifies_owner_only_when_different() {
        let f = setup().await;
        let owner = user(&f, "owner", "HOST").await;
        let guest = user(&f, "guest", "TENANT").await;
        let target = ContentRef {
            kind: ContentKind::Post,
            id: 1,
            owner_id: owner.id,
        };

        assert!(!f.service.notify_comment(&owner, target).await.unwrap());
        assert!(f.service.list_for(&owner).await.unwrap().is_empty());

        assert!(f.service.notify_comment(&guest, target).await.unwrap());
        let inbox = f.service.list_for(&owner).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notice, "guest commented your post");
        assert_eq!(inbox[0].recipient_id, owner.id);
        assert!(f.mailer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_is_recipient_only() {
        let f = setup().await;
        let ann = user(&f, "ann", "TENANT").await;
        let bob = user(&f, "bob", "HOST").await;
        f.service.notify_follow(&ann, &bob).await.unwrap();
        let id = f.service.list_for(&bob).await.unwrap()[0].id;

        assert!(matches!(
            f.service.mark_read(&ann, id).await,
            Err(NotificationServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.mark_read(&bob, id + 100).await,
            Err(NotificationServiceError::NotFound)
        ));

        let read = f.service.mark_read(&bob, id).await.unwrap();
        assert!(read.is_read);
        assert_eq!(f.service.unread_count(&bob).await.unwrap(), 0);
    }
}
