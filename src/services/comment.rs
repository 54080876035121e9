//! Comment threading for posts and accommodations
//!
//! Root comments attach to an entity; replies attach to a comment and inherit
//! its entity. Listings expand one level at a time.

use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::{AccommodationRepository, CommentRepository, PostRepository};
use crate::models::{Comment, CommentView, ContentKind, ContentRef, User};
use crate::services::notification::{log_dispatch_failure, NotificationService};

const MAX_COMMENT_LENGTH: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    accommodation_repo: Arc<dyn AccommodationRepository>,
    notifier: Arc<NotificationService>,
    owner_only_delete: bool,
}

impl CommentService {
    pub fn new(
        comment_repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        accommodation_repo: Arc<dyn AccommodationRepository>,
        notifier: Arc<NotificationService>,
        owner_only_delete: bool,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            accommodation_repo,
            notifier,
            owner_only_delete,
        }
    }

    fn validate_text(text: &str) -> Result<String, CommentServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment text cannot be empty".to_string(),
            ));
        }
        if text.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment text cannot exceed {} characters",
                MAX_COMMENT_LENGTH
            )));
        }
        Ok(text.to_string())
    }

    /// Look up the commented entity and its owner
    async fn resolve(&self, kind: ContentKind, entity_id: i64) -> Result<ContentRef, CommentServiceError> {
        let found = match kind {
            ContentKind::Post => self.post_repo.get_by_id(entity_id).await?.map(|p| p.content_ref()),
            ContentKind::Accommodation => self
                .accommodation_repo
                .get_by_id(entity_id)
                .await?
                .map(|a| a.content_ref()),
        };
        found.ok_or_else(|| CommentServiceError::NotFound(capitalize(kind)))
    }

    async fn get(&self, kind: ContentKind, id: i64) -> Result<Comment, CommentServiceError> {
        self.comment_repo
            .get_by_id(kind, id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound("Comment".to_string()))
    }

    async fn create_and_notify(
        &self,
        user: &User,
        target: ContentRef,
        parent_id: Option<i64>,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self
            .comment_repo
            .create(target.kind, target.id, user.id, parent_id, text)
            .await?;
        log_dispatch_failure(
            "comment",
            self.notifier.notify_comment(user, target).await.map(|_| ()),
        );
        Ok(comment)
    }

    /// Add a top-level comment to a post or accommodation
    pub async fn comment(
        &self,
        user: &User,
        kind: ContentKind,
        entity_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let text = Self::validate_text(text)?;
        let target = self.resolve(kind, entity_id).await?;
        self.create_and_notify(user, target, None, &text).await
    }

    /// Top-level comments of an entity, oldest first
    pub async fn top_level(
        &self,
        kind: ContentKind,
        entity_id: i64,
    ) -> Result<Vec<CommentView>, CommentServiceError> {
        self.resolve(kind, entity_id).await?;
        Ok(self.comment_repo.list_top_level(kind, entity_id).await?)
    }

    /// Reply to an existing comment; the entity comes from the parent
    pub async fn reply(
        &self,
        user: &User,
        kind: ContentKind,
        parent_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let text = Self::validate_text(text)?;
        let parent = self.get(kind, parent_id).await?;
        let target = self.resolve(kind, parent.entity_id).await?;
        self.create_and_notify(user, target, Some(parent.id), &text).await
    }

    /// Direct replies to a comment
    pub async fn replies(&self, kind: ContentKind, id: i64) -> Result<Vec<CommentView>, CommentServiceError> {
        let parent = self.get(kind, id).await?;
        Ok(self.comment_repo.list_replies(kind, parent.id).await?)
    }

    /// Change the text of the caller's own comment
    pub async fn edit(
        &self,
        user: &User,
        kind: ContentKind,
        id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let mut comment = self.get(kind, id).await?;
        if comment.user_id != user.id {
            return Err(CommentServiceError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }
        let text = Self::validate_text(text)?;

        self.comment_repo.update_text(kind, id, &text).await?;
        comment.text = text;
        comment.updated_at = Utc::now();
        Ok(comment)
    }

    /// Delete a comment together with its replies
    pub async fn delete(&self, user: &User, kind: ContentKind, id: i64) -> Result<(), CommentServiceError> {
        let comment = self.get(kind, id).await?;
        if self.owner_only_delete && comment.user_id != user.id {
            return Err(CommentServiceError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }
        if !self.comment_repo.delete(kind, id).await? {
            return Err(CommentServiceError::NotFound("Comment".to_string()));
        }
        tracing::info!("{} deleted {} comment {}", user.username, kind, id);
        Ok(())
    }
}

fn capitalize(kind: ContentKind) -> String {
    let name = kind.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}
