//! Post service
//!
//! Social feed posts: creation with images, listings, moderation and deletion.

use std::sync::Arc;

use crate::db::repositories::{PostFilter, PostRepository};
use crate::models::{ContentKind, CreatePostInput, ImageUpload, ListParams, PagedResult, Post, User};
use crate::services::notification::{log_dispatch_failure, NotificationService};
use crate::services::storage::{delete_all, put_all, ObjectStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<StorageError> for PostServiceError {
    fn from(e: StorageError) -> Self {
        if e.is_rejected_upload() {
            PostServiceError::ValidationError(e.to_string())
        } else {
            PostServiceError::InternalError(e.into())
        }
    }
}

pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<NotificationService>,
}

impl PostService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            post_repo,
            storage,
            notifier,
        }
    }

    /// Publish a post and tell the author's followers about it.
    ///
    /// Images are stored before the transaction; if the insert fails they are
    /// removed again.
    pub async fn create(
        &self,
        user: &User,
        input: CreatePostInput,
        images: Vec<ImageUpload>,
    ) -> Result<Post, PostServiceError> {
        if input.content.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Post content cannot be empty".to_string(),
            ));
        }

        let urls = put_all(&self.storage, ContentKind::Post.image_folder(), &images).await?;

        let post = match self.post_repo.create(user.id, &input, &urls).await {
            Ok(post) => post,
            Err(e) => {
                delete_all(&self.storage, &urls).await;
                return Err(PostServiceError::InternalError(e));
            }
        };
        tracing::info!("{} created post {} with {} image(s)", user.username, post.id, urls.len());

        log_dispatch_failure(
            "new post",
            self.notifier
                .notify_new_content(user, ContentKind::Post)
                .await
                .map(|_| ()),
        );
        Ok(post)
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await?
            .ok_or(PostServiceError::NotFound)
    }

    /// All posts, newest first
    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        self.list_filtered(PostFilter::default(), params).await
    }

    pub async fn list_own(&self, user: &User, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let filter = PostFilter {
            owner_id: Some(user.id),
            ..Default::default()
        };
        self.list_filtered(filter, params).await
    }

    /// Posts with the given approval state
    pub async fn list_by_approval(
        &self,
        approved: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let filter = PostFilter {
            approved: Some(approved),
            ..Default::default()
        };
        self.list_filtered(filter, params).await
    }

    async fn list_filtered(
        &self,
        filter: PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let (posts, total) = self.post_repo.list(filter, params).await?;
        Ok(PagedResult::new(posts, total, params))
    }

    pub async fn approve(&self, user: &User, id: i64) -> Result<Post, PostServiceError> {
        if !user.is_admin() {
            return Err(PostServiceError::Forbidden(
                "Only administrators can approve posts".to_string(),
            ));
        }
        let mut post = self.get(id).await?;
        if !post.is_approved {
            self.post_repo.set_approved(id, true).await?;
            post.is_approved = true;
            tracing::info!("{} approved post {}", user.username, id);
        }
        Ok(post)
    }

    /// Delete a post and its stored images (owner or admin)
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), PostServiceError> {
        let post = self.get(id).await?;
        if !user.can_manage(post.user_id) {
            return Err(PostServiceError::Forbidden(
                "You can only delete your own posts".to_string(),
            ));
        }

        self.post_repo.delete(id).await?;
        let urls: Vec<String> = post.images.into_iter().map(|image| image.url).collect();
        delete_all(&self.storage, &urls).await;
        tracing::info!("{} deleted post {}", user.username, id);
        Ok(())
    }
}
