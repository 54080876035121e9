//! Data models
//!
//! Database entities, API inputs and the small value types shared between
//! services.

mod accommodation;
mod comment;
mod content;
mod follow;
mod notification;
mod pagination;
mod post;
mod session;
mod stats;
mod user;

pub use accommodation::{Accommodation, Coordinates, CreateAccommodationInput};
pub use comment::{Comment, CommentView};
pub use content::{ContentImage, ContentKind, ContentRef, ImageUpload};
pub use follow::{Follow, FollowToggle};
pub use notification::{NewNotification, Notification};
pub use pagination::{ListParams, PagedResult};
pub use post::{CreatePostInput, Post};
pub use session::Session;
pub use stats::{ChartSeries, Period, ReportSubject};
pub use user::{avatar_or_gravatar, CreateUserInput, UpdateProfileInput, User, UserRole};

#[cfg(test)]
pub(crate) use user::sample_user;
