//! Database repositories
//!
//! One repository per aggregate. Each exposes a trait used by the services
//! and a `Sqlx*` implementation covering SQLite and MySQL.

pub mod accommodation;
pub mod comment;
pub mod follow;
mod image;
pub mod notification;
pub mod post;
pub mod session;
pub mod stats;
pub mod user;

pub use accommodation::{AccommodationFilter, AccommodationRepository, SqlxAccommodationRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use post::{PostFilter, PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use stats::{SqlxStatsRepository, StatsRepository};
pub use user::{SqlxUserRepository, UserRepository};
