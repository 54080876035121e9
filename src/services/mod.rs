//! Services layer - Business logic
//!
//! Each service owns the rules for one area of the API and talks to the
//! database only through repository traits. External systems sit behind
//! traits as well:
//! - [`ObjectStorage`] for uploaded images
//! - [`Mailer`] for outbound email
//! - [`DistanceProvider`] for travel distances

pub mod accommodation;
pub mod comment;
pub mod email;
pub mod follow;
pub mod notification;
pub mod password;
pub mod post;
pub mod routing;
pub mod stats;
pub mod storage;
pub mod user;

pub use accommodation::{AccommodationService, AccommodationServiceError, ProximitySearch};
pub use comment::{CommentService, CommentServiceError};
pub use email::{build_mailer, LogMailer, Mailer, SmtpMailer};
pub use follow::{FollowService, FollowServiceError};
pub use notification::{NotificationService, NotificationServiceError};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use routing::{CachedDistanceProvider, DistanceProvider, RoutesClient};
pub use stats::{StatsService, StatsServiceError};
pub use storage::{LocalStorage, ObjectStorage, StorageError};
pub use user::{UserService, UserServiceError};
