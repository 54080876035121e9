//! Accommodation service
//!
//! Rental listings published by hosts. Listings can be narrowed to those
//! within driving distance of a point; see [`AccommodationService::list`].

use std::sync::Arc;

use crate::config::RoutingConfig;
use crate::db::repositories::{AccommodationFilter, AccommodationRepository};
use crate::models::{
    Accommodation, ContentKind, Coordinates, CreateAccommodationInput, ImageUpload, ListParams,
    PagedResult, User,
};
use crate::services::notification::{log_dispatch_failure, NotificationService};
use crate::services::routing::{retain_nearby, DistanceProvider};
use crate::services::storage::{delete_all, put_all, ObjectStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum AccommodationServiceError {
    #[error("Accommodation not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<StorageError> for AccommodationServiceError {
    fn from(e: StorageError) -> Self {
        if e.is_rejected_upload() {
            AccommodationServiceError::ValidationError(e.to_string())
        } else {
            AccommodationServiceError::InternalError(e.into())
        }
    }
}

/// Distance source and limits for proximity listings
pub struct ProximitySearch {
    pub provider: Arc<dyn DistanceProvider>,
    pub max_distance: f64,
    pub concurrency: usize,
}

impl ProximitySearch {
    pub fn new(provider: Arc<dyn DistanceProvider>, config: &RoutingConfig) -> Self {
        Self {
            provider,
            max_distance: config.max_distance,
            concurrency: config.lookup_concurrency,
        }
    }
}

pub struct AccommodationService {
    repo: Arc<dyn AccommodationRepository>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<NotificationService>,
    proximity: ProximitySearch,
    min_images: usize,
}

impl AccommodationService {
    pub fn new(
        repo: Arc<dyn AccommodationRepository>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<NotificationService>,
        proximity: ProximitySearch,
        min_images: usize,
    ) -> Self {
        Self {
            repo,
            storage,
            notifier,
            proximity,
            min_images,
        }
    }

    fn validate_input(&self, input: &CreateAccommodationInput, image_count: usize) -> Result<(), AccommodationServiceError> {
        if image_count < self.min_images {
            return Err(AccommodationServiceError::ValidationError(format!(
                "At least {} images are required",
                self.min_images
            )));
        }
        if input.address.trim().is_empty() {
            return Err(AccommodationServiceError::ValidationError(
                "Address is required".to_string(),
            ));
        }
        if input.number_of_people < 1 {
            return Err(AccommodationServiceError::ValidationError(
                "Number of people must be at least 1".to_string(),
            ));
        }
        if input.rent_cost < 0 {
            return Err(AccommodationServiceError::ValidationError(
                "Rent cost cannot be negative".to_string(),
            ));
        }
        if input.latitude.is_some() != input.longitude.is_some() {
            return Err(AccommodationServiceError::ValidationError(
                "Latitude and longitude must be given together".to_string(),
            ));
        }
        Ok(())
    }

    /// Publish a listing (hosts only) and notify the host's followers.
    ///
    /// Role and image count are checked before anything is uploaded or
    /// written.
    pub async fn create(
        &self,
        user: &User,
        input: CreateAccommodationInput,
        images: Vec<ImageUpload>,
    ) -> Result<Accommodation, AccommodationServiceError> {
        if !user.is_host() {
            return Err(AccommodationServiceError::Forbidden(
                "Only hosts can create accommodations".to_string(),
            ));
        }
        self.validate_input(&input, images.len())?;

        let urls = put_all(&self.storage, ContentKind::Accommodation.image_folder(), &images).await?;

        let accommodation = match self.repo.create(user.id, &input, &urls).await {
            Ok(accommodation) => accommodation,
            Err(e) => {
                delete_all(&self.storage, &urls).await;
                return Err(AccommodationServiceError::InternalError(e));
            }
        };
        tracing::info!(
            "{} created accommodation {} with {} image(s)",
            user.username,
            accommodation.id,
            urls.len()
        );

        log_dispatch_failure(
            "new accommodation",
            self.notifier
                .notify_new_content(user, ContentKind::Accommodation)
                .await
                .map(|_| ()),
        );
        Ok(accommodation)
    }

    pub async fn get(&self, id: i64) -> Result<Accommodation, AccommodationServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(AccommodationServiceError::NotFound)
    }

    /// All listings, newest first.
    ///
    /// With `near`, only located listings strictly closer than the configured
    /// distance are kept and the page is cut after filtering.
    pub async fn list(
        &self,
        near: Option<Coordinates>,
        params: &ListParams,
    ) -> Result<PagedResult<Accommodation>, AccommodationServiceError> {
        let Some(origin) = near else {
            let (items, total) = self.repo.list(AccommodationFilter::default(), params).await?;
            return Ok(PagedResult::new(items, total, params));
        };

        let candidates = self
            .repo
            .list_all(AccommodationFilter {
                located: true,
                ..Default::default()
            })
            .await?;
        let candidate_count = candidates.len();

        let nearby = retain_nearby(
            self.proximity.provider.as_ref(),
            origin,
            candidates,
            Accommodation::coordinates,
            self.proximity.max_distance,
            self.proximity.concurrency,
        )
        .await;
        tracing::debug!(
            "{} of {} accommodation(s) within {} of ({}, {})",
            nearby.len(),
            candidate_count,
            self.proximity.max_distance,
            origin.latitude,
            origin.longitude
        );

        let total = nearby.len() as i64;
        let items = nearby
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_own(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Accommodation>, AccommodationServiceError> {
        let filter = AccommodationFilter {
            owner_id: Some(user.id),
            ..Default::default()
        };
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Listings with the given verification state
    pub async fn list_by_verification(
        &self,
        verified: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Accommodation>, AccommodationServiceError> {
        let filter = AccommodationFilter {
            verified: Some(verified),
            ..Default::default()
        };
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn verify(&self, user: &User, id: i64) -> Result<Accommodation, AccommodationServiceError> {
        if !user.is_admin() {
            return Err(AccommodationServiceError::Forbidden(
                "Only administrators can verify accommodations".to_string(),
            ));
        }
        let mut accommodation = self.get(id).await?;
        if !accommodation.is_verified {
            self.repo.set_verified(id, true).await?;
            accommodation.is_verified = true;
            tracing::info!("{} verified accommodation {}", user.username, id);
        }
        Ok(accommodation)
    }

    /// Mark a listing rented or available again (owner only)
    pub async fn set_rented(
        &self,
        user: &User,
        id: i64,
        rented: bool,
    ) -> Result<Accommodation, AccommodationServiceError> {
        let mut accommodation = self.get(id).await?;
        if accommodation.user_id != user.id {
            return Err(AccommodationServiceError::Forbidden(
                "Only the owner can change rental status".to_string(),
            ));
        }
        self.repo.set_rented(id, rented).await?;
        accommodation.is_rented = rented;
        Ok(accommodation)
    }

    /// Delete a listing and its stored images (owner or admin)
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), AccommodationServiceError> {
        let accommodation = self.get(id).await?;
        if !user.can_manage(accommodation.user_id) {
            return Err(AccommodationServiceError::Forbidden(
                "You can only delete your own accommodations".to_string(),
            ));
        }

        self.repo.delete(id).await?;
        let urls: Vec<String> = accommodation.images.into_iter().map(|image| image.url).collect();
        delete_all(&self.storage, &urls).await;
        tracing::info!("{} deleted accommodation {}", user.username, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{
        FollowRepository, SqlxAccommodationRepository, SqlxFollowRepository,
        SqlxNotificationRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::services::notification::testing::RecordingMailer;
    use crate::services::routing::testing::FixedDistances;
    use crate::services::storage::testing::{png, MemoryStorage};

    struct Fixture {
        pool: DynDatabasePool,
        service: AccommodationService,
        storage: Arc<MemoryStorage>,
        mailer: Arc<RecordingMailer>,
        notifier: Arc<NotificationService>,
        distances: Arc<FixedDistances>,
        users: Arc<dyn UserRepository>,
        follows: Arc<dyn FollowRepository>,
    }

    async fn setup(distances: FixedDistances) -> Fixture {
        let pool = setup_pool().await;
        let users = SqlxUserRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(MemoryStorage::default());
        let distances = Arc::new(distances);
        let notifier = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            follows.clone(),
            users.clone(),
            mailer.clone(),
        ));
        let service = AccommodationService::new(
            SqlxAccommodationRepository::boxed(pool.clone()),
            storage.clone(),
            notifier.clone(),
            ProximitySearch {
                provider: distances.clone(),
                max_distance: 10.0,
                concurrency: 2,
            },
            3,
        );
        Fixture {
            pool,
            service,
            storage,
            mailer,
            notifier,
            distances,
            users,
            follows,
        }
    }

    async fn user(f: &Fixture, name: &str, role: &str) -> User {
        let id = insert_user(&f.pool, name, role).await;
        f.users.get_by_id(id).await.unwrap().unwrap()
    }

    fn input(address: &str, coords: Option<(f64, f64)>) -> CreateAccommodationInput {
        CreateAccommodationInput {
            address: address.to_string(),
            district: "District 1".to_string(),
            city: "Ho Chi Minh".to_string(),
            number_of_people: 2,
            rent_cost: 3_000_000,
            description: None,
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
        }
    }

    fn images(n: usize) -> Vec<ImageUpload> {
        (0..n).map(|i| png(&format!("{}.png", i))).collect()
    }

    #[tokio::test]
    async fn test_only_hosts_create() {
        let f = setup(FixedDistances::default()).await;
        let tenant = user(&f, "tenant", "TENANT").await;

        assert!(matches!(
            f.service.create(&tenant, input("1 Main St", None), images(3)).await,
            Err(AccommodationServiceError::Forbidden(_))
        ));
        assert!(f.storage.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_too_few_images_rejected_before_upload() {
        let f = setup(FixedDistances::default()).await;
        let host = user(&f, "host", "HOST").await;

        assert!(matches!(
            f.service.create(&host, input("1 Main St", None), images(2)).await,
            Err(AccommodationServiceError::ValidationError(_))
        ));
        assert!(f.storage.stored.lock().unwrap().is_empty());
        assert_eq!(
            f.service.list(None, &ListParams::default()).await.unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_create_fans_out_and_skips_creator() {
        let f = setup(FixedDistances::default()).await;
        let host = user(&f, "host", "HOST").await;
        let fan = user(&f, "fan", "TENANT").await;
        f.follows.insert_if_absent(fan.id, host.id).await.unwrap();
        f.follows.insert_if_absent(host.id, host.id).await.unwrap();

        let created = f
            .service
            .create(&host, input("1 Main St", None), images(3))
            .await
            .unwrap();
        assert_eq!(created.images.len(), 3);
        assert!(!created.is_verified);

        let inbox = f.notifier.list_for(&fan).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notice, "host added new accommodation");
        assert!(f.notifier.list_for(&host).await.unwrap().is_empty());
        assert_eq!(f.mailer.calls(), vec![(inbox[0].notice.clone(), vec![fan.email.clone()])]);
    }

    #[tokio::test]
    async fn test_proximity_filter() {
        let f = setup(FixedDistances::with(&[(10.1, 3.0), (10.2, 10.0), (10.3, 9.99)])).await;
        let host = user(&f, "host", "HOST").await;

        let near = f
            .service
            .create(&host, input("near", Some((10.1, 106.0))), images(3))
            .await
            .unwrap();
        f.service
            .create(&host, input("edge", Some((10.2, 106.0))), images(3))
            .await
            .unwrap();
        let almost = f
            .service
            .create(&host, input("almost", Some((10.3, 106.0))), images(3))
            .await
            .unwrap();
        f.service
            .create(&host, input("unrouted", Some((10.4, 106.0))), images(3))
            .await
            .unwrap();
        f.service
            .create(&host, input("unlocated", None), images(3))
            .await
            .unwrap();

        let all = f.service.list(None, &ListParams::default()).await.unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(f.distances.calls(), 0);

        let origin = Some(Coordinates::new(10.0, 106.0));
        let nearby = f.service.list(origin, &ListParams::default()).await.unwrap();
        let ids: Vec<i64> = nearby.items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![almost.id, near.id]);
        assert_eq!(nearby.total, 2);
        // One lookup per located row.
        assert_eq!(f.distances.calls(), 4);

        let second_page = f.service.list(origin, &ListParams::new(2, 1)).await.unwrap();
        assert_eq!(second_page.total, 2);
        assert_eq!(second_page.items.len(), 1);
        assert_eq!(second_page.items[0].id, near.id);
    }

    #[tokio::test]
    async fn test_verify_rent_and_delete() {
        let f = setup(FixedDistances::default()).await;
        let host = user(&f, "host", "HOST").await;
        let other = user(&f, "other", "HOST").await;
        let admin = user(&f, "admin", "ADMIN").await;
        let listing = f
            .service
            .create(&host, input("1 Main St", None), images(3))
            .await
            .unwrap();

        assert!(matches!(
            f.service.verify(&host, listing.id).await,
            Err(AccommodationServiceError::Forbidden(_))
        ));
        assert!(f.service.verify(&admin, listing.id).await.unwrap().is_verified);
        let params = ListParams::default();
        assert_eq!(f.service.list_by_verification(true, &params).await.unwrap().total, 1);
        assert_eq!(f.service.list_by_verification(false, &params).await.unwrap().total, 0);

        assert!(matches!(
            f.service.set_rented(&other, listing.id, true).await,
            Err(AccommodationServiceError::Forbidden(_))
        ));
        assert!(f.service.set_rented(&host, listing.id, true).await.unwrap().is_rented);

        assert!(matches!(
            f.service.delete(&other, listing.id).await,
            Err(AccommodationServiceError::Forbidden(_))
        ));
        f.service.delete(&host, listing.id).await.unwrap();
        assert_eq!(f.storage.deleted.lock().unwrap().len(), 3);
        assert!(matches!(
            f.service.get(listing.id).await,
            Err(AccommodationServiceError::NotFound)
        ));
        assert!(f.service.list_own(&host, &params).await.unwrap().items.is_empty());
    }
}
