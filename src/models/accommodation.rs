//! Accommodation listing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentImage, ContentKind, ContentRef};

/// A geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Hashable key for caches; coordinates are rounded to ~1cm
    pub fn cache_key(&self) -> (i64, i64) {
        (
            (self.latitude * 1e7).round() as i64,
            (self.longitude * 1e7).round() as i64,
        )
    }
}

/// Rental listing published by a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accommodation {
    pub id: i64,
    pub user_id: i64,
    pub address: String,
    pub district: String,
    pub city: String,
    pub number_of_people: i64,
    pub rent_cost: i64,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_verified: bool,
    pub is_rented: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ContentImage>,
}

impl Accommodation {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            kind: ContentKind::Accommodation,
            id: self.id,
            owner_id: self.user_id,
        }
    }

    /// Location, if both coordinates were recorded
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

fn default_people() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccommodationInput {
    pub address: String,
    pub district: String,
    pub city: String,
    #[serde(default = "default_people")]
    pub number_of_people: i64,
    pub rent_cost: i64,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_merges_nearly_equal_points() {
        let a = Coordinates::new(10.7769, 106.7009);
        let b = Coordinates::new(10.776_900_000_1, 106.700_900_000_1);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), Coordinates::new(10.7770, 106.7009).cache_key());
    }

    #[test]
    fn test_number_of_people_defaults_to_one() {
        let input: CreateAccommodationInput = serde_json::from_str(
            r#"{"address":"1 Main St","district":"D1","city":"HCM","rent_cost":500}"#,
        )
        .unwrap();
        assert_eq!(input.number_of_people, 1);
        assert!(input.latitude.is_none());
    }
}
