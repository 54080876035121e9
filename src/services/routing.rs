//! Travel distances for the accommodation proximity filter
//!
//! [`RoutesClient`] asks a driving-route REST endpoint for the distance
//! between two points. [`CachedDistanceProvider`] puts a moka cache in front
//! of it so repeated listings do not repeat remote lookups.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RoutingConfig;
use crate::models::Coordinates;

#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// Driving distance from `from` to `to`, in the provider's unit (km)
    async fn travel_distance(&self, from: Coordinates, to: Coordinates) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct RoutesResponse {
    #[serde(rename = "resourceSets", default)]
    resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Deserialize)]
struct ResourceSet {
    #[serde(default)]
    resources: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    #[serde(rename = "travelDistance")]
    travel_distance: f64,
}

impl RoutesResponse {
    fn first_distance(&self) -> Option<f64> {
        self.resource_sets
            .first()
            .and_then(|set| set.resources.first())
            .map(|route| route.travel_distance)
    }
}

/// REST client for a Bing Maps style `Routes/Driving` endpoint
pub struct RoutesClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RoutesClient {
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rentnest/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build routing HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn request_url(&self, from: Coordinates, to: Coordinates) -> String {
        format!(
            "{}?o=json&wp.0={},{}&wp.1={},{}&key={}",
            self.base_url, from.latitude, from.longitude, to.latitude, to.longitude, self.api_key
        )
    }
}

#[async_trait]
impl DistanceProvider for RoutesClient {
    async fn travel_distance(&self, from: Coordinates, to: Coordinates) -> Result<f64> {
        let response = self
            .client
            .get(self.request_url(from, to))
            .send()
            .await
            .context("Routing request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Routing service returned {}", response.status()));
        }

        let body: RoutesResponse = response
            .json()
            .await
            .context("Failed to parse routing response")?;

        body.first_distance()
            .ok_or_else(|| anyhow!("Routing response contained no route"))
    }
}

type CacheKey = ((i64, i64), (i64, i64));

/// Memoizes successful lookups; failures are not cached
pub struct CachedDistanceProvider {
    inner: Arc<dyn DistanceProvider>,
    cache: Cache<CacheKey, f64>,
}

impl CachedDistanceProvider {
    pub fn new(inner: Arc<dyn DistanceProvider>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    pub fn from_config(inner: Arc<dyn DistanceProvider>, config: &RoutingConfig) -> Self {
        Self::new(
            inner,
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_seconds),
        )
    }
}

#[async_trait]
impl DistanceProvider for CachedDistanceProvider {
    async fn travel_distance(&self, from: Coordinates, to: Coordinates) -> Result<f64> {
        let key = (from.cache_key(), to.cache_key());
        self.cache
            .try_get_with(key, self.inner.travel_distance(from, to))
            .await
            .map_err(|e| anyhow!("{:#}", e))
    }
}

/// Keep the items whose travel distance from `origin` is strictly below
/// `max_distance`, preserving input order.
///
/// Items without coordinates and items whose lookup fails are dropped. At
/// most `concurrency` lookups are in flight at once.
pub async fn retain_nearby<T, F>(
    provider: &dyn DistanceProvider,
    origin: Coordinates,
    items: Vec<T>,
    locate: F,
    max_distance: f64,
    concurrency: usize,
) -> Vec<T>
where
    F: Fn(&T) -> Option<Coordinates>,
{
    stream::iter(items)
        .map(|item| {
            let target = locate(&item);
            async move {
                let target = target?;
                match provider.travel_distance(origin, target).await {
                    Ok(distance) if distance < max_distance => Some(item),
                    Ok(distance) => {
                        tracing::debug!(distance, max_distance, "Listing outside search radius");
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Distance lookup failed, excluding listing: {:#}", e);
                        None
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(future::ready)
        .collect()
        .await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Distances keyed by destination latitude; unknown destinations fail
    #[derive(Default)]
    pub struct FixedDistances {
        pub by_latitude: HashMap<i64, f64>,
        pub calls: AtomicUsize,
    }

    impl FixedDistances {
        pub fn with(entries: &[(f64, f64)]) -> Self {
            Self {
                by_latitude: entries
                    .iter()
                    .map(|(lat, d)| ((lat * 1e7).round() as i64, *d))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DistanceProvider for FixedDistances {
        async fn travel_distance(&self, _from: Coordinates, to: Coordinates) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.by_latitude
                .get(&to.cache_key().0)
                .copied()
                .ok_or_else(|| anyhow!("no route"))
        }
    }
}
