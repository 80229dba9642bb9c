//! Device position lookup

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::ServiceError;
use crate::geometry::LatLng;

/// A position reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionFix {
    pub position: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
    pub acquired_at: DateTime<Utc>,
}

/// Per-call limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Reuse a cached fix younger than this
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

/// Trait for device position sources
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<PositionFix, ServiceError>;
}

/// Provider with a configured position; reports `Unavailable` when unset
pub struct FixedPositionProvider {
    position: Option<LatLng>,
}

impl FixedPositionProvider {
    pub fn new(position: Option<LatLng>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl GeolocationProvider for FixedPositionProvider {
    async fn current_position(&self) -> Result<PositionFix, ServiceError> {
        let position = self
            .position
            .ok_or_else(|| ServiceError::Unavailable("no device position configured".to_string()))?;
        Ok(PositionFix {
            position,
            accuracy_meters: None,
            acquired_at: Utc::now(),
        })
    }
}

/// One-shot lookups with timeout and maximum-age caching
pub struct Geolocator {
    provider: Arc<dyn GeolocationProvider>,
    options: PositionOptions,
    last_fix: Mutex<Option<PositionFix>>,
}

impl Geolocator {
    pub fn new(provider: Arc<dyn GeolocationProvider>, options: PositionOptions) -> Self {
        Self {
            provider,
            options,
            last_fix: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<PositionFix> {
        let guard = self.last_fix.lock().ok()?;
        let fix = guard.as_ref()?;
        let age = (Utc::now() - fix.acquired_at).to_std().unwrap_or_default();
        (age <= self.options.maximum_age).then(|| fix.clone())
    }

    /// Current position. Timeout, permission denial and other failures are
    /// distinct `ServiceError` variants.
    pub async fn locate(&self) -> Result<PositionFix, ServiceError> {
        if let Some(fix) = self.cached() {
            debug!("Reusing cached position {}", fix.position);
            return Ok(fix);
        }

        let fix = tokio::time::timeout(self.options.timeout, self.provider.current_position())
            .await
            .map_err(|_| {
                warn!("Geolocation timed out after {:?}", self.options.timeout);
                ServiceError::Timeout
            })??;

        if let Ok(mut guard) = self.last_fix.lock() {
            *guard = Some(fix.clone());
        }
        Ok(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
        result: Result<LatLng, ServiceError>,
    }

    #[async_trait]
    impl GeolocationProvider for CountingProvider {
        async fn current_position(&self) -> Result<PositionFix, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let position = self.result.clone()?;
            Ok(PositionFix {
                position,
                accuracy_meters: Some(20.0),
                acquired_at: Utc::now(),
            })
        }
    }

    fn provider(delay: Duration, result: Result<LatLng, ServiceError>) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            delay,
            result,
        })
    }

    #[tokio::test]
    async fn test_fix_is_cached_within_maximum_age() {
        let p = provider(Duration::ZERO, Ok(LatLng::new(35.0, 135.0)));
        let locator = Geolocator::new(p.clone(), PositionOptions::default());

        let first = locator.locate().await.unwrap();
        let second = locator.locate().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_maximum_age_always_asks_provider() {
        let p = provider(Duration::ZERO, Ok(LatLng::new(35.0, 135.0)));
        let options = PositionOptions {
            maximum_age: Duration::ZERO,
            ..PositionOptions::default()
        };
        let locator = Geolocator::new(p.clone(), options);

        tokio::time::sleep(Duration::from_millis(5)).await;
        locator.locate().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        locator.locate().await.unwrap();

        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let p = provider(Duration::from_secs(5), Ok(LatLng::new(35.0, 135.0)));
        let options = PositionOptions {
            timeout: Duration::from_millis(20),
            ..PositionOptions::default()
        };
        let locator = Geolocator::new(p, options);

        assert_eq!(locator.locate().await, Err(ServiceError::Timeout));
    }

    #[tokio::test]
    async fn test_permission_denied_is_distinct() {
        let p = provider(Duration::ZERO, Err(ServiceError::PermissionDenied));
        let locator = Geolocator::new(p, PositionOptions::default());
        assert_eq!(locator.locate().await, Err(ServiceError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_fixed_provider_without_position_is_unavailable() {
        let locator = Geolocator::new(
            Arc::new(FixedPositionProvider::new(None)),
            PositionOptions::default(),
        );
        assert!(matches!(
            locator.locate().await,
            Err(ServiceError::Unavailable(_))
        ));
    }
}
