use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MAP_ZOOM, MARKER_TITLE};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Provider error codes. Only real device geolocators produce the
/// permission, timeout and unknown cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum GeolocationError {
    #[error("Geolocation is not supported by this browser.")]
    Unsupported,

    #[error("User denied the request for Geolocation.")]
    PermissionDenied,

    #[error("Location information is unavailable.")]
    PositionUnavailable,

    #[error("The request to get user location timed out.")]
    Timeout,

    #[error("An unknown error occurred.")]
    Unknown,
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Geolocator answering with a fixed position.
pub struct StaticGeolocator {
    position: Coordinates,
}

impl StaticGeolocator {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: Coordinates {
                latitude,
                longitude,
            },
        }
    }
}

#[async_trait]
impl Geolocator for StaticGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        if !(-90.0..=90.0).contains(&self.position.latitude)
            || !(-180.0..=180.0).contains(&self.position.longitude)
        {
            return Err(GeolocationError::PositionUnavailable);
        }
        Ok(self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Coordinates,
    pub title: String,
}

/// Everything a map renderer needs to draw the visitor's location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// Withheld from serialized output; see [`MapView::has_api_key`].
    #[serde(skip)]
    pub api_key: String,
    pub center: Coordinates,
    pub zoom: u8,
    pub marker: Marker,
}

impl MapView {
    pub fn centered_on(api_key: &str, center: Coordinates) -> Self {
        Self {
            api_key: api_key.to_string(),
            center,
            zoom: MAP_ZOOM,
            marker: Marker {
                position: center,
                title: MARKER_TITLE.to_string(),
            },
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Locate the visitor and hand the resulting map to `on_ready`.
///
/// Returns `false` when no position could be obtained; the failure is only
/// logged and the map stays hidden.
pub async fn init_map<F>(geolocator: Option<&dyn Geolocator>, api_key: &str, on_ready: F) -> bool
where
    F: FnOnce(MapView),
{
    let Some(geolocator) = geolocator else {
        tracing::info!("{}", GeolocationError::Unsupported);
        return false;
    };

    match geolocator.current_position().await {
        Ok(center) => {
            on_ready(MapView::centered_on(api_key, center));
            true
        }
        Err(e) => {
            tracing::info!("{}", e);
            false
        }
    }
}
