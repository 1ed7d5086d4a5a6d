//! Geolocation capability and geofence math.
//!
//! The sensor is an external capability: it may be absent, and when present
//! it pushes position updates at its own cadence. The core consumes updates
//! over a channel and never polls.

use tokio::sync::mpsc;

/// Mean Earth radius in meters, as used by the haversine distance.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A position fix from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Great-circle distance in meters between two coordinates (haversine).
#[must_use]
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Platform geolocation capability.
///
/// Availability is not guaranteed; the location scheduler only starts when
/// [`is_available`](GeoCapability::is_available) reports `true` and
/// [`watch_positions`](GeoCapability::watch_positions) yields a stream.
pub trait GeoCapability: Send + Sync {
    /// Whether the platform exposes a position sensor at all.
    fn is_available(&self) -> bool;

    /// Subscribe to continuous position updates.
    ///
    /// Returns `None` when the sensor is unavailable or a watch is already
    /// handed out; there is at most one consumer per capability instance.
    fn watch_positions(&self) -> Option<mpsc::UnboundedReceiver<Position>>;
}

/// Stub capability for platforms without a position sensor.
pub struct UnavailableGeo;

impl GeoCapability for UnavailableGeo {
    fn is_available(&self) -> bool {
        false
    }

    fn watch_positions(&self) -> Option<mpsc::UnboundedReceiver<Position>> {
        None
    }
}

/// Channel-fed capability: whoever holds the sender is the sensor.
///
/// Used by hosts that bridge a real platform watcher in, and by tests.
pub struct ChannelGeo {
    receiver: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Position>>>,
}

impl ChannelGeo {
    /// Create the capability and the sender that feeds it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedSender<Position>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                receiver: std::sync::Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl GeoCapability for ChannelGeo {
    fn is_available(&self) -> bool {
        self.receiver.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    fn watch_positions(&self) -> Option<mpsc::UnboundedReceiver<Position>> {
        self.receiver.lock().ok().and_then(|mut g| g.take())
    }
}
