//! Request and response models for the `/route` endpoint and the provider payload.
//!
//! Application coordinates are `{lat, lng}` objects. The provider speaks GeoJSON, where a
//! position is `[lng, lat]`; that ordering only appears in [`UpstreamPayload`] and
//! [`Position`].

use serde::{Deserialize, Serialize};

/// Minimum number of waypoints in a route request (origin and destination).
pub const MIN_ROUTE_COORDINATES: usize = 2;

/// Minimum number of vertices describing an avoid zone.
pub const MIN_AVOID_ZONE_POINTS: usize = 3;

/// A geographic point in application order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, within [-90, 90].
    pub lat: f64,

    /// Longitude in degrees, within [-180, 180]. Accepts `lon` on input.
    #[serde(alias = "lon")]
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check that both components are finite and inside their ranges.
    pub fn check(&self) -> Result<(), &'static str> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err("latitude and longitude must be finite numbers");
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err("latitude must be within [-90, 90]");
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err("longitude must be within [-180, 180]");
        }
        Ok(())
    }

    /// GeoJSON position (`[lng, lat]`).
    pub fn to_position(self) -> Position {
        [self.lng, self.lat]
    }

    /// Inverse of [`Coordinate::to_position`].
    pub fn from_position(position: Position) -> Self {
        let [lng, lat] = position;
        Self { lat, lng }
    }
}

/// Polygon the route must not cross, as vertices in caller order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvoidZone {
    pub points: Vec<Coordinate>,
}

impl AvoidZone {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }
}

impl From<Vec<Coordinate>> for AvoidZone {
    fn from(points: Vec<Coordinate>) -> Self {
        Self { points }
    }
}

/// Inbound body of `POST /route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Waypoints: first is the origin, last the destination, the rest are via-points.
    pub coordinates: Vec<Coordinate>,

    /// Optional polygons to avoid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid_zones: Vec<AvoidZone>,
}

/// Successful body of `POST /route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub route: Vec<Coordinate>,
}

/// GeoJSON position, `[longitude, latitude]`.
pub type Position = [f64; 2];

/// Closed or open sequence of positions bounding a polygon.
pub type Ring = Vec<Position>;

/// Body sent to the provider's directions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPayload {
    pub coordinates: Vec<Position>,

    /// Omitted entirely when the request has no avoid zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<UpstreamOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamOptions {
    pub avoid_polygons: AvoidPolygons,
}

/// GeoJSON geometry for `options.avoid_polygons`.
///
/// Every polygon carries exactly one (exterior) ring; holes are never produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum AvoidPolygons {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl AvoidPolygons {
    pub fn kind(&self) -> &'static str {
        match self {
            AvoidPolygons::Polygon(_) => "Polygon",
            AvoidPolygons::MultiPolygon(_) => "MultiPolygon",
        }
    }
}
