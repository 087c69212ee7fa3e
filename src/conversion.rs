use crate::models::{
    AvoidPolygons, AvoidZone, Coordinate, Position, RouteRequest, RouteResponse, Ring,
    UpstreamOptions, UpstreamPayload, MIN_AVOID_ZONE_POINTS, MIN_ROUTE_COORDINATES,
};
use crate::provider_client::{ProviderError, RawProviderResponse};
use serde_json::Value;

// ============================================================================
// Request Payload Conversion Functions
// ============================================================================

/// Rejected route requests. Always detected before any provider call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("At least 2 coordinates are required (start and end point).")]
    TooFewCoordinates { found: usize },

    #[error(
        "Each avoid_zones polygon requires at least 3 points. Error in polygon at index {index}."
    )]
    AvoidZoneTooSmall { index: usize, found: usize },

    #[error("Invalid coordinate at {location}: {reason}")]
    InvalidCoordinate {
        location: String,
        reason: &'static str,
    },
}

/// Whether avoid-zone rings are closed before they are sent.
///
/// GeoJSON linear rings repeat their first position at the end. Callers usually send open
/// polygons, and the provider accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RingClosure {
    /// Send the caller's points verbatim.
    #[default]
    Preserve,
    /// Append the first point when the ring is not already closed.
    Close,
}

impl RingClosure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RingClosure::Preserve => "preserve",
            RingClosure::Close => "close",
        }
    }
}

/// Knobs for building the provider payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadOptions {
    pub ring_closure: RingClosure,
}

/// Validate a route request and convert it into the provider payload.
///
/// This conversion maps:
/// - coordinates[i] `{lat, lng}` → coordinates[i] `[lng, lat]`
/// - one avoid zone → options.avoid_polygons `Polygon` with a single ring
/// - several avoid zones → options.avoid_polygons `MultiPolygon`, one single-ring polygon per zone
/// - no avoid zones → no `options` key at all
pub fn build_payload(
    request: &RouteRequest,
    options: &PayloadOptions,
) -> Result<UpstreamPayload, ValidationError> {
    validate_request(request)?;

    let coordinates = request
        .coordinates
        .iter()
        .map(|c| c.to_position())
        .collect();

    let options = avoid_polygons(&request.avoid_zones, options.ring_closure)
        .map(|avoid_polygons| UpstreamOptions { avoid_polygons });

    Ok(UpstreamPayload {
        coordinates,
        options,
    })
}

/// Structural checks on a request: point counts and coordinate ranges.
pub fn validate_request(request: &RouteRequest) -> Result<(), ValidationError> {
    if request.coordinates.len() < MIN_ROUTE_COORDINATES {
        return Err(ValidationError::TooFewCoordinates {
            found: request.coordinates.len(),
        });
    }
    for (index, zone) in request.avoid_zones.iter().enumerate() {
        if zone.points.len() < MIN_AVOID_ZONE_POINTS {
            return Err(ValidationError::AvoidZoneTooSmall {
                index,
                found: zone.points.len(),
            });
        }
    }

    for (i, c) in request.coordinates.iter().enumerate() {
        check_coordinate(c, || format!("coordinates[{i}]"))?;
    }
    for (zi, zone) in request.avoid_zones.iter().enumerate() {
        for (pi, c) in zone.points.iter().enumerate() {
            check_coordinate(c, || format!("avoid_zones[{zi}][{pi}]"))?;
        }
    }
    Ok(())
}

fn check_coordinate(
    coordinate: &Coordinate,
    location: impl FnOnce() -> String,
) -> Result<(), ValidationError> {
    coordinate
        .check()
        .map_err(|reason| ValidationError::InvalidCoordinate {
            location: location(),
            reason,
        })
}

/// GeoJSON ring for one zone, in the caller's point order.
pub fn zone_to_ring(zone: &AvoidZone, closure: RingClosure) -> Ring {
    let mut ring: Ring = zone.points.iter().map(|p| p.to_position()).collect();
    if closure == RingClosure::Close {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
            if first != *last {
                ring.push(first);
            }
        }
    }
    ring
}

fn avoid_polygons(zones: &[AvoidZone], closure: RingClosure) -> Option<AvoidPolygons> {
    let rings: Vec<Ring> = zones.iter().map(|z| zone_to_ring(z, closure)).collect();
    match rings.len() {
        0 => None,
        1 => Some(AvoidPolygons::Polygon(rings)),
        _ => Some(AvoidPolygons::MultiPolygon(
            rings.into_iter().map(|ring| vec![ring]).collect(),
        )),
    }
}

// ============================================================================
// Response Body Conversion Functions
// ============================================================================

/// Extract the route from a provider GeoJSON reply.
///
/// Expects `features[0].geometry.coordinates` to be a LineString of at least two `[lng, lat]`
/// pairs, each a valid coordinate. Any other shape is a `MalformedResponse`; the raw body is
/// logged here and kept on the error, but never reaches the caller.
pub fn extract_route(raw: &RawProviderResponse) -> Result<RouteResponse, ProviderError> {
    let route = route_coordinates(&raw.body).map_err(|reason| {
        tracing::error!(
            "Unexpected routing service response format: {}\nResponse data: {}",
            reason,
            raw.body
        );
        ProviderError::malformed(reason, &raw.body)
    })?;

    Ok(RouteResponse { route })
}

fn route_coordinates(body: &Value) -> Result<Vec<Coordinate>, String> {
    let features = body
        .get("features")
        .ok_or("missing `features`")?
        .as_array()
        .ok_or("`features` is not an array")?;
    let feature = features.first().ok_or("`features` is empty")?;

    let geometry = feature
        .get("geometry")
        .ok_or("missing `features[0].geometry`")?;
    if !geometry.is_object() {
        return Err("`features[0].geometry` is not an object".to_string());
    }
    if let Some(kind) = geometry.get("type") {
        if kind.as_str() != Some("LineString") {
            return Err(format!("expected a LineString geometry, got {}", kind));
        }
    }

    let positions = geometry
        .get("coordinates")
        .ok_or("missing `features[0].geometry.coordinates`")?
        .as_array()
        .ok_or("`features[0].geometry.coordinates` is not an array")?;

    let route = positions
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let point = position(item)
                .map(Coordinate::from_position)
                .ok_or_else(|| format!("coordinate {i} is not a [lng, lat] pair"))?;
            point
                .check()
                .map_err(|reason| format!("coordinate {i} out of range: {reason}"))?;
            Ok(point)
        })
        .collect::<Result<Vec<_>, String>>()?;

    if route.len() < MIN_ROUTE_COORDINATES {
        return Err(format!(
            "route has fewer than {} positions (got {})",
            MIN_ROUTE_COORDINATES,
            route.len()
        ));
    }
    Ok(route)
}

fn position(item: &Value) -> Option<Position> {
    match item.as_array()?.as_slice() {
        [lng, lat] => Some([lng.as_f64()?, lat.as_f64()?]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    fn request(zones: Vec<Vec<Coordinate>>) -> RouteRequest {
        RouteRequest {
            coordinates: vec![c(49.41461, 8.681495), c(49.420318, 8.687872)],
            avoid_zones: zones.into_iter().map(AvoidZone::from).collect(),
        }
    }

    fn triangle(offset: f64) -> Vec<Coordinate> {
        vec![
            c(offset, offset),
            c(offset, offset + 1.0),
            c(offset + 1.0, offset + 1.0),
        ]
    }

    fn raw(body: Value) -> RawProviderResponse {
        RawProviderResponse { status: 200, body }
    }

    #[test]
    fn swaps_coordinates_to_lng_lat() {
        let payload = build_payload(&request(vec![]), &PayloadOptions::default()).unwrap();
        assert_eq!(
            payload.coordinates,
            vec![[8.681495, 49.41461], [8.687872, 49.420318]]
        );
    }

    #[test]
    fn omits_options_without_avoid_zones() {
        let payload = build_payload(&request(vec![]), &PayloadOptions::default()).unwrap();
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("options").is_none());
        assert_eq!(v.as_object().unwrap().len(), 1);
    }

    #[test]
    fn single_zone_becomes_open_polygon() {
        let zone = vec![c(1.0, 10.0), c(2.0, 20.0), c(3.0, 30.0)];
        let payload = build_payload(&request(vec![zone]), &PayloadOptions::default()).unwrap();
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            v["options"]["avoid_polygons"],
            json!({
                "type": "Polygon",
                "coordinates": [[[10.0, 1.0], [20.0, 2.0], [30.0, 3.0]]]
            })
        );
    }

    #[test]
    fn several_zones_become_multipolygon_in_order() {
        let payload = build_payload(
            &request(vec![triangle(0.0), triangle(10.0), triangle(20.0)]),
            &PayloadOptions::default(),
        )
        .unwrap();
        let v = serde_json::to_value(&payload).unwrap();
        let avoid = &v["options"]["avoid_polygons"];
        assert_eq!(avoid["type"], "MultiPolygon");
        let polygons = avoid["coordinates"].as_array().unwrap();
        assert_eq!(polygons.len(), 3);
        for (i, polygon) in polygons.iter().enumerate() {
            let rings = polygon.as_array().unwrap();
            assert_eq!(rings.len(), 1, "polygon {i} must have a single ring");
            let offset = i as f64 * 10.0;
            assert_eq!(rings[0][0], json!([offset, offset]));
            assert_eq!(rings[0].as_array().unwrap().len(), 3);
        }
    }

    #[test]
    fn zone_points_are_kept_verbatim() {
        // Duplicates and odd winding pass through untouched.
        let zone = vec![c(0.0, 0.0), c(0.0, 0.0), c(1.0, 1.0), c(0.0, 1.0)];
        let ring = zone_to_ring(&AvoidZone::from(zone), RingClosure::Preserve);
        assert_eq!(ring, vec![[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn close_mode_appends_first_point_once() {
        let open = AvoidZone::from(vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)]);
        let ring = zone_to_ring(&open, RingClosure::Close);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.first(), ring.last());

        let closed = AvoidZone::from(vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0), c(0.0, 0.0)]);
        assert_eq!(zone_to_ring(&closed, RingClosure::Close).len(), 4);
    }

    #[test]
    fn close_mode_applies_to_payload() {
        let options = PayloadOptions {
            ring_closure: RingClosure::Close,
        };
        let payload = build_payload(&request(vec![triangle(0.0)]), &options).unwrap();
        let v = serde_json::to_value(&payload).unwrap();
        let ring = v["options"]["avoid_polygons"]["coordinates"][0]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], ring[3]);
    }

    #[test]
    fn build_payload_is_deterministic() {
        let req = request(vec![triangle(0.0), triangle(5.0)]);
        let a = serde_json::to_vec(&build_payload(&req, &PayloadOptions::default()).unwrap()).unwrap();
        let b = serde_json::to_vec(&build_payload(&req, &PayloadOptions::default()).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_small_avoid_zone() {
        let err = build_payload(
            &request(vec![triangle(0.0), vec![c(0.0, 0.0), c(1.0, 1.0)]]),
            &PayloadOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::AvoidZoneTooSmall { index: 1, found: 2 });
        assert!(err.to_string().contains("requires at least 3 points"));
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn rejects_single_coordinate() {
        let mut req = request(vec![]);
        req.coordinates.truncate(1);
        let err = build_payload(&req, &PayloadOptions::default()).unwrap_err();
        assert_eq!(err, ValidationError::TooFewCoordinates { found: 1 });
        assert!(err.to_string().starts_with("At least 2 coordinates"));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut req = request(vec![]);
        req.coordinates[1] = c(91.0, 0.0);
        let err = build_payload(&req, &PayloadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("coordinates[1]"));

        let mut zone = triangle(0.0);
        zone[2] = c(0.0, f64::NAN);
        let err = build_payload(&request(vec![zone]), &PayloadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("avoid_zones[0][2]"));
    }

    #[test]
    fn extracts_route_in_lat_lng_order() {
        let route = extract_route(&raw(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[10.0, 20.0], [30.0, 40.0]]}
            }]
        })))
        .unwrap();
        assert_eq!(route.route, vec![c(20.0, 10.0), c(40.0, 30.0)]);
    }

    #[test]
    fn identity_round_trip_is_lossless() {
        let req = request(vec![]);
        let payload = build_payload(&req, &PayloadOptions::default()).unwrap();
        let echoed = raw(json!({
            "features": [{"geometry": {"coordinates": payload.coordinates}}]
        }));
        assert_eq!(extract_route(&echoed).unwrap().route, req.coordinates);
    }

    #[test]
    fn malformed_responses_are_classified() {
        let cases = vec![
            (json!({}), "missing `features`"),
            (json!({"features": {}}), "not an array"),
            (json!({"features": []}), "is empty"),
            (json!({"features": [{}]}), "geometry"),
            (json!({"features": [{"geometry": 5}]}), "not an object"),
            (json!({"features": [{"geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}]}), "LineString"),
            (json!({"features": [{"geometry": {}}]}), "coordinates"),
            (json!({"features": [{"geometry": {"coordinates": "abc"}}]}), "not an array"),
            (json!({"features": [{"geometry": {"coordinates": [[1.0]]}}]}), "coordinate 0"),
            (json!({"features": [{"geometry": {"coordinates": [[1.0, 2.0], [1.0, 2.0, 3.0]]}}]}), "coordinate 1"),
            (json!({"features": [{"geometry": {"coordinates": [["a", 2.0]]}}]}), "coordinate 0"),
            (json!({"features": [{"geometry": {"coordinates": [[1.0, 2.0], [10.0, -91.0]]}}]}), "coordinate 1 out of range"),
            (json!({"features": [{"geometry": {"coordinates": [[1.0, 2.0]]}}]}), "fewer than 2 positions"),
        ];
        for (body, expected) in cases {
            let err = extract_route(&raw(body.clone())).unwrap_err();
            match err {
                ProviderError::MalformedResponse { reason, raw } => {
                    assert!(
                        reason.contains(expected),
                        "reason {reason:?} should mention {expected:?}"
                    );
                    assert_eq!(raw, Some(body));
                }
                other => panic!("unexpected error variant: {:?}", other),
            }
        }
    }

    #[test]
    fn rejects_out_of_range_route_points() {
        let body = json!({
            "features": [{"geometry": {"type": "LineString", "coordinates": [[200.0, 95.0], [1.0, 1.0]]}}]
        });
        match extract_route(&raw(body)).unwrap_err() {
            ProviderError::MalformedResponse { reason, .. } => {
                assert!(reason.contains("coordinate 0 out of range"), "{reason}");
            }
            other => panic!("unexpected error variant: {:?}", other),
        }
    }

    #[test]
    fn degenerate_linestrings_are_malformed() {
        for coordinates in [json!([]), json!([[1.0, 2.0]])] {
            let body = json!({
                "features": [{"geometry": {"type": "LineString", "coordinates": coordinates}}]
            });
            match extract_route(&raw(body)).unwrap_err() {
                ProviderError::MalformedResponse { reason, .. } => {
                    assert!(reason.contains("fewer than 2 positions"), "{reason}");
                }
                other => panic!("unexpected error variant: {:?}", other),
            }
        }
    }
}
