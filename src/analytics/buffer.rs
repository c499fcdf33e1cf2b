//! Proximity buffers around high-priority active incidents.
//!
//! Each buffer is a ring of `segments` vertices placed with the haversine
//! direct problem on a sphere of mean Earth radius. Against the WGS84
//! ellipsoid the great-circle distance to any vertex is off by at most about
//! 0.5 % of the requested radius, which is well below the accuracy of a
//! phone-reported incident location.

use geo::{Destination, Haversine, LineString, Point, Polygon};
use serde::{Serialize, Serializer};

use super::geometry::split_valid;
use super::{weighting, AnalyticsError};
use crate::incident::{Incident, Status};

pub const DEFAULT_SEGMENTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Buffer {
    #[serde(rename = "id")]
    pub incident_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// `[lat, lng]`.
    pub center: [f64; 2],
    #[serde(rename = "buffer", serialize_with = "serialize_polygon")]
    pub polygon: Polygon<f64>,
    /// Meters.
    pub radius: f64,
}

fn serialize_polygon<S: Serializer>(polygon: &Polygon<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    geojson::Geometry::new(geojson::Value::from(polygon)).serialize(serializer)
}

pub fn validate_distance(distance: f64) -> Result<f64, AnalyticsError> {
    if distance.is_finite() && distance > 0.0 {
        Ok(distance)
    } else {
        Err(AnalyticsError::InvalidParameter {
            name: "distance",
            reason: format!("must be a positive number of meters, got {distance}"),
        })
    }
}

/// Closed polygon approximating all points within `radius_m` of `center`.
/// Vertex `k` sits at bearing `360 * k / segments` degrees.
pub fn circle(center: Point<f64>, radius_m: f64, segments: usize) -> Polygon<f64> {
    let ring: Vec<_> = (0..segments)
        .map(|k| {
            let bearing = 360.0 * k as f64 / segments as f64;
            Haversine.destination(center, bearing, radius_m).0
        })
        .collect();
    // Polygon::new closes the ring.
    Polygon::new(LineString::new(ring), vec![])
}

/// One buffer per active high or critical incident with valid coordinates.
///
/// Returns the buffers and the number of qualifying incidents excluded for
/// bad coordinates.
pub fn build(
    incidents: &[Incident],
    distance: f64,
    segments: usize,
) -> Result<(Vec<Buffer>, usize), AnalyticsError> {
    let distance = validate_distance(distance)?;
    if segments < 3 {
        return Err(AnalyticsError::InvalidParameter {
            name: "segments",
            reason: format!("a ring needs at least 3 vertices, got {segments}"),
        });
    }

    let (valid, excluded) = split_valid(
        incidents
            .iter()
            .filter(|i| i.status == Status::Active && weighting::is_high_priority(i.severity)),
    );

    let buffers = valid
        .into_iter()
        .map(|i| Buffer {
            incident_id: i.id,
            kind: i.kind.clone(),
            description: i.description.clone(),
            center: [i.location.latitude, i.location.longitude],
            polygon: circle(i.location.to_point(), distance, segments),
            radius: distance,
        })
        .collect();
    Ok((buffers, excluded))
}
