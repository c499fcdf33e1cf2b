//! Severity-weighted heatmap points for active incidents.

use serde::Serialize;

use super::geometry::split_valid;
use super::weighting;
use crate::incident::{Incident, Status};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lng: f64,
    pub weight: u32,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One point per active incident with valid coordinates. Points at equal
/// coordinates are not merged; the renderer sums them.
///
/// Returns the points and the number of active incidents excluded for bad
/// coordinates.
pub fn build(incidents: &[Incident]) -> (Vec<HeatmapPoint>, usize) {
    let (valid, excluded) = split_valid(incidents.iter().filter(|i| i.status == Status::Active));
    let points = valid
        .into_iter()
        .map(|i| HeatmapPoint {
            lat: i.location.latitude,
            lng: i.location.longitude,
            weight: weighting::weight(i.severity),
            kind: i.kind.clone(),
        })
        .collect();
    (points, excluded)
}
