//! Density-based spatial clustering (DBSCAN) of incident locations.
//!
//! Distances are Euclidean in degree space, matching how `eps` is configured
//! (0.001 degrees is roughly 100 m at mid-latitudes). Neighborhood queries go
//! through an R-tree so a region query does not scan every point.
//!
//! Points are visited in input order and neighbor lists are expanded in
//! ascending index order, so for a given input ordering both membership and
//! id numbering are reproducible. A border point reachable from two clusters
//! joins whichever reaches it first.

use std::collections::{BTreeMap, VecDeque};

use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::Serialize;
use tracing::debug;

use super::geometry::{mean_center, split_valid, LatLng};
use super::AnalyticsError;
use crate::incident::{Incident, Severity};

pub const INSUFFICIENT_DATA_MESSAGE: &str = "Not enough data for clustering";

type IndexedCoord = GeomWithData<[f64; 2], usize>;

/// Per-point clustering outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointLabel {
    Noise,
    Cluster(usize),
}

impl PointLabel {
    pub fn cluster_id(self) -> Option<usize> {
        match self {
            PointLabel::Cluster(id) => Some(id),
            PointLabel::Noise => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    eps: f64,
    min_points: usize,
}

impl Dbscan {
    /// `min_points` counts the point itself.
    pub fn new(eps: f64, min_points: usize) -> Result<Self, AnalyticsError> {
        if !(eps.is_finite() && eps > 0.0) {
            return Err(AnalyticsError::InvalidParameter {
                name: "eps",
                reason: format!("must be a positive finite number, got {eps}"),
            });
        }
        if min_points == 0 {
            return Err(AnalyticsError::InvalidParameter {
                name: "min_points",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self { eps, min_points })
    }

    /// Label every `[lat, lng]` pair.
    pub fn fit(&self, coords: &[[f64; 2]]) -> Vec<PointLabel> {
        let tree: RTree<IndexedCoord> = RTree::bulk_load(
            coords
                .iter()
                .enumerate()
                .map(|(i, c)| IndexedCoord::new(*c, i))
                .collect(),
        );
        let eps_sq = self.eps * self.eps;
        let region = |i: usize| -> Vec<usize> {
            let mut found: Vec<usize> = tree
                .locate_within_distance(coords[i], eps_sq)
                .map(|p| p.data)
                .collect();
            found.sort_unstable();
            found
        };

        let mut labels: Vec<Option<PointLabel>> = vec![None; coords.len()];
        let mut next_id = 0;

        for i in 0..coords.len() {
            if labels[i].is_some() {
                continue;
            }
            let seeds = region(i);
            if seeds.len() < self.min_points {
                labels[i] = Some(PointLabel::Noise);
                continue;
            }

            let id = next_id;
            next_id += 1;
            labels[i] = Some(PointLabel::Cluster(id));

            let mut queue: VecDeque<usize> = seeds.into();
            while let Some(j) = queue.pop_front() {
                match labels[j] {
                    Some(PointLabel::Cluster(_)) => continue,
                    // Previously rejected as a seed: border point, not expanded.
                    Some(PointLabel::Noise) => {
                        labels[j] = Some(PointLabel::Cluster(id));
                        continue;
                    }
                    None => {}
                }
                labels[j] = Some(PointLabel::Cluster(id));
                let reach = region(j);
                if reach.len() >= self.min_points {
                    queue.extend(reach);
                }
            }
        }

        labels
            .into_iter()
            .map(|l| l.unwrap_or(PointLabel::Noise))
            .collect()
    }
}

/// Clustering knobs, normally taken from `[analytics]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    pub eps: f64,
    pub min_points: usize,
    /// Below this many valid points no clustering is attempted.
    pub min_input: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 0.001,
            min_points: 2,
            min_input: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: usize,
    pub center: LatLng,
    #[serde(rename = "count")]
    pub member_count: usize,
    #[serde(rename = "types")]
    pub type_histogram: BTreeMap<String, usize>,
    #[serde(rename = "severity_distribution")]
    pub severity_histogram: BTreeMap<Severity, usize>,
    /// Incident ids, in snapshot order.
    #[serde(skip)]
    pub members: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub clusters: Vec<Cluster>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl ClusterReport {
    fn insufficient() -> Self {
        Self {
            clusters: Vec::new(),
            message: Some(INSUFFICIENT_DATA_MESSAGE),
        }
    }

    pub fn is_insufficient_data(&self) -> bool {
        self.message.is_some()
    }
}

/// Cluster the snapshot. Returns the report and the number of incidents
/// dropped for bad coordinates.
pub fn cluster_incidents(
    incidents: &[Incident],
    params: &ClusterParams,
) -> Result<(ClusterReport, usize), AnalyticsError> {
    let dbscan = Dbscan::new(params.eps, params.min_points)?;
    let (valid, excluded) = split_valid(incidents);

    if valid.len() < params.min_input {
        debug!(points = valid.len(), needed = params.min_input, "too few points to cluster");
        return Ok((ClusterReport::insufficient(), excluded));
    }

    let coords: Vec<[f64; 2]> = valid
        .iter()
        .map(|i| [i.location.latitude, i.location.longitude])
        .collect();
    let labels = dbscan.fit(&coords);

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if let Some(id) = label.cluster_id() {
            groups.entry(id).or_default().push(idx);
        }
    }

    let clusters = groups
        .into_iter()
        .map(|(id, indices)| {
            let mut type_histogram = BTreeMap::new();
            let mut severity_histogram = BTreeMap::new();
            for &idx in &indices {
                *type_histogram.entry(valid[idx].kind.clone()).or_insert(0) += 1;
                *severity_histogram.entry(valid[idx].severity).or_insert(0) += 1;
            }
            let center = mean_center(indices.iter().map(|&idx| &coords[idx]))
                .unwrap_or(LatLng { lat: 0.0, lng: 0.0 });
            Cluster {
                id,
                center,
                member_count: indices.len(),
                type_histogram,
                severity_histogram,
                members: indices.iter().map(|&idx| valid[idx].id).collect(),
            }
        })
        .collect::<Vec<_>>();

    debug!(points = coords.len(), clusters = clusters.len(), "clustering complete");
    Ok((
        ClusterReport {
            clusters,
            message: None,
        },
        excluded,
    ))
}
