//! Entry point tying the snapshot provider to the analyzers.
//!
//! Each method fetches exactly one snapshot, runs exactly one analyzer over
//! it, and reports how many records were skipped along the way. Methods are
//! synchronous; the HTTP layer runs them on the blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::buffer::{self, Buffer};
use super::cluster::{self, ClusterReport};
use super::heatmap::{self, HeatmapPoint};
use super::summary::{self, Summary};
use super::trends::{self, Trends};
use super::{AnalyticsError, Report};
use crate::config::AnalyticsConfig;
use crate::incident::{IncidentFilter, Snapshot, SnapshotProvider, Status};

#[derive(Clone)]
pub struct AnalyticsEngine {
    provider: Arc<dyn SnapshotProvider>,
    config: AnalyticsConfig,
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalyticsEngine {
    pub fn new(provider: Arc<dyn SnapshotProvider>, config: AnalyticsConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    fn snapshot(&self, filter: &IncidentFilter) -> Result<Snapshot, AnalyticsError> {
        let snapshot = self.provider.fetch_incidents(filter)?;
        debug!(
            incidents = snapshot.len(),
            skipped = snapshot.skipped,
            "fetched incident snapshot"
        );
        Ok(snapshot)
    }

    pub fn heatmap(&self) -> Result<Report<Vec<HeatmapPoint>>, AnalyticsError> {
        let snapshot = self.snapshot(&IncidentFilter::all().with_status(Status::Active))?;
        let (points, excluded) = heatmap::build(&snapshot.incidents);
        Ok(Report::new(points, snapshot.skipped + excluded))
    }

    pub fn clusters(&self) -> Result<Report<ClusterReport>, AnalyticsError> {
        let params = self.config.cluster_params();
        let snapshot = self.snapshot(&IncidentFilter::all())?;
        let (report, excluded) = cluster::cluster_incidents(&snapshot.incidents, &params)?;
        Ok(Report::new(report, snapshot.skipped + excluded))
    }

    pub fn trends(&self) -> Result<Report<Trends>, AnalyticsError> {
        self.trends_at(Utc::now())
    }

    /// Trends relative to a fixed `now`.
    pub fn trends_at(&self, now: DateTime<Utc>) -> Result<Report<Trends>, AnalyticsError> {
        let snapshot = self.snapshot(&IncidentFilter::all())?;
        let trends = trends::aggregate(&snapshot.incidents, now, self.config.trend_window());
        Ok(Report::new(trends, snapshot.skipped))
    }

    /// Buffers of `distance` meters. The distance is checked before the
    /// provider is consulted.
    pub fn buffers(&self, distance: f64) -> Result<Report<Vec<Buffer>>, AnalyticsError> {
        let distance = buffer::validate_distance(distance)?;
        let snapshot = self.snapshot(&IncidentFilter::all().with_status(Status::Active))?;
        let (buffers, excluded) =
            buffer::build(&snapshot.incidents, distance, self.config.buffer_segments)?;
        Ok(Report::new(buffers, snapshot.skipped + excluded))
    }

    pub fn summary(&self) -> Result<Report<Summary>, AnalyticsError> {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> Result<Report<Summary>, AnalyticsError> {
        let snapshot = self.snapshot(&IncidentFilter::all())?;
        let summary = summary::summarize(&snapshot.incidents, now, self.config.recent_window());
        Ok(Report::new(summary, snapshot.skipped))
    }
}
