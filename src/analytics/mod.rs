//! Spatial and temporal analytics over incident snapshots.
//!
//! Every computation is a pure function of one snapshot; [`engine`] is the
//! only part that talks to a [`SnapshotProvider`](crate::incident::SnapshotProvider).

pub mod buffer;
pub mod cluster;
pub mod engine;
pub mod geometry;
pub mod heatmap;
pub mod summary;
pub mod trends;
pub mod weighting;

use thiserror::Error;

use crate::incident::ProviderError;

pub use self::engine::AnalyticsEngine;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error(transparent)]
    ProviderUnavailable(#[from] ProviderError),
}

/// An analytics result plus the number of input records that were skipped
/// (undecodable rows from the provider and incidents with unusable
/// coordinates).
#[derive(Debug, Clone, PartialEq)]
pub struct Report<T> {
    pub body: T,
    pub skipped: usize,
}

impl<T> Report<T> {
    pub fn new(body: T, skipped: usize) -> Self {
        Self { body, skipped }
    }
}
