//! Snapshot provider interface.
//!
//! Analytics never hold a database handle. Each computation asks a
//! [`SnapshotProvider`] once for an immutable [`Snapshot`] matching an
//! [`IncidentFilter`], and works only on that.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Incident, Severity, Status};

/// Parameterized selection of incidents. `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentFilter {
    pub status: Option<Status>,
    pub severity: Option<Severity>,
    pub kind: Option<String>,
    /// Exclusive lower bound on `timestamp`.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl IncidentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-memory equivalent of the SQL predicate (limit excluded).
    pub fn matches(&self, incident: &Incident) -> bool {
        self.status.is_none_or(|s| incident.status == s)
            && self.severity.is_none_or(|s| incident.severity == s)
            && self.kind.as_deref().is_none_or(|k| incident.kind == k)
            && self.since.is_none_or(|t| incident.timestamp > t)
    }
}

/// Point-in-time set of incidents plus the number of records the provider
/// had to drop because they could not be decoded.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub incidents: Vec<Incident>,
    pub skipped: usize,
}

impl Snapshot {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self {
            incidents,
            skipped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("incident store unreachable: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("incident query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("incident source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only source of incident snapshots. Called once per computation;
/// callers never retry or cache.
pub trait SnapshotProvider: Send + Sync {
    /// Return incidents matching `filter`, most recent first.
    fn fetch_incidents(&self, filter: &IncidentFilter) -> Result<Snapshot, ProviderError>;
}

/// A fixed, in-memory incident set. Useful for tests and for embedding the
/// engine without a database.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    incidents: Vec<Incident>,
}

impl MemorySnapshot {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self { incidents }
    }
}

impl SnapshotProvider for MemorySnapshot {
    fn fetch_incidents(&self, filter: &IncidentFilter) -> Result<Snapshot, ProviderError> {
        let mut incidents: Vec<Incident> = self
            .incidents
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            incidents.truncate(limit);
        }
        Ok(Snapshot::new(incidents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Location;
    use chrono::Duration;

    fn incident(id: i64, status: Status, severity: Severity, hours_ago: i64) -> Incident {
        Incident {
            id,
            kind: if id % 2 == 0 { "noise" } else { "security" }.to_string(),
            description: format!("incident {id}"),
            severity,
            status,
            timestamp: Utc::now() - Duration::hours(hours_ago),
            location: Location::new(40.758, -73.985),
            reporter_name: None,
            image_path: None,
        }
    }

    #[test]
    fn test_memory_snapshot_filters_and_orders() {
        let provider = MemorySnapshot::new(vec![
            incident(1, Status::Active, Severity::High, 5),
            incident(2, Status::Resolved, Severity::High, 1),
            incident(3, Status::Active, Severity::Low, 2),
            incident(4, Status::Active, Severity::High, 1),
        ]);

        let snapshot = provider
            .fetch_incidents(&IncidentFilter::all().with_status(Status::Active))
            .unwrap();
        let ids: Vec<i64> = snapshot.incidents.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 3, 1]);
        assert_eq!(snapshot.skipped, 0);

        let snapshot = provider
            .fetch_incidents(
                &IncidentFilter::all()
                    .with_status(Status::Active)
                    .with_severity(Severity::High)
                    .with_limit(1),
            )
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.incidents[0].id, 4);
    }

    #[test]
    fn test_since_is_exclusive() {
        let base = incident(1, Status::Active, Severity::Low, 0);
        let filter = IncidentFilter::all().since(base.timestamp);
        assert!(!filter.matches(&base));
        let filter = IncidentFilter::all().since(base.timestamp - Duration::seconds(1));
        assert!(filter.matches(&base));
    }

    #[test]
    fn test_kind_filter() {
        let filter = IncidentFilter::all().with_kind("noise");
        assert!(filter.matches(&incident(2, Status::Active, Severity::Low, 0)));
        assert!(!filter.matches(&incident(3, Status::Active, Severity::Low, 0)));
    }
}
