//! Headline counts for the dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::incident::{Incident, Severity, Status};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    /// Incidents strictly newer than `now - recent_window`.
    pub recent_24h: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

pub fn summarize(incidents: &[Incident], now: DateTime<Utc>, recent_window: Duration) -> Summary {
    let cutoff = now - recent_window;
    let mut summary = Summary {
        total: incidents.len(),
        ..Summary::default()
    };
    for incident in incidents {
        match incident.status {
            Status::Active => summary.active += 1,
            Status::Resolved => summary.resolved += 1,
        }
        if incident.timestamp > cutoff {
            summary.recent_24h += 1;
        }
        *summary.by_type.entry(incident.kind.clone()).or_insert(0) += 1;
        *summary.by_severity.entry(incident.severity).or_insert(0) += 1;
    }
    summary
}
