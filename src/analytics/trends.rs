//! Daily and hour-of-day incident histograms.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::ser::{Serialize, Serializer};

use crate::incident::Incident;

/// Counts per incident type for one UTC calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTrendBucket {
    pub date: NaiveDate,
    pub counts: BTreeMap<String, usize>,
}

/// Daily buckets, most recent date first. Serializes as
/// `{"YYYY-MM-DD": {type: count}}` preserving that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTrends(pub Vec<DailyTrendBucket>);

impl DailyTrends {
    pub fn buckets(&self) -> &[DailyTrendBucket] {
        &self.0
    }

    pub fn total(&self) -> usize {
        self.0.iter().flat_map(|b| b.counts.values()).sum()
    }
}

impl Serialize for DailyTrends {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|b| (b.date.format("%Y-%m-%d").to_string(), &b.counts)),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Trends {
    pub daily_trends: DailyTrends,
    /// Hour of day (UTC) to count. Hours without incidents are absent.
    pub hourly_distribution: BTreeMap<u32, usize>,
}

/// Build both histograms in one pass.
///
/// The daily histogram only counts incidents with `now - window < timestamp`;
/// the hourly one covers all history.
pub fn aggregate(incidents: &[Incident], now: DateTime<Utc>, window: Duration) -> Trends {
    let cutoff = now - window;
    let mut daily: BTreeMap<NaiveDate, BTreeMap<String, usize>> = BTreeMap::new();
    let mut hourly: BTreeMap<u32, usize> = BTreeMap::new();

    for incident in incidents {
        *hourly.entry(incident.timestamp.hour()).or_insert(0) += 1;

        if incident.timestamp > cutoff {
            *daily
                .entry(incident.timestamp.date_naive())
                .or_default()
                .entry(incident.kind.clone())
                .or_insert(0) += 1;
        }
    }

    Trends {
        daily_trends: DailyTrends(
            daily
                .into_iter()
                .rev()
                .map(|(date, counts)| DailyTrendBucket { date, counts })
                .collect(),
        ),
        hourly_distribution: hourly,
    }
}
