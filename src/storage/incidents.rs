//! SQLite-backed incident store.
//!
//! Reads tolerate legacy or hand-edited rows: a row whose status, timestamp
//! or coordinates cannot be decoded is logged, skipped and counted in the
//! snapshot instead of failing the whole query.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{schema, Pool};
use crate::incident::{
    Incident, IncidentFilter, IncidentUpdate, Location, NewIncident, ProviderError, Severity,
    Snapshot, SnapshotProvider, Status, ValidationError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Incident not found")]
    NotFound(i64),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] ProviderError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(ProviderError::Query(e))
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Backend(ProviderError::Pool(e))
    }
}

/// Why a stored row could not become an [`Incident`].
#[derive(Debug, Error)]
enum DecodeError {
    #[error("column `{column}` holds {found}")]
    Column {
        column: &'static str,
        found: &'static str,
    },
    #[error("unparseable timestamp `{0}`")]
    Timestamp(String),
    #[error("unknown status `{0}`")]
    Status(String),
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Integer(_) => "an integer",
        Value::Real(_) => "a real",
        Value::Text(_) => "text",
        Value::Blob(_) => "a blob",
    }
}

fn text(column: &'static str, value: Value) -> Result<String, DecodeError> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(DecodeError::Column {
            column,
            found: type_name(&other),
        }),
    }
}

fn optional_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

fn degrees(column: &'static str, value: Value) -> Result<f64, DecodeError> {
    match value {
        Value::Real(v) => Ok(v),
        Value::Integer(v) => Ok(v as f64),
        other => Err(DecodeError::Column {
            column,
            found: type_name(&other),
        }),
    }
}

/// Accepts RFC 3339 and SQLite's own `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

const INCIDENT_COLUMNS: &str =
    "id, type, description, latitude, longitude, severity, status, timestamp, reporter_name, image_path";

/// Column values as SQLite returned them, before any interpretation.
struct RawIncident {
    id: i64,
    values: [Value; 9],
}

impl RawIncident {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            values: [
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ],
        })
    }

    fn decode(self) -> Result<Incident, DecodeError> {
        let [kind, description, latitude, longitude, severity, status, timestamp, reporter, image] =
            self.values;

        let status = text("status", status)?;
        let status = status
            .parse::<Status>()
            .map_err(|_| DecodeError::Status(status))?;
        let timestamp = text("timestamp", timestamp)?;
        let timestamp =
            parse_timestamp(&timestamp).ok_or(DecodeError::Timestamp(timestamp))?;

        Ok(Incident {
            id: self.id,
            kind: text("type", kind)?,
            description: optional_text(description).unwrap_or_default(),
            severity: optional_text(severity)
                .map(|label| Severity::from_label(&label))
                .unwrap_or(Severity::Unrecognized),
            status,
            timestamp,
            location: Location::new(degrees("latitude", latitude)?, degrees("longitude", longitude)?),
            reporter_name: optional_text(reporter),
            image_path: optional_text(image),
        })
    }
}

/// Incident persistence over an r2d2 SQLite pool.
#[derive(Clone)]
pub struct IncidentStore {
    pool: Pool,
}

impl IncidentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Insert a validated incident as `active`, timestamped now.
    pub fn create(&self, incident: &NewIncident) -> Result<i64, StoreError> {
        self.create_at(incident, Utc::now())
    }

    pub fn create_at(&self, incident: &NewIncident, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO incidents
                (type, description, latitude, longitude, severity, status, timestamp, reporter_name, image_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                incident.kind,
                incident.description,
                incident.location.latitude,
                incident.location.longitude,
                incident.severity.as_str(),
                Status::Active.as_str(),
                schema::format_timestamp(now),
                incident.reporter_name,
                incident.image_path,
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(id, kind = %incident.kind, severity = %incident.severity, "incident created");
        Ok(id)
    }

    /// Apply a partial update. Fails with [`StoreError::NotFound`] when no
    /// row has `id`.
    pub fn update(&self, id: i64, update: &IncidentUpdate) -> Result<(), StoreError> {
        let mut assignments = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(status) = update.status {
            assignments.push("status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(severity) = update.severity {
            assignments.push("severity = ?");
            args.push(Value::Text(severity.as_str().to_string()));
        }
        if let Some(description) = &update.description {
            assignments.push("description = ?");
            args.push(Value::Text(description.clone()));
        }
        if assignments.is_empty() {
            return Err(ValidationError::NothingToUpdate.into());
        }
        args.push(Value::Integer(id));

        let sql = format!("UPDATE incidents SET {} WHERE id = ?", assignments.join(", "));
        let conn = self.pool.get()?;
        let changed = conn.execute(&sql, params_from_iter(args))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!(id, fields = assignments.len(), "incident updated");
        Ok(())
    }

    /// Seed the sample campus incidents if the table is empty.
    pub fn seed_if_empty(&self) -> anyhow::Result<usize> {
        let mut conn = self.pool.get()?;
        schema::seed_sample_data(&mut conn, Utc::now())
    }

    fn query(&self, filter: &IncidentFilter) -> Result<Snapshot, ProviderError> {
        let mut sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();

        // Labels are compared the way row decoding normalizes them.
        if let Some(status) = filter.status {
            sql.push_str(" AND lower(trim(status)) = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND lower(trim(severity)) = ?");
            args.push(Value::Text(severity.as_str().to_string()));
        }
        if let Some(kind) = &filter.kind {
            sql.push_str(" AND type = ?");
            args.push(Value::Text(kind.clone()));
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND julianday(timestamp) > julianday(?)");
            args.push(Value::Text(schema::format_timestamp(since)));
        }
        sql.push_str(" ORDER BY julianday(timestamp) DESC, id DESC LIMIT ?");
        args.push(Value::Integer(
            filter.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)),
        ));

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), RawIncident::from_row)?;

        let mut incidents = Vec::new();
        let mut skipped = 0;
        for row in rows {
            let raw = row?;
            let id = raw.id;
            match raw.decode() {
                Ok(incident) => incidents.push(incident),
                Err(e) => {
                    warn!(id, error = %e, "skipping undecodable incident row");
                    skipped += 1;
                }
            }
        }
        debug!(rows = incidents.len(), skipped, "incident query complete");
        Ok(Snapshot { incidents, skipped })
    }
}

impl SnapshotProvider for IncidentStore {
    fn fetch_incidents(&self, filter: &IncidentFilter) -> Result<Snapshot, ProviderError> {
        self.query(filter)
    }
}
