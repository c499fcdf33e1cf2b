//! Database schema, migrations and sample data.

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS incidents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            description TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            severity TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            reporter_name TEXT,
            image_path TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_incidents_timestamp ON incidents(timestamp);
        CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents(status);
        CREATE INDEX IF NOT EXISTS idx_incidents_type ON incidents(type);",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Format used for every timestamp this crate writes.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `(type, description, latitude, longitude, severity, status, age)`
type Sample = (&'static str, &'static str, f64, f64, &'static str, &'static str, Duration);

fn samples() -> [Sample; 8] {
    [
        ("traffic_accident", "Minor collision at main entrance", 40.7589, -73.9851, "medium", "active", Duration::hours(2)),
        ("broken_facility", "Broken water fountain in library", 40.7599, -73.9841, "low", "resolved", Duration::hours(4)),
        ("campus_activity", "Student concert at main quad", 40.7579, -73.9861, "low", "active", Duration::hours(1)),
        ("road_block", "Construction blocking north entrance", 40.7605, -73.9835, "high", "active", Duration::hours(6)),
        ("noise", "Loud construction work near dormitory", 40.7585, -73.9875, "medium", "active", Duration::minutes(30)),
        ("maintenance", "Elevator maintenance in science building", 40.7595, -73.9845, "low", "active", Duration::hours(3)),
        ("security", "Suspicious activity reported near parking lot", 40.7575, -73.9855, "high", "resolved", Duration::hours(8)),
        ("traffic_jam", "Heavy traffic during peak hours", 40.7580, -73.9870, "medium", "resolved", Duration::hours(5)),
    ]
}

/// Insert the sample campus incidents, timestamped relative to `now`, if the
/// table is empty. Returns the number of rows inserted.
pub fn seed_sample_data(conn: &mut Connection, now: DateTime<Utc>) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    let samples = samples();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO incidents (type, description, latitude, longitude, severity, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (kind, description, lat, lng, severity, status, age) in &samples {
            stmt.execute(params![
                kind,
                description,
                lat,
                lng,
                severity,
                status,
                format_timestamp(now - *age)
            ])?;
        }
    }
    tx.commit()?;

    info!(rows = samples.len(), "seeded sample incidents");
    Ok(samples.len())
}
