//! Incident records -- the read-only input of every analytics computation.

pub mod snapshot;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::snapshot::{IncidentFilter, MemorySnapshot, ProviderError, Snapshot, SnapshotProvider};

/// Severity levels for reported incidents, ordered from least to most severe.
///
/// `Unrecognized` only ever comes out of storage for legacy rows carrying a
/// label outside the known set; the API refuses to write it. All such labels
/// share the single `"unrecognized"` key in severity histograms
/// (`severity_distribution`, `by_severity`); the raw label is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Unrecognized,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unrecognized => "unrecognized",
        }
    }

    /// Lenient decoding for stored labels: anything unknown maps to `Unrecognized`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Severity::Unrecognized)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(ValidationError::InvalidValue {
                field: "severity",
                reason: format!("`{s}` is not one of low, medium, high, critical"),
            }),
        }
    }
}

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Resolved,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "resolved" => Ok(Status::Resolved),
            _ => Err(ValidationError::InvalidValue {
                field: "status",
                reason: format!("`{s}` is not one of active, resolved"),
            }),
        }
    }
}

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Range check; NaN fails both bounds.
    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CoordinateError::Latitude(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CoordinateError::Longitude(self.longitude));
        }
        Ok(())
    }

    /// geo uses x = longitude, y = latitude.
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// A reported incident as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub severity: Severity,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub location: Location,
    pub reporter_name: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("No valid fields to update")]
    NothingToUpdate,
}

/// Request body for reporting a new incident. Every field is optional at the
/// wire level so missing ones can be reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentDraft {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub severity: Option<String>,
    pub reporter_name: Option<String>,
    pub image_path: Option<String>,
}

/// A validated incident ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub kind: String,
    pub description: String,
    pub location: Location,
    pub severity: Severity,
    pub reporter_name: String,
    pub image_path: Option<String>,
}

impl TryFrom<IncidentDraft> for NewIncident {
    type Error = ValidationError;

    fn try_from(draft: IncidentDraft) -> Result<Self, Self::Error> {
        let kind = draft.kind.ok_or(ValidationError::MissingField("type"))?;
        let description = draft
            .description
            .ok_or(ValidationError::MissingField("description"))?;
        let latitude = draft
            .latitude
            .ok_or(ValidationError::MissingField("latitude"))?;
        let longitude = draft
            .longitude
            .ok_or(ValidationError::MissingField("longitude"))?;
        let severity: Severity = draft
            .severity
            .ok_or(ValidationError::MissingField("severity"))?
            .parse()?;

        if kind.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "type",
                reason: "must not be empty".to_string(),
            });
        }

        let location = Location::new(latitude, longitude);
        location
            .validate()
            .map_err(|e| ValidationError::InvalidValue {
                field: "location",
                reason: e.to_string(),
            })?;

        Ok(Self {
            kind,
            description,
            location,
            severity,
            reporter_name: draft
                .reporter_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Anonymous".to_string()),
            image_path: draft.image_path,
        })
    }
}

/// Request body for `PUT /api/incidents/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentPatch {
    pub status: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
}

/// A validated, non-empty partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentUpdate {
    pub status: Option<Status>,
    pub severity: Option<Severity>,
    pub description: Option<String>,
}

impl TryFrom<IncidentPatch> for IncidentUpdate {
    type Error = ValidationError;

    fn try_from(patch: IncidentPatch) -> Result<Self, Self::Error> {
        let update = Self {
            status: patch.status.as_deref().map(str::parse::<Status>).transpose()?,
            severity: patch
                .severity
                .as_deref()
                .map(str::parse::<Severity>)
                .transpose()?,
            description: patch.description,
        };
        if update.status.is_none() && update.severity.is_none() && update.description.is_none() {
            return Err(ValidationError::NothingToUpdate);
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> IncidentDraft {
        IncidentDraft {
            kind: Some("noise".to_string()),
            description: Some("Loud construction work near dormitory".to_string()),
            latitude: Some(40.7585),
            longitude: Some(-73.9875),
            severity: Some("medium".to_string()),
            reporter_name: None,
            image_path: None,
        }
    }

    #[test]
    fn test_severity_parsing_is_strict_but_decoding_is_lenient() {
        assert_eq!("High".parse::<Severity>().unwrap(), Severity::High);
        assert!("severe".parse::<Severity>().is_err());
        assert_eq!(Severity::from_label("severe"), Severity::Unrecognized);
        assert_eq!(Severity::from_label("critical"), Severity::Critical);
    }

    #[test]
    fn test_location_validation() {
        assert!(Location::new(40.0, -73.0).validate().is_ok());
        assert_eq!(
            Location::new(200.0, 0.0).validate(),
            Err(CoordinateError::Latitude(200.0))
        );
        assert_eq!(
            Location::new(0.0, -181.0).validate(),
            Err(CoordinateError::Longitude(-181.0))
        );
        assert!(Location::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_draft_defaults_reporter_name() {
        let incident = NewIncident::try_from(draft()).unwrap();
        assert_eq!(incident.reporter_name, "Anonymous");
        assert_eq!(incident.severity, Severity::Medium);
    }

    #[test]
    fn test_draft_reports_first_missing_field() {
        let mut d = draft();
        d.latitude = None;
        assert_eq!(
            NewIncident::try_from(d).unwrap_err(),
            ValidationError::MissingField("latitude")
        );
        assert_eq!(
            ValidationError::MissingField("latitude").to_string(),
            "Missing field: latitude"
        );
    }

    #[test]
    fn test_draft_rejects_out_of_range_location() {
        let mut d = draft();
        d.latitude = Some(95.0);
        assert!(matches!(
            NewIncident::try_from(d),
            Err(ValidationError::InvalidValue { field: "location", .. })
        ));
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        assert_eq!(
            IncidentUpdate::try_from(IncidentPatch::default()).unwrap_err(),
            ValidationError::NothingToUpdate
        );
        let update = IncidentUpdate::try_from(IncidentPatch {
            status: Some("resolved".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(update.status, Some(Status::Resolved));
    }

    #[test]
    fn test_incident_serializes_flat_location() {
        let incident = Incident {
            id: 7,
            kind: "noise".to_string(),
            description: "d".to_string(),
            severity: Severity::Low,
            status: Status::Active,
            timestamp: DateTime::parse_from_rfc3339("2026-10-01T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            location: Location::new(1.5, 2.5),
            reporter_name: None,
            image_path: None,
        };
        let json = serde_json::to_value(&incident).unwrap();
        assert_eq!(json["type"], "noise");
        assert_eq!(json["latitude"], 1.5);
        assert_eq!(json["longitude"], 2.5);
        assert_eq!(json["severity"], "low");
        assert_eq!(json["status"], "active");
    }
}
