//! Coordinate screening and planar helpers.

use serde::Serialize;
use tracing::warn;

use crate::incident::Incident;

/// A `{lat, lng}` pair as rendered by the map front-end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Split incidents into those with usable coordinates and a count of the rest.
///
/// Records with NaN or out-of-range coordinates are dropped here so that no
/// spatial component ever sees them.
pub fn split_valid<'a, I>(incidents: I) -> (Vec<&'a Incident>, usize)
where
    I: IntoIterator<Item = &'a Incident>,
{
    let mut valid = Vec::new();
    let mut excluded = 0;
    for incident in incidents {
        match incident.location.validate() {
            Ok(()) => valid.push(incident),
            Err(e) => {
                warn!(id = incident.id, error = %e, "excluding incident from spatial analysis");
                excluded += 1;
            }
        }
    }
    (valid, excluded)
}

/// Arithmetic mean of `[lat, lng]` pairs. Planar on purpose: clusters are a
/// few hundred meters across.
pub fn mean_center<'a, I>(coords: I) -> Option<LatLng>
where
    I: IntoIterator<Item = &'a [f64; 2]>,
{
    let (mut lat, mut lng, mut n) = (0.0, 0.0, 0usize);
    for c in coords {
        lat += c[0];
        lng += c[1];
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(LatLng {
        lat: lat / n as f64,
        lng: lng / n as f64,
    })
}
