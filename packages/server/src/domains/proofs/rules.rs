//! Deterministic checks for photo proofs.
//!
//! Hard failures reject the submission outright; soft flags send the proof to
//! a human reviewer.
//!
//! Metadata keys read here:
//! - `exif_timestamp`: RFC 3339, EXIF `YYYY:MM:DD HH:MM:SS` (UTC) or UNIX seconds
//! - `gps_lat` / `gps_lng` (or `gps: {lat, lng}`): decimal degrees
//! - `source`: `camera` or `app`

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};

use crate::common::utils::geo::{haversine_m, GeoPoint};
use crate::common::{AppError, AppResult};
use crate::domains::milestones::models::Milestone;

/// Photos older or newer than this relative to now are rejected.
pub const MAX_EXIF_SKEW_MINUTES: i64 = 120;

pub const TRUSTED_SOURCES: [&str; 2] = ["camera", "app"];

pub const FLAG_UNTRUSTED_SOURCE: &str = "UNTRUSTED_SOURCE";
pub const FLAG_MISSING_METADATA: &str = "MISSING_METADATA";

/// Run the photo rules. Returns the soft flags raised.
pub fn evaluate_photo(
    metadata: &Map<String, JsonValue>,
    milestone: &Milestone,
    now: DateTime<Utc>,
) -> AppResult<Vec<String>> {
    check_freshness(metadata, now)?;

    if let Some(fence) = milestone.geofence() {
        let point = gps_point(metadata).ok_or_else(|| {
            AppError::validation("MISSING_GPS", "photo has no GPS coordinates")
        })?;
        let distance = haversine_m(fence.center, point);
        if distance > fence.radius_m {
            return Err(AppError::validation(
                "GEOFENCE_VIOLATION",
                format!(
                    "photo taken {:.1} m from the site, allowed radius is {:.1} m",
                    distance, fence.radius_m
                ),
            ));
        }
    }

    let mut flags = Vec::new();
    match metadata.get("source").and_then(JsonValue::as_str).map(str::trim) {
        None | Some("") => push_flag(&mut flags, FLAG_MISSING_METADATA),
        Some(source) => {
            let source = source.to_ascii_lowercase();
            if !TRUSTED_SOURCES.contains(&source.as_str()) {
                push_flag(&mut flags, FLAG_UNTRUSTED_SOURCE);
            }
        }
    }

    let missing_required = milestone
        .required_metadata_keys()
        .iter()
        .any(|key| metadata.get(key).map_or(true, JsonValue::is_null));
    if missing_required {
        push_flag(&mut flags, FLAG_MISSING_METADATA);
    }

    Ok(flags)
}

fn push_flag(flags: &mut Vec<String>, flag: &str) {
    if !flags.iter().any(|f| f == flag) {
        flags.push(flag.to_string());
    }
}

fn check_freshness(metadata: &Map<String, JsonValue>, now: DateTime<Utc>) -> AppResult<()> {
    let taken_at = metadata
        .get("exif_timestamp")
        .and_then(parse_exif_timestamp)
        .ok_or_else(|| {
            AppError::validation(
                "TIME_SKEW_OR_MISSING_EXIF",
                "photo has no readable EXIF timestamp",
            )
        })?;

    let skew_seconds = (now - taken_at).num_seconds().abs();
    if skew_seconds >= Duration::minutes(MAX_EXIF_SKEW_MINUTES).num_seconds() {
        return Err(AppError::validation(
            "TIME_SKEW_OR_MISSING_EXIF",
            format!(
                "photo timestamp is {} minutes away from now",
                skew_seconds / 60
            ),
        ));
    }
    Ok(())
}

/// Parse the formats cameras and upload apps actually send.
pub fn parse_exif_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        _ => None,
    }
}

/// GPS position from flat `gps_lat`/`gps_lng` or a nested `gps` object.
pub fn gps_point(metadata: &Map<String, JsonValue>) -> Option<GeoPoint> {
    let (lat, lng) = match metadata.get("gps").and_then(JsonValue::as_object) {
        Some(gps) => (gps.get("lat"), gps.get("lng")),
        None => (metadata.get("gps_lat"), metadata.get("gps_lng")),
    };
    let point = GeoPoint::new(coordinate(lat?)?, coordinate(lng?)?);
    point.is_valid().then_some(point)
}

fn coordinate(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{EscrowId, MilestoneId, Money};
    use crate::domains::milestones::models::MilestoneStatus;
    use crate::domains::proofs::models::ProofKind;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn milestone(geofence: Option<(f64, f64, f64)>, requirements: Option<JsonValue>) -> Milestone {
        Milestone {
            id: MilestoneId::new(1),
            escrow_id: EscrowId::new(1),
            idx: 1,
            label: "Roof".to_string(),
            amount: Money::from_cents(100_00),
            proof_kind: ProofKind::Photo,
            validator: "rules".to_string(),
            status: MilestoneStatus::Waiting,
            geofence_lat: geofence.map(|g| g.0),
            geofence_lng: geofence.map(|g| g.1),
            geofence_radius_m: geofence.map(|g| g.2),
            proof_requirements: requirements,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn metadata(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_clean_photo_has_no_flags() {
        let md = metadata(json!({
            "exif_timestamp": "2026-05-01T11:30:00Z",
            "gps_lat": 5.6037,
            "gps_lng": -0.1870,
            "source": "camera"
        }));
        let flags = evaluate_photo(&md, &milestone(Some((5.6037, -0.1870, 100.0)), None), now()).unwrap();
        assert!(flags.is_empty());
    }

    #[test]
    fn test_exif_skew_boundary() {
        let ms = milestone(None, None);
        let just_inside = metadata(json!({"exif_timestamp": "2026:05:01 10:00:01", "source": "app"}));
        assert!(evaluate_photo(&just_inside, &ms, now()).is_ok());

        let exactly = metadata(json!({"exif_timestamp": "2026:05:01 10:00:00", "source": "app"}));
        let err = evaluate_photo(&exactly, &ms, now()).unwrap_err();
        assert!(err.is_code("TIME_SKEW_OR_MISSING_EXIF"));

        let future = metadata(json!({"exif_timestamp": "2026-05-01T14:00:00Z", "source": "app"}));
        assert!(evaluate_photo(&future, &ms, now()).is_err());
    }

    #[test]
    fn test_missing_exif_is_hard_failure() {
        let md = metadata(json!({"source": "camera"}));
        let err = evaluate_photo(&md, &milestone(None, None), now()).unwrap_err();
        assert!(err.is_code("TIME_SKEW_OR_MISSING_EXIF"));
    }

    #[test]
    fn test_geofence_rules() {
        let ms = milestone(Some((0.0, 0.0, 1000.0)), None);

        let no_gps = metadata(json!({"exif_timestamp": "2026-05-01T12:00:00Z", "source": "camera"}));
        assert!(evaluate_photo(&no_gps, &ms, now()).unwrap_err().is_code("MISSING_GPS"));

        // ~1.1 km north of the centre
        let far = metadata(json!({
            "exif_timestamp": "2026-05-01T12:00:00Z",
            "gps": {"lat": 0.01, "lng": 0.0},
            "source": "camera"
        }));
        assert!(evaluate_photo(&far, &ms, now()).unwrap_err().is_code("GEOFENCE_VIOLATION"));

        let near = metadata(json!({
            "exif_timestamp": "2026-05-01T12:00:00Z",
            "gps_lat": "0.005",
            "gps_lng": "0.0",
            "source": "camera"
        }));
        assert!(evaluate_photo(&near, &ms, now()).is_ok());
    }

    #[test]
    fn test_geofence_boundary_is_inside() {
        let point = GeoPoint::new(0.005, 0.0);
        let radius = haversine_m(GeoPoint::new(0.0, 0.0), point);
        let ms = milestone(Some((0.0, 0.0, radius)), None);
        let md = metadata(json!({
            "exif_timestamp": "2026-05-01T12:00:00Z",
            "gps_lat": 0.005,
            "gps_lng": 0.0,
            "source": "camera"
        }));
        assert!(evaluate_photo(&md, &ms, now()).is_ok());
    }

    #[test]
    fn test_soft_flags() {
        let ms = milestone(None, Some(json!({"required_keys": ["device"]})));

        let untrusted = metadata(json!({"exif_timestamp": 1777636800, "source": "whatsapp"}));
        let flags = evaluate_photo(&untrusted, &ms, now()).unwrap();
        assert_eq!(flags, vec![FLAG_UNTRUSTED_SOURCE, FLAG_MISSING_METADATA]);

        let no_source = metadata(json!({"exif_timestamp": 1777636800, "device": "Pixel 8"}));
        let flags = evaluate_photo(&no_source, &ms, now()).unwrap();
        assert_eq!(flags, vec![FLAG_MISSING_METADATA]);
    }
}
