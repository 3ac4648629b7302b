use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::models::{Geofence, Milestone, MilestoneStatus};
use crate::common::utils::geo::GeoPoint;
use crate::common::{AppError, AppResult, EscrowId, MilestoneId, Money};
use crate::domains::proofs::models::ProofKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceInput {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMilestoneRequest {
    pub idx: i32,
    pub label: String,
    pub amount: Money,
    pub proof_kind: String,
    #[serde(default = "default_validator")]
    pub validator: String,
    #[serde(default)]
    pub geofence: Option<GeofenceInput>,
    #[serde(default)]
    pub proof_requirements: Option<JsonValue>,
}

fn default_validator() -> String {
    "rules".to_string()
}

impl CreateMilestoneRequest {
    /// Checks that need no database access. Returns the parsed proof kind and
    /// geofence.
    pub fn validate(&self) -> AppResult<(ProofKind, Option<Geofence>)> {
        if self.idx < 1 {
            return Err(AppError::bad_request("INVALID_PAYLOAD", "idx must be >= 1"));
        }
        if self.label.trim().is_empty() {
            return Err(AppError::bad_request("INVALID_PAYLOAD", "label is required"));
        }
        if !self.amount.is_positive() {
            return Err(AppError::invalid_amount("milestone amount must be positive"));
        }
        let kind: ProofKind = self
            .proof_kind
            .parse()
            .map_err(|_| AppError::bad_request("INVALID_PAYLOAD", "unknown proof_kind"))?;

        let geofence = match &self.geofence {
            None => None,
            Some(g) => {
                let center = GeoPoint::new(g.lat, g.lng);
                if !center.is_valid() {
                    return Err(AppError::bad_request(
                        "INVALID_PAYLOAD",
                        "geofence coordinates are out of range",
                    ));
                }
                if !g.radius_m.is_finite() || g.radius_m < 0.0 {
                    return Err(AppError::bad_request(
                        "INVALID_PAYLOAD",
                        "geofence radius must be >= 0",
                    ));
                }
                Some(Geofence {
                    center,
                    radius_m: g.radius_m,
                })
            }
        };

        if let Some(req) = &self.proof_requirements {
            if !req.is_object() {
                return Err(AppError::bad_request(
                    "INVALID_PAYLOAD",
                    "proof_requirements must be an object",
                ));
            }
        }

        Ok((kind, geofence))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneData {
    pub id: MilestoneId,
    pub escrow_id: EscrowId,
    pub idx: i32,
    pub label: String,
    pub amount: Money,
    pub proof_kind: ProofKind,
    pub validator: String,
    pub status: MilestoneStatus,
    pub geofence: Option<Geofence>,
    pub proof_requirements: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Milestone> for MilestoneData {
    fn from(m: Milestone) -> Self {
        let geofence = m.geofence();
        Self {
            id: m.id,
            escrow_id: m.escrow_id,
            idx: m.idx,
            label: m.label,
            amount: m.amount,
            proof_kind: m.proof_kind,
            validator: m.validator,
            status: m.status,
            geofence,
            proof_requirements: m.proof_requirements,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CreateMilestoneRequest {
        serde_json::from_value(json!({
            "idx": 1,
            "label": "Foundation poured",
            "amount": "250.00",
            "proof_kind": "photo",
            "geofence": {"lat": 52.52, "lng": 13.405, "radius_m": 150.0}
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_request() {
        let (kind, geofence) = request().validate().unwrap();
        assert_eq!(kind, ProofKind::Photo);
        assert_eq!(geofence.unwrap().radius_m, 150.0);
        assert_eq!(request().validator, "rules");
    }

    #[test]
    fn test_rejects_bad_fields() {
        let mut r = request();
        r.idx = 0;
        assert!(r.validate().unwrap_err().is_code("INVALID_PAYLOAD"));

        let mut r = request();
        r.amount = Money::ZERO;
        assert!(r.validate().unwrap_err().is_code("INVALID_AMOUNT"));

        let mut r = request();
        r.geofence = Some(GeofenceInput {
            lat: 10.0,
            lng: 10.0,
            radius_m: -1.0,
        });
        assert!(r.validate().is_err());

        let mut r = request();
        r.proof_kind = "video".to_string();
        assert!(r.validate().is_err());
    }
}
