use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use typed_builder::TypedBuilder;

use crate::common::utils::geo::GeoPoint;
use crate::common::{EscrowId, MilestoneId, Money};
use crate::domains::proofs::models::ProofKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "milestone_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    Waiting,
    PendingReview,
    Approved,
    Rejected,
    Paying,
    Paid,
}

impl MilestoneStatus {
    /// Statuses that make a milestone the escrow's current one.
    pub const OPEN: [MilestoneStatus; 4] = [
        MilestoneStatus::Waiting,
        MilestoneStatus::PendingReview,
        MilestoneStatus::Approved,
        MilestoneStatus::Paying,
    ];

    pub fn is_open(self) -> bool {
        Self::OPEN.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MilestoneStatus::Rejected | MilestoneStatus::Paid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MilestoneStatus::Waiting => "WAITING",
            MilestoneStatus::PendingReview => "PENDING_REVIEW",
            MilestoneStatus::Approved => "APPROVED",
            MilestoneStatus::Rejected => "REJECTED",
            MilestoneStatus::Paying => "PAYING",
            MilestoneStatus::Paid => "PAID",
        }
    }
}

/// Circle a photo's GPS position must fall within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub center: GeoPoint,
    pub radius_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Milestone {
    pub id: MilestoneId,
    pub escrow_id: EscrowId,
    pub idx: i32,
    pub label: String,
    pub amount: Money,
    pub proof_kind: ProofKind,
    pub validator: String,
    pub status: MilestoneStatus,
    pub geofence_lat: Option<f64>,
    pub geofence_lng: Option<f64>,
    pub geofence_radius_m: Option<f64>,
    pub proof_requirements: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Milestone {
    pub fn geofence(&self) -> Option<Geofence> {
        match (self.geofence_lat, self.geofence_lng, self.geofence_radius_m) {
            (Some(lat), Some(lng), Some(radius_m)) => Some(Geofence {
                center: GeoPoint { lat, lng },
                radius_m,
            }),
            _ => None,
        }
    }

    /// Metadata keys the proof must carry, from `proof_requirements.required_keys`.
    pub fn required_metadata_keys(&self) -> Vec<String> {
        self.proof_requirements
            .as_ref()
            .and_then(|r| r.get("required_keys"))
            .and_then(|k| k.as_array())
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Insert payload for a milestone
#[derive(Clone, Debug, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewMilestone {
    pub escrow_id: EscrowId,
    pub idx: i32,
    pub label: String,
    pub amount: Money,
    pub proof_kind: ProofKind,
    pub validator: String,
    #[builder(default)]
    pub geofence: Option<Geofence>,
    #[builder(default)]
    pub proof_requirements: Option<JsonValue>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Milestone {
    /// Insert a milestone; `None` when the index is taken for this escrow.
    pub async fn create(new: &NewMilestone, conn: &mut PgConnection) -> Result<Option<Self>> {
        let milestone = sqlx::query_as::<_, Milestone>(
            r#"
            INSERT INTO milestones (
                escrow_id,
                idx,
                label,
                amount,
                proof_kind,
                validator,
                geofence_lat,
                geofence_lng,
                geofence_radius_m,
                proof_requirements
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (escrow_id, idx) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.escrow_id)
        .bind(new.idx)
        .bind(&new.label)
        .bind(new.amount)
        .bind(new.proof_kind)
        .bind(&new.validator)
        .bind(new.geofence.map(|g| g.center.lat))
        .bind(new.geofence.map(|g| g.center.lng))
        .bind(new.geofence.map(|g| g.radius_m))
        .bind(&new.proof_requirements)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(milestone)
    }

    pub async fn find_by_id(id: MilestoneId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let milestone = sqlx::query_as::<_, Milestone>("SELECT * FROM milestones WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(milestone)
    }

    pub async fn find_by_escrow_and_idx(
        escrow_id: EscrowId,
        idx: i32,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let milestone = sqlx::query_as::<_, Milestone>(
            "SELECT * FROM milestones WHERE escrow_id = $1 AND idx = $2",
        )
        .bind(escrow_id)
        .bind(idx)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(milestone)
    }

    pub async fn list_for_escrow(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<Vec<Self>> {
        let milestones = sqlx::query_as::<_, Milestone>(
            "SELECT * FROM milestones WHERE escrow_id = $1 ORDER BY idx",
        )
        .bind(escrow_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(milestones)
    }

    /// Lowest-index milestone that is not yet finished.
    pub async fn current_open(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let milestone = sqlx::query_as::<_, Milestone>(
            r#"
            SELECT * FROM milestones
            WHERE escrow_id = $1
              AND status IN ('WAITING', 'PENDING_REVIEW', 'APPROVED', 'PAYING')
            ORDER BY idx
            LIMIT 1
            "#,
        )
        .bind(escrow_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(milestone)
    }

    /// Move `from → to`; `None` when the milestone was not in `from`.
    pub async fn transition(
        id: MilestoneId,
        from: MilestoneStatus,
        to: MilestoneStatus,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let milestone = sqlx::query_as::<_, Milestone>(
            r#"
            UPDATE milestones
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(milestone)
    }

    pub async fn sum_amounts(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<Money> {
        let total = sqlx::query_scalar::<_, Money>(
            "SELECT COALESCE(SUM(amount), 0) FROM milestones WHERE escrow_id = $1",
        )
        .bind(escrow_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(total)
    }

    /// True when the escrow has milestones and every one of them is PAID.
    pub async fn all_paid(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<bool> {
        let (total, paid): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'PAID')
            FROM milestones
            WHERE escrow_id = $1
            "#,
        )
        .bind(escrow_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(total > 0 && total == paid)
    }
}
