use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::JsonValue;
use utoipa::ToSchema;

pub const ACTION_CORRECTION: &str = "attendance_correction";
pub const ACTION_DELETION: &str = "attendance_deletion";
pub const TARGET_ATTENDANCE: &str = "attendance";

/// Append-only audit entry. One row per administrator correction or
/// deletion; `old_value`/`new_value` are full record snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AuditEntry {
    #[schema(example = "b0f0a2a6-9c1e-4f9b-8a27-2f6f1f2b6d9e")]
    pub id: String,
    #[schema(example = 1)]
    pub admin_id: i64,
    #[schema(example = "attendance_correction")]
    pub action_type: String,
    #[schema(example = "attendance")]
    pub target_type: String,
    #[schema(example = "42")]
    pub target_id: String,
    #[schema(value_type = Option<Object>)]
    pub old_value: Option<JsonValue>,
    #[schema(value_type = Option<Object>)]
    pub new_value: Option<JsonValue>,
    #[schema(example = "manual entry")]
    pub reason: String,
    #[schema(example = "192.0.2.10")]
    pub ip_address: Option<String>,
    #[schema(example = "2026-01-05T06:12:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}
