use crate::api::attendance::{
    AttendanceWithBreak, BreakEndRequest, ClockInRequest, ClockOutRequest, SearchQuery,
};
use crate::api::audit::{AuditFilter, AuditListResponse};
use crate::api::correction::{CorrectionRequest, DeleteRequest, DeleteResponse};
use crate::api::monthly::{MonthlyQuery, MonthlyResponse};
use crate::core::correction::RecordChanges;
use crate::core::monthly::MonthlySummary;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, WorkState};
use crate::model::audit_log::AuditEntry;
use crate::model::break_record::{BreakState, BreakView};
use crate::model::role::{Role, ServiceType};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Caretime Attendance API",
        version = "1.0.0",
        description = r#"
## Care Facility Attendance Service

Records daily clock-in/clock-out and rest breaks for workers, staff and
administrators, derives per-day and per-month worked hours, and lets
administrators correct historical records with a full audit trail.

### Key Features
- **Clock Events**
  - Worker times normalized to the facility's service billing boundaries
  - One attendance record per user per day
- **Rest Breaks**
  - One break per day, capped at 60 minutes with server-side auto-close
- **Monthly Aggregation**
  - Net hours per day rounded to the quarter hour
- **Corrections & Audit**
  - Administrator edits and deletions always paired with an audit entry

### Identity
Requests carry a pre-authenticated identity in the `X-User-Id` and
`X-User-Role` headers, placed by the upstream gateway.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::break_start,
        crate::api::attendance::break_end,
        crate::api::attendance::search,

        crate::api::monthly::monthly_attendance,

        crate::api::correction::correct_attendance,
        crate::api::correction::delete_attendance,
        crate::api::audit::audit_log
    ),
    components(
        schemas(
            Role,
            ServiceType,
            AttendanceStatus,
            AttendanceRecord,
            WorkState,
            BreakState,
            BreakView,
            AuditEntry,
            MonthlySummary,
            ClockInRequest,
            ClockOutRequest,
            BreakEndRequest,
            SearchQuery,
            AttendanceWithBreak,
            MonthlyQuery,
            MonthlyResponse,
            CorrectionRequest,
            RecordChanges,
            DeleteRequest,
            DeleteResponse,
            AuditFilter,
            AuditListResponse
        )
    ),
    tags(
        (name = "Attendance", description = "Clock events, breaks and attendance reads"),
        (name = "Admin", description = "Corrections, deletions and the audit log"),
    )
)]
pub struct ApiDoc;
