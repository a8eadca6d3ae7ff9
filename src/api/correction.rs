use actix_web::{HttpRequest, HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::correction::{CorrectionAuditTrail, RecordChanges, RecordSelector};
use crate::error::ServiceError;
use crate::identity::Identity;
use crate::model::attendance::AttendanceRecord;

#[derive(Deserialize, ToSchema)]
pub struct CorrectionRequest {
    /// Existing record to correct.
    #[schema(example = 42)]
    pub record_id: Option<i64>,
    /// Alternative selector for a day with no record yet; requires `date`.
    #[schema(example = 1000)]
    pub user_id: Option<i64>,
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    pub changes: RecordChanges,
    #[schema(example = "manual entry")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteRequest {
    #[schema(example = "entered for the wrong day")]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    #[schema(example = json!(["1 daily report(s) still reference the deleted attendance record"]))]
    pub warnings: Vec<String>,
}

/// Attendance correction endpoint (admin)
#[utoipa::path(
    post,
    path = "/api/v1/admin/attendance/corrections",
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "Correction applied and audited", body = AttendanceRecord),
        (status = 400, description = "Missing reason, empty changes, or bad selector"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Record not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Admin"
)]
pub async fn correct_attendance(
    identity: Identity,
    req: HttpRequest,
    trail: web::Data<CorrectionAuditTrail>,
    payload: web::Json<CorrectionRequest>,
) -> actix_web::Result<HttpResponse> {
    identity.require_admin()?;

    let payload = payload.into_inner();
    let selector = match (payload.record_id, payload.user_id, payload.date) {
        (Some(id), _, _) => RecordSelector::Id(id),
        (None, Some(user_id), Some(date)) => RecordSelector::Key { user_id, date },
        _ => {
            return Err(ServiceError::Validation(
                "record_id or user_id and date must be provided".into(),
            )
            .into());
        }
    };
    let ip_address = req.peer_addr().map(|addr| addr.ip().to_string());

    let record = trail
        .correct(identity.user_id, selector, payload.changes, &payload.reason, ip_address)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Attendance deletion endpoint (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/admin/attendance/{record_id}",
    params(
        ("record_id" = i64, Path, description = "ID of the attendance record to delete")
    ),
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Record deleted; orphaned linkage reported", body = DeleteResponse),
        (status = 400, description = "Missing reason"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Record not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Admin"
)]
pub async fn delete_attendance(
    identity: Identity,
    req: HttpRequest,
    trail: web::Data<CorrectionAuditTrail>,
    path: web::Path<i64>,
    payload: web::Json<DeleteRequest>,
) -> actix_web::Result<HttpResponse> {
    identity.require_admin()?;

    let record_id = path.into_inner();
    let ip_address = req.peer_addr().map(|addr| addr.ip().to_string());

    let warnings =
        trail.delete(identity.user_id, record_id, &payload.reason, ip_address).await?;
    Ok(HttpResponse::Ok().json(DeleteResponse { warnings }))
}
