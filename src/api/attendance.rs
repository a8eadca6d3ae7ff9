use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::core::breaks::BreakLifecycle;
use crate::core::ledger::AttendanceLedger;
use crate::identity::Identity;
use crate::model::attendance::AttendanceRecord;
use crate::model::break_record::BreakView;
use crate::model::role::{Role, ServiceType};

#[derive(Deserialize, ToSchema)]
pub struct ClockInRequest {
    /// Required for workers; ignored for staff/admin.
    #[schema(example = "commute")]
    pub service_type: Option<ServiceType>,
    /// Defaults to the current server time.
    #[schema(example = "08:50:00", format = "time", value_type = Option<String>)]
    pub raw_time: Option<NaiveTime>,
}

#[derive(Deserialize, ToSchema)]
pub struct ClockOutRequest {
    #[schema(example = "15:35:00", format = "time", value_type = Option<String>)]
    pub raw_time: Option<NaiveTime>,
    /// An open break blocks clock-out unless this is set; the caller must
    /// confirm force-closing explicitly.
    #[serde(default)]
    pub force_close_break: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct BreakEndRequest {
    /// Close at the persisted deadline instead of the current time.
    #[serde(default)]
    pub auto_end: bool,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct SearchQuery {
    #[param(example = "2026-01-05", format = "date", value_type = String)]
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Filter by role
    pub role: Option<Role>,
    /// Filter by user ID
    pub user_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceWithBreak {
    pub record: AttendanceRecord,
    pub break_status: BreakView,
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 200, description = "Clocked in, time normalized per role", body = AttendanceRecord),
        (status = 400, description = "Missing service type or malformed time"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already clocked in today"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    identity: Identity,
    ledger: web::Data<AttendanceLedger>,
    payload: web::Json<ClockInRequest>,
) -> actix_web::Result<HttpResponse> {
    let now = Local::now();
    let raw = payload.raw_time.unwrap_or_else(|| now.time());
    let record = ledger
        .clock_in(identity.user_id, now.date_naive(), raw, identity.role, payload.service_type)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out",
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Clocked out, day closed", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Not clocked in, already clocked out, or a break is still open"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    identity: Identity,
    ledger: web::Data<AttendanceLedger>,
    payload: web::Json<ClockOutRequest>,
) -> actix_web::Result<HttpResponse> {
    let now = Local::now();
    let raw = payload.raw_time.unwrap_or_else(|| now.time());
    let record = ledger
        .clock_out(identity.user_id, now.date_naive(), raw, payload.force_close_break)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Break start endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/break/start",
    responses(
        (status = 200, description = "Break opened", body = BreakView),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Not working, already on break, or break already taken today"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn break_start(
    identity: Identity,
    breaks: web::Data<BreakLifecycle>,
) -> actix_web::Result<HttpResponse> {
    let now = Local::now();
    let view = breaks.start_break(identity.user_id, now.date_naive(), now.time()).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Break end endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/break/end",
    request_body = BreakEndRequest,
    responses(
        (status = 200, description = "Break closed", body = BreakView),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "No break is open"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn break_end(
    identity: Identity,
    breaks: web::Data<BreakLifecycle>,
    payload: web::Json<BreakEndRequest>,
) -> actix_web::Result<HttpResponse> {
    let now = Local::now();
    let view = breaks
        .end_break(identity.user_id, now.date_naive(), now.time(), payload.auto_end)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Day search for the staff dashboard
#[utoipa::path(
    get,
    path = "/api/v1/attendance/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Records for the day with break status", body = [AttendanceWithBreak]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn search(
    identity: Identity,
    ledger: web::Data<AttendanceLedger>,
    query: web::Query<SearchQuery>,
) -> actix_web::Result<HttpResponse> {
    identity.require_staff_or_admin()?;

    let rows = ledger.search_day(query.date, query.role, query.user_id).await?;
    let response: Vec<AttendanceWithBreak> = rows
        .into_iter()
        .map(|(record, break_status)| AttendanceWithBreak { record, break_status })
        .collect();
    Ok(HttpResponse::Ok().json(response))
}
