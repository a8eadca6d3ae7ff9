use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::core::monthly::{MonthlyAggregator, MonthlySummary};
use crate::identity::Identity;
use crate::model::attendance::AttendanceRecord;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct MonthlyQuery {
    #[param(example = 1000)]
    pub user_id: i64,
    #[param(example = 2026)]
    pub year: i32,
    #[param(example = 1)]
    pub month: u32,
}

#[derive(Serialize, ToSchema)]
pub struct MonthlyResponse {
    pub summary: MonthlySummary,
    pub records: Vec<AttendanceRecord>,
}

/// Monthly attendance endpoint. Users can read their own month; staff and
/// admin can read anyone's.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Summary with the month's records", body = MonthlyResponse),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn monthly_attendance(
    identity: Identity,
    aggregator: web::Data<MonthlyAggregator>,
    query: web::Query<MonthlyQuery>,
) -> actix_web::Result<HttpResponse> {
    if identity.user_id != query.user_id {
        identity.require_staff_or_admin()?;
    }

    let (summary, records) =
        aggregator.compute_month(query.user_id, query.year, query.month).await?;
    Ok(HttpResponse::Ok().json(MonthlyResponse { summary, records }))
}
