use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::identity::Identity;
use crate::model::audit_log::AuditEntry;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AuditFilter {
    #[param(example = 1)]
    /// Filter by acting administrator
    pub admin_id: Option<i64>,
    #[param(example = "attendance_correction")]
    /// Filter by action type
    pub action_type: Option<String>,
    #[param(example = "42")]
    /// Filter by target record
    pub target_id: Option<String>,
    #[param(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[param(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    I64(i64),
    Str(&'a str),
}

#[derive(Serialize, ToSchema)]
pub struct AuditListResponse {
    pub data: Vec<AuditEntry>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// Audit log listing endpoint (admin)
#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-log",
    params(AuditFilter),
    responses(
        (status = 200, description = "Paginated audit entries, newest first", body = AuditListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Admin"
)]
pub async fn audit_log(
    identity: Identity,
    pool: web::Data<SqlitePool>,
    query: web::Query<AuditFilter>,
) -> actix_web::Result<HttpResponse> {
    identity.require_admin()?;

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(admin_id) = query.admin_id {
        where_sql.push_str(" AND admin_id = ?");
        args.push(FilterValue::I64(admin_id));
    }

    if let Some(action_type) = query.action_type.as_deref() {
        where_sql.push_str(" AND action_type = ?");
        args.push(FilterValue::Str(action_type));
    }

    if let Some(target_id) = query.target_id.as_deref() {
        where_sql.push_str(" AND target_id = ?");
        args.push(FilterValue::Str(target_id));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM audit_log{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::I64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count audit entries");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, admin_id, action_type, target_type, target_id, old_value, new_value,
               reason, ip_address, created_at
        FROM audit_log
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, AuditEntry>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::I64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let entries = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch audit log");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    // -------------------------
    // Response
    // -------------------------
    let response = AuditListResponse {
        data: entries,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}
