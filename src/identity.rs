use std::str::FromStr;

use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

use crate::model::role::Role;

/// Requester identity placed by the upstream gateway, which owns login and
/// session handling. The service trusts these headers.
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user_id = match req
            .headers()
            .get("X-User-Id")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            Some(v) => v,
            None => return ready(Err(ErrorUnauthorized("Missing or invalid X-User-Id header"))),
        };

        let role = match req
            .headers()
            .get("X-User-Role")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| Role::from_str(v).ok())
        {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Missing or invalid X-User-Role header"))),
        };

        ready(Ok(Identity { user_id, role }))
    }
}

impl Identity {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    pub fn require_staff_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Staff) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Staff/Admin only"))
        }
    }
}
