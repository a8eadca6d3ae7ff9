use crate::{
    api::{attendance, audit, correction, monthly},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance")
                    // clock events
                    .service(
                        web::resource("/clock-in")
                            .wrap(build_limiter(config.rate_clock_per_min))
                            .route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out")
                            .wrap(build_limiter(config.rate_clock_per_min))
                            .route(web::post().to(attendance::clock_out)),
                    )
                    // rest breaks
                    .service(
                        web::resource("/break/start")
                            .wrap(build_limiter(config.rate_clock_per_min))
                            .route(web::post().to(attendance::break_start)),
                    )
                    .service(
                        web::resource("/break/end")
                            .wrap(build_limiter(config.rate_clock_per_min))
                            .route(web::post().to(attendance::break_end)),
                    )
                    // read side
                    .service(
                        web::resource("/search")
                            .wrap(build_limiter(config.rate_read_per_min))
                            .route(web::get().to(attendance::search)),
                    )
                    .service(
                        web::resource("/monthly")
                            .wrap(build_limiter(config.rate_read_per_min))
                            .route(web::get().to(monthly::monthly_attendance)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .service(
                        web::resource("/attendance/corrections")
                            .wrap(build_limiter(config.rate_admin_per_min))
                            .route(web::post().to(correction::correct_attendance)),
                    )
                    .service(
                        web::resource("/attendance/{record_id}")
                            .wrap(build_limiter(config.rate_admin_per_min))
                            .route(web::delete().to(correction::delete_attendance)),
                    )
                    .service(
                        web::resource("/audit-log")
                            .wrap(build_limiter(config.rate_admin_per_min))
                            .route(web::get().to(audit::audit_log)),
                    ),
            ),
    );
}
