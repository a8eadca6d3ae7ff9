use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use chrono::Local;
use dotenvy::dotenv;

mod api;
mod config;
mod core;
mod db;
mod docs;
mod error;
mod identity;
mod model;
mod routes;

use config::Config;
use db::init_db;

use crate::core::breaks::BreakLifecycle;
use crate::core::correction::CorrectionAuditTrail;
use crate::core::ledger::AttendanceLedger;
use crate::core::locks::KeyedLocks;
use crate::core::monthly::MonthlyAggregator;
use crate::core::schedule::{FixedStart, SchedulePolicy};
use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "caretime attendance service"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let locks = KeyedLocks::new(Duration::from_millis(config.lock_wait_ms));
    let schedule: Arc<dyn SchedulePolicy> = Arc::new(FixedStart::new(config.scheduled_start));
    let ledger = AttendanceLedger::new(
        pool.clone(),
        locks.clone(),
        schedule,
        config.break_cap_minutes,
    );
    let breaks = BreakLifecycle::new(pool.clone(), locks.clone(), config.break_cap_minutes);
    let aggregator = MonthlyAggregator::new(pool.clone(), config.break_cap_minutes);
    let trail = CorrectionAuditTrail::new(pool.clone(), locks);

    // Expired breaks are closed from here, never from a client-side timer.
    // Failures stay in the logs; no request path depends on the sweep.
    let sweeper = breaks.clone();
    let sweep_interval = config.sweep_interval_secs;
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval.max(1)));
        loop {
            ticker.tick().await;
            let now = Local::now();
            match sweeper.sweep_expired(now.date_naive(), now.time()).await {
                Ok(0) => {}
                Ok(closed) => info!(closed, "break sweep auto-closed expired breaks"),
                Err(e) => warn!(error = %e, "break sweep failed"),
            }
        }
    });

    // 👇 clone what you need BEFORE moving config
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(ledger.clone()))
            .app_data(Data::new(breaks.clone()))
            .app_data(Data::new(aggregator.clone()))
            .app_data(Data::new(trail.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
