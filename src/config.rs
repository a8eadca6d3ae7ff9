use std::env;
use chrono::NaiveTime;
use dotenvy::dotenv;
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    /// Facility-wide scheduled start used for automatic `late` detection;
    /// unset disables it.
    pub scheduled_start: Option<NaiveTime>,
    pub break_cap_minutes: i64,
    pub sweep_interval_secs: u64,
    pub lock_wait_ms: u64,

    // Rate limiting
    pub rate_clock_per_min: u32,
    pub rate_read_per_min: u32,
    pub rate_admin_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            scheduled_start: env::var("SCHEDULED_START").ok().map(|s| {
                NaiveTime::parse_from_str(&s, "%H:%M")
                    .expect("SCHEDULED_START must be HH:MM")
            }),
            break_cap_minutes: env::var("BREAK_CAP_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            sweep_interval_secs: env::var("BREAK_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            lock_wait_ms: env::var("LOCK_WAIT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap(),

            rate_clock_per_min: env::var("RATE_CLOCK_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_read_per_min: env::var("RATE_READ_PER_MIN")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap(),
            rate_admin_per_min: env::var("RATE_ADMIN_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }
}
