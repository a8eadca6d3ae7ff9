// use sqlx::MySqlPool;

// pub async fn init_db(database_url: &str) -> MySqlPool {
//     MySqlPool::connect(database_url)
//         .await
//         .expect("Failed to connect to database")
// }


use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

// Idempotent; applied on every startup.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        service_type TEXT,
        clock_in TEXT,
        clock_out TEXT,
        break_start TEXT,
        break_end TEXT,
        status TEXT NOT NULL DEFAULT 'normal',
        UNIQUE (user_id, date)
    )",
    "CREATE TABLE IF NOT EXISTS break_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        attendance_id INTEGER NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT,
        duration_minutes INTEGER,
        auto_closed INTEGER NOT NULL DEFAULT 0,
        deadline TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_break_records_attendance
        ON break_records (attendance_id)",
    "CREATE TABLE IF NOT EXISTS audit_log (
        id TEXT PRIMARY KEY,
        admin_id INTEGER NOT NULL,
        action_type TEXT NOT NULL,
        target_type TEXT NOT NULL,
        target_id TEXT NOT NULL,
        old_value TEXT,
        new_value TEXT,
        reason TEXT NOT NULL,
        ip_address TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_created_at
        ON audit_log (created_at)",
    // owned by the daily-report and commentary collaborators; only counted
    // here when a deletion leaves them orphaned
    "CREATE TABLE IF NOT EXISTS daily_reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        attendance_id INTEGER NOT NULL,
        body TEXT
    )",
    "CREATE TABLE IF NOT EXISTS staff_comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        attendance_id INTEGER NOT NULL,
        body TEXT
    )",
];

pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn init_db(database_url: &str) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(database_url)
        .expect("DATABASE_URL must be a valid sqlite url")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .expect("Failed to connect to database");
    apply_schema(&pool).await.expect("Failed to apply schema");
    pool
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    apply_schema(&pool).await.expect("schema applies");
    pool
}
