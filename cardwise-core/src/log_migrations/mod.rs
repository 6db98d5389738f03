//! Event log migrations, embedded at compile time
//!
//! Applied in order to logs.duckdb and recorded in its own sys_migrations.

pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_event_log.sql", include_str!("001_event_log.sql")),
];
