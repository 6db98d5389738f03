//! Database migrations, embedded at compile time
//!
//! Each entry is (file name, SQL). They run in order and are recorded in
//! sys_migrations so each one applies exactly once.
//!
//! To add a migration, create `NNN_description.sql` and append it here.

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_insights.sql", include_str!("002_insights.sql")),
    ("003_points_ledger.sql", include_str!("003_points_ledger.sql")),
];
