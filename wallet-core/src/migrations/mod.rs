//! Wallet database migrations - embedded SQL files
//!
//! Each migration is a tuple of (name, sql_content), applied in name order.

/// All wallet migrations, embedded at compile time.
///
/// When adding a migration, create `NNN_description.sql` and append it here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_account_indexes.sql", include_str!("002_account_indexes.sql")),
];
