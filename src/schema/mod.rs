mod base;
mod v1_to_v2;

pub use base::CREATE_SCHEMA_SQL;
use v1_to_v2::UPGRADE_1_TO_2_SQL;

/// Current schema version written by CREATE_SCHEMA_SQL.
pub const SCHEMA_VERSION: u32 = 2;

/// Migration descriptor. Each entry upgrades a database from `from` to
/// `from + 1` by executing a single SQL batch.
pub struct Migration {
    pub from: u32,
    pub sql: &'static str,
}

/// Ordered list of migrations. `Database::ensure_schema` walks this list
/// starting from the stored version until SCHEMA_VERSION is reached.
pub const MIGRATIONS: &[Migration] = &[Migration {
    from: 1,
    sql: UPGRADE_1_TO_2_SQL,
}];
