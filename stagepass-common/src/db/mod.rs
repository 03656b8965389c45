//! Database initialization, migrations and settings

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::{create_settings_table, init_database, init_memory_database};
pub use migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
pub use settings::{ensure_setting, get_setting, set_setting};
