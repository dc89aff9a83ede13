mod config;

pub use config::{CronSettings, PostgresSettings, RedpandaSettings, RelaySettings, Settings};
