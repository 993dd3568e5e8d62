mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LogSettings, PingSettings, ServerSettings, Settings, WorkerSettings,
};

/// Prefix of the environment variables read by [`load_config`], e.g.
/// `PINGPONG_PING__DURATION_SECS=5`.
pub const ENV_PREFIX: &str = "PINGPONG";

/// Loads the configuration from `config/default` and the environment,
/// merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit file stem. The file is optional;
/// its format is picked from the extension found on disk.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
