//! Configuration for target resolution.
//!
//! Values are layered with priority: command option > env var > workspace
//! entry in `config.toml` > global key in `config.toml` > built-in default.
//! The environment is captured once into an [`Environment`]; the TOML file is
//! read-only here and exposed through [`ConfigSource`].

mod env;
mod file;
mod settings;

pub use self::env::{
    ENV_CHANNEL, ENV_CHANNEL_SHORT, ENV_CONFIG, ENV_DATA_VOLUME, ENV_HOME, ENV_XDG_CONFIG_HOME,
    Environment,
};
pub use self::file::{ConfigSource, ContainAiConfig};
pub use self::settings::{Channel, ResolverSettings};
