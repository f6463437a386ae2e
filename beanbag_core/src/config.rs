use std::fmt::{Debug, Formatter};

use cfg_rs::{Configuration, FromConfig, FromConfigWithPrefix};

use crate::IocError;

/// Container property source, just simply wrap `cfg_rs::Configuration`
pub struct Config {
    /// source of configuration
    pub(crate) source: Configuration,
}

impl Config {
    /// Property source without any value, every lookup of a required key fails.
    pub fn empty() -> Self {
        Self {
            source: Configuration::new(),
        }
    }

    pub fn get<V: FromConfig>(&self, key: &str) -> crate::Result<V> {
        Ok(self.source.get(key)?)
    }

    pub fn get_predefined<V: FromConfigWithPrefix>(&self) -> crate::Result<V> {
        Ok(self.source.get_predefined()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::empty()
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("source", &"Configuration")
            .finish()
    }
}

/// Loads `{dir}/{name}.toml` and `{dir}/{name}-{profile}.toml` plus the environment.
#[derive(Debug, Clone, Copy)]
pub struct AppConfigLoader<'a> {
    pub name: &'a str,
    pub dir: &'a str,
    pub profile: &'a str,
}

impl Default for AppConfigLoader<'_> {
    fn default() -> Self {
        Self {
            name: "app",
            dir: ".",
            profile: "prod",
        }
    }
}

impl AppConfigLoader<'_> {
    pub fn load(self) -> crate::Result<Config> {
        use cfg_rs::init_cargo_env;
        init_cargo_env!();

        log::info!(
            "load config name:{} dir:{} profile:{}",
            self.name,
            self.dir,
            self.profile
        );

        let configuration = Configuration::with_predefined_builder()
            .set_cargo_env(init_cargo_env())
            .set_name(self.name)
            .set_dir(self.dir)
            .set_profile(self.profile)
            .init()
            .map_err(IocError::from)?;

        Ok(Config::from(configuration))
    }
}

/// Convert Configuration to Config
impl From<Configuration> for Config {
    fn from(source: Configuration) -> Self {
        Self { source }
    }
}
