#[cfg(feature = "env_logger")]
pub use self::env_log::*;

#[cfg(not(any(feature = "env_logger", feature = "tracing_log")))]
pub use self::none::*;
#[cfg(feature = "tracing_log")]
pub use self::tracing_log::*;

#[cfg(all(feature = "env_logger", feature = "tracing_log"))]
compile_error!("feature \"env_logger\" and feature \"tracing_log\" cannot be enabled at the same time");

/// Installs the logger with default options.
pub fn log_init() -> crate::Result<()> {
    LogOptions::new().init()
}

#[cfg(feature = "env_logger")]
mod env_log {
    use env_logger::{builder, Env};

    use crate::BeanDefinition;

    pub struct LogOptions<'a> {
        env: Env<'a>,
    }

    impl Default for LogOptions<'_> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LogOptions<'_> {
        pub fn new() -> Self {
            Self {
                env: Env::default().default_filter_or("info"),
            }
        }

        pub fn debug(mut self, debug: bool) -> Self {
            if debug {
                self.env = Env::default().default_filter_or("debug");
            }
            self
        }

        pub fn init(self) -> crate::Result<()> {
            builder()
                .parse_env(self.env)
                .try_init()
                .map_err(anyhow::Error::new)?;
            Ok(())
        }
    }

    /// Definitions of the beans the logger exposes to the container.
    pub fn log_definitions() -> Vec<BeanDefinition> {
        Vec::new()
    }
}

#[cfg(feature = "tracing_log")]
mod tracing_log {
    use std::sync::OnceLock;

    use tracing_subscriber::{
        filter::Directive,
        filter::LevelFilter,
        fmt::Formatter,
        reload::Handle,
        EnvFilter,
    };

    use crate::{BeanDefinition, Result};

    static LOG_PATCHER: OnceLock<LogPatcher> = OnceLock::new();

    pub struct LogOptions {
        default_directive: Directive,
    }

    impl Default for LogOptions {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LogOptions {
        pub fn new() -> Self {
            Self {
                default_directive: LevelFilter::INFO.into(),
            }
        }

        pub fn debug(mut self, debug: bool) -> Self {
            if debug {
                self.default_directive = LevelFilter::DEBUG.into();
            }
            self
        }

        pub fn init(self) -> Result<()> {
            let filter = EnvFilter::builder()
                .with_default_directive(self.default_directive)
                .from_env_lossy();

            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_filter_reloading();

            let handle = builder.reload_handle();

            builder.try_init().map_err(|err| anyhow::anyhow!(err))?;

            LOG_PATCHER.get_or_init(|| LogPatcher(handle));

            Ok(())
        }
    }

    /// Changes the log filter of a running application. Registered as bean `log_patcher`.
    #[derive(Clone)]
    pub struct LogPatcher(Handle<EnvFilter, Formatter>);

    impl LogPatcher {
        pub fn reload<I>(&self, value: I) -> Result<()>
        where
            I: IntoIterator,
            I::Item: AsRef<str>,
        {
            let mut env_filter = EnvFilter::from_default_env();
            for i in value {
                let directive = i.as_ref().parse().map_err(anyhow::Error::new)?;
                env_filter = env_filter.add_directive(directive)
            }

            self.0
                .modify(|filter: &mut EnvFilter| {
                    *filter = env_filter;
                })
                .map_err(anyhow::Error::new)?;
            tracing::info!("log filter reloaded to {}", self.current()?);
            Ok(())
        }

        pub fn current(&self) -> Result<String> {
            let result = self
                .0
                .with_current(|filter: &EnvFilter| filter.to_string())
                .map_err(anyhow::Error::new)?;
            Ok(result)
        }
    }

    /// Definitions of the beans the logger exposes to the container.
    pub fn log_definitions() -> Vec<BeanDefinition> {
        LOG_PATCHER
            .get()
            .map(|patcher| BeanDefinition::from_instance("log_patcher", patcher.clone()).build())
            .into_iter()
            .collect()
    }
}

#[cfg(not(any(feature = "env_logger", feature = "tracing_log")))]
mod none {
    use crate::BeanDefinition;

    #[derive(Default)]
    pub struct LogOptions;

    impl LogOptions {
        pub fn new() -> Self {
            Self
        }

        pub fn debug(self, _: bool) -> Self {
            self
        }

        pub fn init(self) -> crate::Result<()> {
            println!("no env_logger and tracing_log use your log implement!");
            Ok(())
        }
    }

    /// Definitions of the beans the logger exposes to the container.
    pub fn log_definitions() -> Vec<BeanDefinition> {
        Vec::new()
    }
}
