//! ## beanbag - A small inversion of control container for Rust
//! `beanbag` builds, wires and tears down application components ("beans") from an explicit list
//! of definitions.
//!
//! ## The [`run!`](run) macro
//!
//! Used to run the application: initialize logging, load configuration, register all beans and
//! build every eager singleton.
//!
//! ### Parameters
//!
//! * `name` - The name of the configuration file. Default is `"app"`.
//! * `dir` - The path to the configuration file. Default is the current path (`"."`).
//! * `profile` - The profile of the configuration file (prod/dev). Default is `"prod"`.
//!
//! Bean types follow a `;`.
//!
//! ### Example
//!
//! ```rust,no_run
//! use beanbag::{run, Bean};
//!
//! #[derive(Bean)]
//! struct A;
//!
//! fn main() -> beanbag::Result<()> {
//!     let container = run!(name = "app", dir = ".", profile = "prod"; A)?;
//!     container.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## The [`Bean`](beanbag_derive::Bean) derive macro
//!
//! Used to define a [bean](beanbag_core::Bean) from a struct.
//!
//! ### Attributes
//!
//! * `#[bean(name = "..")]` - Name of the bean. Default is the struct name in snake case.
//! * `#[bean(prototype, lazy, primary, order = 1, qualifier = "..", depends_on = "..")]` - Scope
//!   and resolution metadata.
//! * `#[bean(provides = "dyn Trait")]` - Declare the bean under a trait object.
//! * `#[bean(post_construct = "init", pre_destroy = "close")]` - Lifecycle methods.
//! * `#[inject(bean)]`, `#[inject(qualifier = "..")]`, `#[inject(named)]`, `#[inject(all)]` -
//!   Inject other beans into `Arc<T>` or `Vec<Arc<T>>` fields.
//! * `#[inject(setter)]` - Fill an `Option<Arc<T>>` field after construction.
//! * `#[inject(config = "key")]` - Get a value from the configuration.
//! * `#[inject(bean_name)]` - The name of the bean itself.
//!
//! ### Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use beanbag::{Bean, Container};
//!
//! #[derive(Bean)]
//! struct Message;
//!
//! #[derive(Bean)]
//! #[bean(name = "my_bean", lazy)]
//! pub struct MyBean {
//!     #[inject(bean)]
//!     message: Arc<Message>,
//!     #[inject(bean_name)]
//!     name: String,
//! }
//!
//! let container = Container::builder()
//!     .bean::<Message>()
//!     .bean::<MyBean>()
//!     .build()
//!     .unwrap();
//! assert_eq!(container.get_bean::<MyBean>().unwrap().name, "my_bean");
//! ```

extern crate self as beanbag;

pub use beanbag_core::{
    load_config,
    resolver,
    AppConfigLoader,
    Bean,
    BeanDefinition,
    BeanDefinitionBuilder,
    BeanHandle,
    BeanId,
    Config,
    Container,
    ContainerBuilder,
    Context,
    Dependency,
    InjectionPhase,
    IocError,
    LifecycleState,
    Registry,
    Result,
    Scope,
    Selector,
    TypeKey,
};
pub use beanbag_derive::Bean;
pub use self::log::{log_init, LogOptions};
#[cfg(feature = "tracing_log")]
pub use self::log::LogPatcher;

pub mod log;

/// See module level documentation for more information.
#[macro_export]
macro_rules! run {
    ($($field:ident = $value:expr),* $(,)? $(; $($bean:ty),* $(,)?)?) => {{
        let loader = $crate::AppConfigLoader {
            $(
                $field: $value,
            )*
            ..::std::default::Default::default()
        };

        $crate::log_init().and_then(|_| {
            $crate::run_app(loader, $crate::beans![$($($bean),*)?])
        })
    }};
}

/// Definitions of the listed bean types, in order.
#[macro_export]
macro_rules! beans {
    ($($bean:ty),* $(,)?) => {
        ::std::vec![$(<$bean as $crate::Bean>::definition()),*]
    };
}

/// Runs the application: loads the configuration and builds the container.
///
/// # Parameters
///
/// * `loader` - A configuration [loader](AppConfigLoader) to load [configuration](Config).
/// * `definitions` - The beans of the application, the ones exposed by the logger are added.
///
/// # Returns
///
/// The started [`Container`], or the first error of loading, registration or eager construction.
pub fn run_app<I>(loader: AppConfigLoader, definitions: I) -> Result<Container>
where
    I: IntoIterator<Item = BeanDefinition>,
{
    let config = loader.load()?;

    let container = Container::builder()
        .definitions(self::log::log_definitions())
        .definitions(definitions)
        .config(config)
        .build()?;

    ::log::info!(
        "application {} started with beans {:?}",
        loader.name,
        container.get_bean_definition_names()
    );

    Ok(container)
}
