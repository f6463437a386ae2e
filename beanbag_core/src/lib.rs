pub use bean::{
    Bean,
    BeanDefinition,
    BeanDefinitionBuilder,
    Dependency,
    InjectionPhase,
    Scope,
    Selector,
    TypeKey,
};
pub use config::{
    AppConfigLoader, Config,
};
pub use container::{BeanHandle, Container, ContainerBuilder};
pub use context::Context;
pub use error::{IocError, Result};
pub use lifecycle::LifecycleState;
pub use registry::{BeanId, Registry};

#[macro_export]
macro_rules! load_config {
    ($($field:ident = $value:expr),* $(,)?) => {
        $crate::AppConfigLoader {
            $(
                $field: $value,
            )*
            ..::std::default::Default::default()
        }.load()
    }
 }

mod bean;
mod config;
mod container;
mod context;
mod error;
mod instantiator;
mod lifecycle;
mod registry;
pub mod resolver;
