use thiserror::Error;
use std::io;

use crate::{LifecycleState, TypeKey};

pub type Result<T> = std::result::Result<T, IocError>;

#[derive(Debug, Error)]
pub enum IocError {
    #[error("Register duplicated bean! Name [{name}] of type [{type_name}, {duplicate_type_name}]")]
    DuplicateName {
        name: String,
        type_name: &'static str,
        duplicate_type_name: &'static str,
    },
    #[error("More than one primary bean of type [{type_name}]: {existing} and {name}")]
    AmbiguousPrimary {
        type_name: &'static str,
        existing: String,
        name: String,
    },
    #[error("No bean matching {required}")]
    NoMatch { required: String },
    #[error("Too many candidate beans! Type [{type_name}] of name {candidates:?}")]
    AmbiguousMatch {
        type_name: &'static str,
        candidates: Box<[String]>,
    },
    #[error("circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("container is closed")]
    ContainerClosed,
    #[error("Bean named [{name}] is of type [{actual}] but [{required}] is required")]
    TypeMismatch {
        name: String,
        required: &'static str,
        actual: &'static str,
    },
    #[error("bean [{name}] can not move from {from:?} to {to:?}")]
    IllegalState {
        name: String,
        from: Option<LifecycleState>,
        to: LifecycleState,
    },
    #[error("fetch config error: `{0}`")]
    ConfigError(String),
    #[error("io: `{0}`")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IocError {
    pub(crate) fn no_type(type_key: TypeKey) -> Self {
        Self::NoMatch {
            required: format!("type [{}]", type_key.name()),
        }
    }

    pub(crate) fn no_qualified(type_key: TypeKey, qualifier: &str) -> Self {
        Self::NoMatch {
            required: format!("type [{}] with qualifier [{qualifier}]", type_key.name()),
        }
    }

    pub(crate) fn no_name(name: &str) -> Self {
        Self::NoMatch {
            required: format!("name [{name}]"),
        }
    }
}

impl From<cfg_rs::ConfigError> for IocError {
    fn from(value: cfg_rs::ConfigError) -> Self {
        Self::ConfigError(format!("{value:?}"))
    }
}
