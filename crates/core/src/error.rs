use thiserror::Error;

/// Failures while turning configuration into a usable client identity.
#[derive(Error, Debug)]
pub enum XabberError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Identifier error: {0}")]
    Entity(#[from] crate::entity::EntityError),
}

pub type Result<T> = std::result::Result<T, XabberError>;
