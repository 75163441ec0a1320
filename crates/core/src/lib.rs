pub mod config;
pub mod entity;
pub mod error;
pub mod logging;

pub use entity::{AccountJid, ContactJid, EntityError, GroupChat, GroupMember};
pub use error::{Result, XabberError};
