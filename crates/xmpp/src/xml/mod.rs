//! Minimal XML plumbing: a deterministic string builder for outgoing stanzas
//! and a pull cursor over incoming ones.

mod builder;
mod cursor;

pub use builder::XmlBuilder;
pub use cursor::{EndTag, StartTag, XmlCursor, XmlEvent};
