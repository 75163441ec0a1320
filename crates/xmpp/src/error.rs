use thiserror::Error;

use crate::stanza::StanzaError;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("stream error: {0}")]
    StreamError(String),

    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    TransportError(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("expected <{expected}/>, found <{found}/>")]
    UnexpectedElement { expected: String, found: String },

    #[error("<{element}/> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("<{element}/> is missing required child <{child}/>")]
    MissingChild { element: String, child: String },

    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: String, value: String },

    #[error("invalid JID {value:?}: {message}")]
    InvalidJid { value: String, message: String },

    #[error("document ended before any element")]
    EmptyDocument,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("field '{0}' already exists in this form")]
    DuplicateVariable(String),

    #[error("field '{0}' is not part of the original form")]
    UnknownField(String),

    #[error("field '{0}' carries several values; only single-value fields can be edited")]
    MultiValueField(String),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("server returned an error: {0}")]
    Stanza(StanzaError),

    #[error("no reply to request {id} within the configured timeout")]
    Timeout { id: String },

    #[error("a request with id {0} is already in flight")]
    DuplicateId(String),

    #[error("request {id} was cancelled before a reply arrived")]
    Cancelled { id: String },

    #[error("reply to {id} carried an unexpected payload")]
    UnexpectedPayload { id: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Form(#[from] FormError),
}
