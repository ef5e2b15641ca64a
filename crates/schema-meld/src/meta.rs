//! Field-location descriptors.
//!
//! A [`Meta`] says where a top-level value was observed: which part of
//! the request (or of a response with a given status) it came from, and
//! under which key. The melding engine only ever compares them for
//! equality to decide whether two entries describe the same field.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where in an HTTP message a value lives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    Auth,
    Empty,
    Multipart,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Path => "path",
            Location::Query => "query",
            Location::Header => "header",
            Location::Cookie => "cookie",
            Location::Body => "body",
            Location::Auth => "auth",
            Location::Empty => "empty",
            Location::Multipart => "multipart",
        }
    }
}

/// Field-location descriptor attached to top-level values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Meta {
    /// Part of the message the value was found in
    pub location: Location,

    /// Parameter/header/cookie name, or the media type for bodies
    #[serde(default)]
    pub key: String,

    /// Status code of the response; `None` for request arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
}

impl Meta {
    /// Descriptor for a request argument.
    pub fn arg(location: Location, key: impl Into<String>) -> Self {
        Self {
            location,
            key: key.into(),
            response_code: None,
        }
    }

    /// Descriptor for part of a response with the given status code.
    pub fn response(code: u16, location: Location, key: impl Into<String>) -> Self {
        Self {
            location,
            key: key.into(),
            response_code: Some(code),
        }
    }

    pub fn is_response(&self) -> bool {
        self.response_code.is_some()
    }

    /// Whether this describes part of a 4xx response.
    pub fn is_4xx(&self) -> bool {
        matches!(self.response_code, Some(400..=499))
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.response_code {
            Some(code) => write!(f, "response[{code}].{}", self.location.as_str())?,
            None => write!(f, "arg.{}", self.location.as_str())?,
        }
        if !self.key.is_empty() {
            write!(f, ".{}", self.key)?;
        }
        Ok(())
    }
}
