//! Header matchers.
//!
//! Headers only matter on the decode side of a route; reverse routing
//! renders paths, not header blocks. A [`Headers<H>`] either asserts that
//! a header carries an exact value or captures a header's value through a
//! [`Codec`], accumulating captures positionally like path and query
//! params do.

use std::fmt;
use std::sync::Arc;

use http::header::HeaderMap;
use thiserror::Error;

use crate::codec::{Codec, DecodeError};
use crate::tuple::Combine;

/// Why a header block did not match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The header was not present.
    #[error("missing header `{name}`")]
    Missing { name: &'static str },
    /// An exact-value header carried a different value.
    #[error("header `{name}`: expected `{expected}`, found `{found}`")]
    Mismatch {
        name: &'static str,
        expected: String,
        found: String,
    },
    /// The header value was not valid UTF-8.
    #[error("header `{name}` is not valid UTF-8")]
    NotText { name: &'static str },
    /// A captured header rejected its value.
    #[error("header `{name}`: {source}")]
    Value {
        name: &'static str,
        source: DecodeError,
    },
}

#[derive(Debug, Clone)]
enum HeaderShape {
    Exact { name: &'static str, value: String },
    Capture { name: &'static str, expected: String },
}

impl fmt::Display for HeaderShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderShape::Exact { name, value } => write!(f, "{name}: {value}"),
            HeaderShape::Capture { name, expected } => write!(f, "{name}: <{expected}>"),
        }
    }
}

type HeadersDecodeFn<H> = Arc<dyn Fn(&HeaderMap) -> Result<H, HeaderError> + Send + Sync>;

/// A matcher over request headers, capturing `H`.
pub struct Headers<H> {
    shape: Vec<HeaderShape>,
    decode: HeadersDecodeFn<H>,
}

impl<H> Clone for Headers<H> {
    fn clone(&self) -> Self {
        Self { shape: self.shape.clone(), decode: self.decode.clone() }
    }
}

impl<H> fmt::Debug for Headers<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Headers").field("describe", &self.describe()).finish()
    }
}

fn header_text<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<Option<&'a str>, HeaderError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| HeaderError::NotText { name }),
    }
}

impl Headers<()> {
    /// A header matcher with no requirements. Matches every request.
    pub fn new() -> Self {
        Headers {
            shape: Vec::new(),
            decode: Arc::new(|_: &HeaderMap| Ok(())),
        }
    }
}

impl Default for Headers<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Headers<H> {
    /// Human-readable form of the declared headers, or the empty string.
    pub fn describe(&self) -> String {
        if self.shape.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = self.shape.iter().map(HeaderShape::to_string).collect();
        format!("[{}]", rendered.join("; "))
    }
}

impl<H: 'static> Headers<H> {
    /// Decodes a header map into this matcher's captures.
    pub fn extract(&self, headers: &HeaderMap) -> Option<H> {
        self.try_extract(headers).ok()
    }

    /// Like [`extract`](Self::extract), but reports why matching failed.
    pub fn try_extract(&self, headers: &HeaderMap) -> Result<H, HeaderError> {
        (self.decode)(headers)
    }

    /// Requires `name` to be present with exactly `value`.
    ///
    /// Header names compare case-insensitively; values byte-for-byte.
    /// Captures nothing.
    pub fn exact(self, name: &'static str, value: impl Into<String>) -> Headers<H> {
        let value = value.into();
        let mut shape = self.shape;
        shape.push(HeaderShape::Exact { name, value: value.clone() });

        let prev = self.decode;
        let decode = Arc::new(move |headers: &HeaderMap| {
            let prefix = prev(headers)?;
            match header_text(headers, name)? {
                Some(found) if found == value => Ok(prefix),
                Some(found) => Err(HeaderError::Mismatch {
                    name,
                    expected: value.clone(),
                    found: found.to_owned(),
                }),
                None => Err(HeaderError::Missing { name }),
            }
        });

        Headers { shape, decode }
    }

    /// Requires `name` to be present and captures its value through
    /// `codec`.
    pub fn capture<A>(self, name: &'static str, codec: Codec<A>) -> Headers<<H as Combine<(A,)>>::Out>
    where
        A: 'static,
        H: Combine<(A,)>,
        <H as Combine<(A,)>>::Out: 'static,
    {
        let mut shape = self.shape;
        shape.push(HeaderShape::Capture { name, expected: codec.expected().to_owned() });

        let prev = self.decode;
        let decode = Arc::new(move |headers: &HeaderMap| {
            let prefix = prev(headers)?;
            let raw = header_text(headers, name)?.ok_or(HeaderError::Missing { name })?;
            let value = codec
                .decode(raw)
                .map_err(|source| HeaderError::Value { name, source })?;
            Ok(prefix.combine((value,)))
        });

        Headers { shape, decode }
    }

    /// Requires `name` to be present and captures it verbatim.
    pub fn value(self, name: &'static str) -> Headers<<H as Combine<(String,)>>::Out>
    where
        H: Combine<(String,)>,
        <H as Combine<(String,)>>::Out: 'static,
    {
        self.capture(name, Codec::string())
    }
}
