//! Entity codecs: typed request and response bodies.
//!
//! An [`EntityCodec`] pairs a body decoder with the matching encoder so the
//! same description can sit on the request side of one route and the
//! response side of another. Bodies are buffered before decoding; a codec
//! sees the complete bytes.
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct CreateUser { name: String }
//!
//! let entity: EntityCodec<CreateUser> = EntityCodec::json();
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Why an entity failed to decode or encode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The body did not decode as the expected representation.
    #[error("invalid {content_type} entity: {detail}")]
    Invalid {
        content_type: &'static str,
        detail: String,
    },
    /// The value could not be rendered into a body.
    #[error("could not render {content_type} entity: {detail}")]
    Unrenderable {
        content_type: &'static str,
        detail: String,
    },
}

type EntityDecodeFn<T> = Arc<dyn Fn(&Bytes) -> Result<T, EntityError> + Send + Sync>;
type EntityEncodeFn<T> = Arc<dyn Fn(&T) -> Result<Bytes, EntityError> + Send + Sync>;

/// An invertible codec between a request/response body and a value of
/// type `T`.
pub struct EntityCodec<T> {
    content_type: Option<&'static str>,
    decode: EntityDecodeFn<T>,
    encode: EntityEncodeFn<T>,
}

impl<T> Clone for EntityCodec<T> {
    fn clone(&self) -> Self {
        Self {
            content_type: self.content_type,
            decode: self.decode.clone(),
            encode: self.encode.clone(),
        }
    }
}

impl<T> fmt::Debug for EntityCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCodec")
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl<T: 'static> EntityCodec<T> {
    /// Builds an entity codec from a decode function and its inverse.
    ///
    /// `content_type` is sent on responses and shown in diagnostics;
    /// `None` means the entity has no representation, like `()`.
    pub fn new<D, E>(content_type: Option<&'static str>, decode: D, encode: E) -> Self
    where
        D: Fn(&Bytes) -> Result<T, EntityError> + Send + Sync + 'static,
        E: Fn(&T) -> Result<Bytes, EntityError> + Send + Sync + 'static,
    {
        Self {
            content_type,
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }
    }

    /// Decodes a complete body.
    pub fn decode(&self, body: &Bytes) -> Result<T, EntityError> {
        (self.decode)(body)
    }

    /// Renders a value into a complete body.
    pub fn encode(&self, value: &T) -> Result<Bytes, EntityError> {
        (self.encode)(value)
    }

    /// The content type this codec reads and writes, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }
}

impl<T> EntityCodec<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    /// JSON in both directions via serde.
    pub fn json() -> Self {
        Self::new(
            Some("application/json"),
            |body: &Bytes| {
                serde_json::from_slice(body).map_err(|err| EntityError::Invalid {
                    content_type: "application/json",
                    detail: err.to_string(),
                })
            },
            |value: &T| {
                serde_json::to_vec(value).map(Bytes::from).map_err(|err| {
                    EntityError::Unrenderable {
                        content_type: "application/json",
                        detail: err.to_string(),
                    }
                })
            },
        )
    }

    /// URL-encoded form in both directions via serde.
    pub fn form() -> Self {
        Self::new(
            Some("application/x-www-form-urlencoded"),
            |body: &Bytes| {
                serde_urlencoded::from_bytes(body).map_err(|err| EntityError::Invalid {
                    content_type: "application/x-www-form-urlencoded",
                    detail: err.to_string(),
                })
            },
            |value: &T| {
                serde_urlencoded::to_string(value)
                    .map(|encoded| Bytes::from(encoded.into_bytes()))
                    .map_err(|err| EntityError::Unrenderable {
                        content_type: "application/x-www-form-urlencoded",
                        detail: err.to_string(),
                    })
            },
        )
    }
}

impl EntityCodec<()> {
    /// The unit entity: ignores any request body, writes none back.
    pub fn none() -> Self {
        Self::new(None, |_: &Bytes| Ok(()), |&()| Ok(Bytes::new()))
    }
}

impl Default for EntityCodec<()> {
    fn default() -> Self {
        Self::none()
    }
}

impl EntityCodec<String> {
    /// UTF-8 text in both directions.
    pub fn text() -> Self {
        Self::new(
            Some("text/plain; charset=utf-8"),
            |body: &Bytes| {
                std::str::from_utf8(body)
                    .map(str::to_owned)
                    .map_err(|err| EntityError::Invalid {
                        content_type: "text/plain; charset=utf-8",
                        detail: err.to_string(),
                    })
            },
            |value: &String| Ok(Bytes::from(value.clone().into_bytes())),
        )
    }

    /// Like [`text`](Self::text), served as `text/html`.
    pub fn html() -> Self {
        Self::new(
            Some("text/html; charset=utf-8"),
            |body: &Bytes| {
                std::str::from_utf8(body)
                    .map(str::to_owned)
                    .map_err(|err| EntityError::Invalid {
                        content_type: "text/html; charset=utf-8",
                        detail: err.to_string(),
                    })
            },
            |value: &String| Ok(Bytes::from(value.clone().into_bytes())),
        )
    }
}

impl EntityCodec<Bytes> {
    /// Raw bytes in both directions.
    pub fn bytes() -> Self {
        Self::new(
            Some("application/octet-stream"),
            |body: &Bytes| Ok(body.clone()),
            |value: &Bytes| Ok(value.clone()),
        )
    }
}

type SpecDecodeFn<E> = Arc<dyn Fn(&Bytes) -> Result<E, EntityError> + Send + Sync>;

/// The request-side entity slot, normalized to a capture tuple.
///
/// A unit entity contributes `()` to the request record and a typed entity
/// contributes `(T,)`, so entity captures concatenate with path and query
/// captures like any other matcher.
pub(crate) struct EntitySpec<E> {
    content_type: Option<&'static str>,
    decode: SpecDecodeFn<E>,
}

impl<E> Clone for EntitySpec<E> {
    fn clone(&self) -> Self {
        Self { content_type: self.content_type, decode: self.decode.clone() }
    }
}

impl EntitySpec<()> {
    pub(crate) fn none() -> Self {
        Self {
            content_type: None,
            decode: Arc::new(|_: &Bytes| Ok(())),
        }
    }
}

impl<T: 'static> EntitySpec<(T,)> {
    pub(crate) fn from_codec(codec: EntityCodec<T>) -> Self {
        Self {
            content_type: codec.content_type(),
            decode: Arc::new(move |body: &Bytes| codec.decode(body).map(|value| (value,))),
        }
    }
}

impl<E> EntitySpec<E> {
    pub(crate) fn decode(&self, body: &Bytes) -> Result<E, EntityError> {
        (self.decode)(body)
    }

    pub(crate) fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }
}
