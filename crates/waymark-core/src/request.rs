//! Typed request descriptions.
//!
//! A [`Request`] bundles a method, a [`Path`], and optional [`Query`],
//! [`Headers`], and entity matchers into one description of the requests a
//! route accepts. Extraction runs the pieces in a fixed order (method,
//! path, query, headers, entity) and concatenates their captures into a
//! single flat record:
//!
//! ```rust,ignore
//! let view = Request::get(Path::root() / "user" / Param::int("user_id") / "view")
//!     .with_query(Query::new().required("page", Codec::int()));
//! // extraction yields (i64, i64)
//! ```
//!
//! The same description drives reverse routing: [`Request::path_to`]
//! renders the URI path that extraction would have matched.

use std::fmt;

use bytes::Bytes;
use http::request::Parts;
use http::Method;
use thiserror::Error;

use crate::entity::{EntityCodec, EntityError, EntitySpec};
use crate::headers::{HeaderError, Headers};
use crate::path::{Path, PathError};
use crate::query::{parse_query_string, Query, QueryError};
use crate::tuple::Combine;

/// The flat record a request description extracts: path captures, then
/// query, then headers, then the entity.
pub type Record<P, Q, H, E> =
    <<<P as Combine<Q>>::Out as Combine<H>>::Out as Combine<E>>::Out;

/// Why a request description did not match, in the order the pieces are
/// checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteMiss {
    /// Wrong HTTP method.
    #[error("method: expected {expected}, found {found}")]
    Method { expected: Method, found: Method },
    /// The path did not match.
    #[error("path: {0}")]
    Path(#[from] PathError),
    /// The query did not match.
    #[error("query: {0}")]
    Query(#[from] QueryError),
    /// The headers did not match.
    #[error("headers: {0}")]
    Headers(#[from] HeaderError),
    /// The entity did not decode.
    #[error("entity: {0}")]
    Entity(#[from] EntityError),
}

/// A typed description of the requests a route accepts.
///
/// Type parameters are the capture tuples of each piece; the unit defaults
/// mean an unadorned `Request<P>` captures exactly what its path captures.
pub struct Request<P, Q = (), H = (), E = ()> {
    method: Method,
    path: Path<P>,
    query: Query<Q>,
    headers: Headers<H>,
    entity: EntitySpec<E>,
}

impl<P, Q, H, E> Clone for Request<P, Q, H, E> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            entity: self.entity.clone(),
        }
    }
}

impl<P, Q, H, E> fmt::Debug for Request<P, Q, H, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request").field("describe", &self.describe()).finish()
    }
}

impl<P: 'static> Request<P> {
    /// A request matching `method` on `path`, with no query, header, or
    /// entity requirements.
    pub fn new(method: Method, path: Path<P>) -> Self {
        Request {
            method,
            path,
            query: Query::new(),
            headers: Headers::new(),
            entity: EntitySpec::none(),
        }
    }

    /// `GET` on `path`.
    pub fn get(path: Path<P>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` on `path`.
    pub fn post(path: Path<P>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT` on `path`.
    pub fn put(path: Path<P>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE` on `path`.
    pub fn delete(path: Path<P>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// `PATCH` on `path`.
    pub fn patch(path: Path<P>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `HEAD` on `path`.
    pub fn head(path: Path<P>) -> Self {
        Self::new(Method::HEAD, path)
    }
}

impl<P, Q, H, E> Request<P, Q, H, E> {
    /// Sets the query description, replacing any previous one.
    pub fn with_query<Q2: 'static>(self, query: Query<Q2>) -> Request<P, Q2, H, E> {
        Request {
            method: self.method,
            path: self.path,
            query,
            headers: self.headers,
            entity: self.entity,
        }
    }

    /// Sets the header description, replacing any previous one.
    pub fn with_headers<H2: 'static>(self, headers: Headers<H2>) -> Request<P, Q, H2, E> {
        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            headers,
            entity: self.entity,
        }
    }

    /// Sets the request entity, replacing any previous one.
    ///
    /// The decoded value joins the record after the header captures.
    pub fn with_entity<T: 'static>(self, entity: EntityCodec<T>) -> Request<P, Q, H, (T,)> {
        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            entity: EntitySpec::from_codec(entity),
        }
    }

    /// The HTTP method this request matches.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Human-readable form of the whole description, e.g.
    /// `GET /user/{user_id}/view?page=<an integer>`.
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}{}", self.method, self.path.describe(), self.query.describe());
        let headers = self.headers.describe();
        if !headers.is_empty() {
            out.push(' ');
            out.push_str(&headers);
        }
        if let Some(content_type) = self.entity.content_type() {
            out.push_str(" (");
            out.push_str(content_type);
            out.push(')');
        }
        out
    }
}

impl<P: 'static, Q, H, E> Request<P, Q, H, E> {
    /// Renders path captures into the URI path this request matches.
    ///
    /// This is the reverse-routing entry point: links to a route are
    /// generated from the route's own description and cannot drift from
    /// its matching.
    pub fn path_to(&self, params: P) -> String {
        self.path.path_to(params)
    }
}

impl<P, Q, H, E> Request<P, Q, H, E>
where
    P: Combine<Q> + 'static,
    Q: 'static,
    H: 'static,
    E: 'static,
    <P as Combine<Q>>::Out: Combine<H>,
    <<P as Combine<Q>>::Out as Combine<H>>::Out: Combine<E>,
{
    /// Matches a buffered request against this description.
    pub fn extract(&self, parts: &Parts, body: &Bytes) -> Option<Record<P, Q, H, E>> {
        self.try_extract(parts, body).ok()
    }

    /// Like [`extract`](Self::extract), but reports the first piece that
    /// failed.
    pub fn try_extract(&self, parts: &Parts, body: &Bytes) -> Result<Record<P, Q, H, E>, RouteMiss> {
        if parts.method != self.method {
            return Err(RouteMiss::Method {
                expected: self.method.clone(),
                found: parts.method.clone(),
            });
        }
        let path = self.path.try_extract(parts.uri.path())?;
        let query_map = parse_query_string(parts.uri.query().unwrap_or(""));
        let query = self.query.try_extract(&query_map)?;
        let headers = self.headers.try_extract(&parts.headers)?;
        let entity = self.entity.decode(body)?;
        Ok(path.combine(query).combine(headers).combine(entity))
    }
}
