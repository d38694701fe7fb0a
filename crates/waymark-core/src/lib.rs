//! # Waymark Core
//!
//! Core library providing the matchers, routes, and dispatcher for
//! Waymark.
//!
//! This crate is not meant to be used directly. Use `waymark` instead.

mod app;
mod codec;
mod dispatch;
mod entity;
mod error;
mod headers;
mod mode;
mod param;
mod path;
mod query;
mod request;
mod response;
mod route;
mod server;
mod static_files;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;
pub mod tuple;

// Public API
pub use app::Waymark;
pub use codec::{Codec, DecodeError, SeqCodec, SeqDecodeError};
pub use dispatch::Dispatcher;
pub use entity::{EntityCodec, EntityError};
pub use error::Fault;
pub use headers::{HeaderError, Headers};
pub use mode::Mode;
pub use param::{Param, Segment};
pub use path::{Path, PathElement, PathError};
pub use query::{parse_query_string, render_query_string, Query, QueryError, QueryMap};
pub use request::{Record, Request, RouteMiss};
pub use response::{HttpResponse, Response};
pub use route::{Handler, Route, RouteFuture, RouteHandler};
pub use server::DEFAULT_BODY_LIMIT;
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};
pub use tuple::Combine;
