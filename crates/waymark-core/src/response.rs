//! Typed response descriptions.
//!
//! A [`Response<R>`] describes how a route answers once its handler has
//! produced an `R`: a status and entity codec, a static resource, or a
//! WebSocket upgrade. Combinators wrap a description without changing its
//! input type, except [`Response::or_else`], which widens it to a
//! `Result` so one route can answer in two shapes.
//!
//! Static resource descriptions are optional at heart: the file may not be
//! there. An unhandled missing resource is treated as an internal error;
//! route it through [`Response::or_not_found`] to turn it into a 404
//! instead.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use tracing::{error, warn};

use crate::entity::EntityCodec;
use crate::static_files::{load_file, sanitize_name, sanitize_segments};

/// The concrete response type every route ultimately puts on the wire.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Builds a `text/plain` response.
pub(crate) fn plain(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    let bytes = Bytes::from(body.into().into_bytes());
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Full::new(bytes))
        .unwrap()
}

/// Builds a response with no body at all.
pub(crate) fn empty(status: StatusCode) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_LENGTH, 0)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Builds a `text/html` response.
pub(crate) fn html(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    let bytes = Bytes::from(body.into().into_bytes());
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Full::new(bytes))
        .unwrap()
}

fn entity_response(status: StatusCode, content_type: Option<&'static str>, bytes: Bytes) -> HttpResponse {
    let mut builder = http::Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Full::new(bytes))
        .unwrap()
}

/// Outcome of rendering a response description.
///
/// `Empty` marks the missing case of an optional description, kept
/// distinct so `or_empty`/`or_not_found` can still rewrite it. A static
/// lookup carries the attempted filesystem path so an unhandled miss can
/// name it. An `Empty` that reaches the wire unhandled becomes a 500.
pub(crate) enum Rendered {
    Full(HttpResponse),
    Empty(Option<String>),
}

impl Rendered {
    pub(crate) fn into_http(self) -> HttpResponse {
        match self {
            Rendered::Full(response) => response,
            Rendered::Empty(missing) => {
                match missing {
                    Some(path) => error!(
                        path = %path,
                        "static resource is missing and the route does not handle it"
                    ),
                    None => error!("optional response was empty and the route does not handle it"),
                }
                plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

type RespondFn<R> = Arc<dyn Fn(&HeaderMap, R) -> BoxFuture<'static, Rendered> + Send + Sync>;

/// A typed description of a route's answer.
///
/// The input type `R` is what the route's handler must produce. Rendering
/// may read the request headers (the WebSocket upgrade does) but never the
/// request body or URI.
pub struct Response<R> {
    describe: String,
    respond: RespondFn<R>,
}

impl<R> Clone for Response<R> {
    fn clone(&self) -> Self {
        Self { describe: self.describe.clone(), respond: self.respond.clone() }
    }
}

impl<R> fmt::Debug for Response<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response").field("describe", &self.describe).finish()
    }
}

impl<R> Response<R> {
    /// Human-readable form of this description, e.g.
    /// `200 OK (application/json)`.
    pub fn describe(&self) -> &str {
        &self.describe
    }

    pub(crate) fn respond(&self, headers: &HeaderMap, value: R) -> BoxFuture<'static, Rendered> {
        (self.respond)(headers, value)
    }
}

impl<R: Send + 'static> Response<R> {
    /// Answers with `status` and the encoded entity.
    ///
    /// An entity that fails to encode is logged and answered as a 500; it
    /// never falls through to other routes.
    pub fn status(status: StatusCode, entity: EntityCodec<R>) -> Self {
        let describe = match entity.content_type() {
            Some(content_type) => format!("{status} ({content_type})"),
            None => status.to_string(),
        };
        Response {
            describe,
            respond: Arc::new(move |_headers, value: R| {
                let entity = entity.clone();
                Box::pin(async move {
                    match entity.encode(&value) {
                        Ok(bytes) => {
                            Rendered::Full(entity_response(status, entity.content_type(), bytes))
                        }
                        Err(err) => {
                            error!(error = %err, "response entity failed to encode");
                            Rendered::Full(plain(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "internal server error",
                            ))
                        }
                    }
                })
            }),
        }
    }

    /// Answers with `200 OK` and the encoded entity.
    pub fn ok(entity: EntityCodec<R>) -> Self {
        Self::status(StatusCode::OK, entity)
    }

    /// Accepts `Option<R>`, rendering `None` as the empty case.
    ///
    /// Pair with [`or_empty`](Self::or_empty) or
    /// [`or_not_found`](Self::or_not_found) to choose what absence
    /// answers; an unpaired `None` is a 500, like a missing static file.
    pub fn optional(self) -> Response<Option<R>> {
        let inner = self.respond;
        Response {
            describe: format!("{} optional", self.describe),
            respond: Arc::new(move |headers, value: Option<R>| match value {
                Some(value) => inner(headers, value),
                None => Box::pin(async { Rendered::Empty(None) }),
            }),
        }
    }

    /// Renders the empty case of an optional description as an empty
    /// `200 OK` instead of an internal error.
    pub fn or_empty(self) -> Response<R> {
        let inner = self.respond;
        Response {
            describe: format!("{} or empty", self.describe),
            respond: Arc::new(move |headers, value: R| {
                let rendering = inner(headers, value);
                Box::pin(async move {
                    match rendering.await {
                        Rendered::Empty(_) => {
                            Rendered::Full(entity_response(StatusCode::OK, None, Bytes::new()))
                        }
                        full => full,
                    }
                })
            }),
        }
    }

    /// Renders the empty case of an optional description as a bare 404.
    pub fn or_not_found(self) -> Response<R> {
        let inner = self.respond;
        Response {
            describe: format!("{} or 404", self.describe),
            respond: Arc::new(move |headers, value: R| {
                let rendering = inner(headers, value);
                Box::pin(async move {
                    match rendering.await {
                        Rendered::Empty(_) => Rendered::Full(entity_response(
                            StatusCode::NOT_FOUND,
                            None,
                            Bytes::new(),
                        )),
                        full => full,
                    }
                })
            }),
        }
    }

    /// Adds a fixed header to every rendered response.
    ///
    /// Invalid names or values are route-table construction bugs and panic
    /// immediately, like appending to a closed path does.
    pub fn with_header(self, name: &str, value: &str) -> Response<R> {
        let header_name = HeaderName::try_from(name)
            .unwrap_or_else(|_| panic!("invalid header name `{name}`"));
        let header_value = HeaderValue::try_from(value)
            .unwrap_or_else(|_| panic!("invalid value for header `{name}`"));
        let inner = self.respond;
        Response {
            describe: format!("{} +{name}", self.describe),
            respond: Arc::new(move |headers, value: R| {
                let rendering = inner(headers, value);
                let header_name = header_name.clone();
                let header_value = header_value.clone();
                Box::pin(async move {
                    match rendering.await {
                        Rendered::Full(mut response) => {
                            response.headers_mut().append(header_name, header_value);
                            Rendered::Full(response)
                        }
                        empty => empty,
                    }
                })
            }),
        }
    }

    /// Answers with this description on `Ok` and with `other` on `Err`.
    ///
    /// The receiver keeps the success arm, so chaining reads in
    /// declaration order: the first-written description handles `Ok`.
    pub fn or_else<R2: Send + 'static>(self, other: Response<R2>) -> Response<Result<R, R2>> {
        let first = self.respond;
        let second = other.respond;
        Response {
            describe: format!("{} else {}", self.describe, other.describe),
            respond: Arc::new(move |headers, value: Result<R, R2>| match value {
                Ok(value) => first(headers, value),
                Err(value) => second(headers, value),
            }),
        }
    }
}

async fn render_file(path: PathBuf) -> Rendered {
    match load_file(&path).await {
        Ok(file) => Rendered::Full(entity_response(
            StatusCode::OK,
            Some(file.content_type),
            file.bytes,
        )),
        Err(err) if err.is_not_found() => Rendered::Empty(Some(path.display().to_string())),
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read static resource");
            Rendered::Full(plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error"))
        }
    }
}

impl Response<()> {
    /// Serves the named resource from under `root`.
    ///
    /// The name is sanitized against directory traversal at construction.
    pub fn resource(root: impl Into<PathBuf>, name: &str) -> Self {
        let path = root.into().join(sanitize_name(name));
        Response {
            describe: format!("resource {}", path.display()),
            respond: Arc::new(move |_headers, ()| {
                let path = path.clone();
                Box::pin(render_file(path))
            }),
        }
    }

    /// Serves exactly the given file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Response {
            describe: format!("file {}", path.display()),
            respond: Arc::new(move |_headers, ()| {
                let path = path.clone();
                Box::pin(render_file(path))
            }),
        }
    }

    /// Accepts a WebSocket upgrade.
    ///
    /// Answers `101 Switching Protocols` with the accept key derived from
    /// the request's `Sec-WebSocket-Key`. A request that is not a valid
    /// upgrade (no `Upgrade: websocket`, no `Upgrade` token in
    /// `Connection`, a missing key, or a `Sec-WebSocket-Version` other
    /// than 13) answers `400 Bad Request` naming what was wrong.
    pub fn websocket() -> Self {
        Response {
            describe: "websocket upgrade".to_owned(),
            respond: Arc::new(move |headers, ()| {
                let key = upgrade_key(headers);
                Box::pin(async move {
                    Rendered::Full(match key {
                        Ok(key) => upgrade_response(&key),
                        Err(reason) => {
                            warn!(reason, "refused websocket upgrade");
                            plain(StatusCode::BAD_REQUEST, reason)
                        }
                    })
                })
            }),
        }
    }
}

impl Response<Vec<String>> {
    /// Serves files from under `root`, named by the captured path
    /// components.
    ///
    /// Pairs with an all-param path: the captured components are sanitized
    /// and joined beneath the root.
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Response {
            describe: format!("directory {}", root.display()),
            respond: Arc::new(move |_headers, segments: Vec<String>| {
                let path = root.join(sanitize_segments(&segments));
                Box::pin(render_file(path))
            }),
        }
    }
}

/// Checks the handshake headers of an upgrade request and yields the
/// client's `Sec-WebSocket-Key`, or the reason the request is not a
/// WebSocket upgrade.
fn upgrade_key(headers: &HeaderMap) -> Result<String, &'static str> {
    let upgrade = headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .ok_or("missing Upgrade header")?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err("Upgrade header must be `websocket`");
    }

    // Connection is a comma-separated token list.
    let connection = headers
        .get(header::CONNECTION)
        .and_then(|value| value.to_str().ok())
        .ok_or("missing Connection header")?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err("Connection header must contain `Upgrade`");
    }

    let key = headers
        .get("sec-websocket-key")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing Sec-WebSocket-Key header")?;

    let version = headers
        .get("sec-websocket-version")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing Sec-WebSocket-Version header")?;
    if version != "13" {
        return Err("Sec-WebSocket-Version must be 13");
    }

    Ok(key.to_owned())
}

fn upgrade_response(key: &str) -> HttpResponse {
    http::Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .header("sec-websocket-accept", accept_key(key))
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Derives the `Sec-WebSocket-Accept` value from the client's key.
fn accept_key(key: &str) -> String {
    use base64::Engine;
    use sha1::{Digest, Sha1};

    const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde::{Deserialize, Serialize};

    async fn body_of(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        message: String,
    }

    #[tokio::test]
    async fn ok_encodes_the_entity() {
        let response = Response::ok(EntityCodec::<Greeting>::json());
        let rendered = response
            .respond(&HeaderMap::new(), Greeting { message: "hi".into() })
            .await
            .into_http();
        assert_eq!(rendered.status(), StatusCode::OK);
        assert_eq!(
            rendered.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(body_of(rendered).await, Bytes::from_static(b"{\"message\":\"hi\"}"));
    }

    #[tokio::test]
    async fn status_sets_the_code() {
        let response = Response::status(StatusCode::CREATED, EntityCodec::<Greeting>::json());
        let rendered = response
            .respond(&HeaderMap::new(), Greeting { message: "made".into() })
            .await
            .into_http();
        assert_eq!(rendered.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unencodable_entities_become_500() {
        let broken: EntityCodec<String> = EntityCodec::new(
            Some("application/json"),
            |_: &Bytes| Ok(String::new()),
            |_: &String| {
                Err(crate::entity::EntityError::Unrenderable {
                    content_type: "application/json",
                    detail: "boom".into(),
                })
            },
        );
        let response = Response::ok(broken);
        let rendered = response
            .respond(&HeaderMap::new(), "x".to_owned())
            .await
            .into_http();
        assert_eq!(rendered.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn file_serves_bytes_with_a_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.css");
        std::fs::write(&path, b"body{}").unwrap();

        let response = Response::file(&path);
        let rendered = response.respond(&HeaderMap::new(), ()).await.into_http();
        assert_eq!(rendered.status(), StatusCode::OK);
        assert_eq!(rendered.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");
        assert_eq!(body_of(rendered).await, Bytes::from_static(b"body{}"));
    }

    #[tokio::test]
    async fn missing_resource_is_an_internal_error_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response::resource(dir.path(), "missing.txt");
        let rendered = response.respond(&HeaderMap::new(), ()).await.into_http();
        assert_eq!(rendered.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unhandled_none_is_an_internal_error_like_a_missing_file() {
        let response = Response::ok(EntityCodec::<Greeting>::json()).optional();
        let rendered = response.respond(&HeaderMap::new(), None).await.into_http();
        assert_eq!(rendered.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn or_not_found_turns_the_missing_case_into_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response::resource(dir.path(), "missing.txt").or_not_found();
        let rendered = response.respond(&HeaderMap::new(), ()).await.into_http();
        assert_eq!(rendered.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(rendered).await, Bytes::new());
    }

    #[tokio::test]
    async fn or_empty_turns_the_missing_case_into_an_empty_200() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response::resource(dir.path(), "missing.txt").or_empty();
        let rendered = response.respond(&HeaderMap::new(), ()).await.into_http();
        assert_eq!(rendered.status(), StatusCode::OK);
        assert_eq!(body_of(rendered).await, Bytes::new());
    }

    #[tokio::test]
    async fn resource_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("safe.txt"), b"ok").unwrap();
        let response = Response::resource(dir.path(), "../safe.txt").or_not_found();
        let rendered = response.respond(&HeaderMap::new(), ()).await.into_http();
        // `..` is dropped, so the sanitized name still resolves inside root.
        assert_eq!(rendered.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn directory_serves_captured_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), b"body{}").unwrap();

        let response = Response::directory(dir.path()).or_not_found();
        let hit = response
            .respond(&HeaderMap::new(), vec!["css".into(), "site.css".into()])
            .await
            .into_http();
        assert_eq!(hit.status(), StatusCode::OK);

        let traversal = response
            .respond(&HeaderMap::new(), vec!["..".into(), "css".into(), "site.css".into()])
            .await
            .into_http();
        // The `..` is stripped, leaving css/site.css under root.
        assert_eq!(traversal.status(), StatusCode::OK);

        let miss = response
            .respond(&HeaderMap::new(), vec!["nope.css".into()])
            .await
            .into_http();
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn optional_renders_some_and_maps_none_to_the_chosen_arm() {
        let response = Response::ok(EntityCodec::<Greeting>::json())
            .optional()
            .or_not_found();

        let some = response
            .respond(&HeaderMap::new(), Some(Greeting { message: "hi".into() }))
            .await
            .into_http();
        assert_eq!(some.status(), StatusCode::OK);

        let none = response.respond(&HeaderMap::new(), None).await.into_http();
        assert_eq!(none.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(none).await, Bytes::new());
    }

    #[tokio::test]
    async fn or_else_picks_the_arm_by_result() {
        let success = Response::ok(EntityCodec::<Greeting>::json());
        let failure = Response::status(StatusCode::CONFLICT, EntityCodec::text());
        let response = success.or_else(failure);

        let ok = response
            .respond(&HeaderMap::new(), Ok(Greeting { message: "hi".into() }))
            .await
            .into_http();
        assert_eq!(ok.status(), StatusCode::OK);

        let err = response
            .respond(&HeaderMap::new(), Err("taken".to_owned()))
            .await
            .into_http();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(body_of(err).await, Bytes::from_static(b"taken"));
    }

    #[tokio::test]
    async fn with_header_appends_to_the_rendered_response() {
        let response = Response::ok(EntityCodec::text()).with_header("x-frame-options", "DENY");
        let rendered = response
            .respond(&HeaderMap::new(), "hi".to_owned())
            .await
            .into_http();
        assert_eq!(rendered.headers()["x-frame-options"], "DENY");
    }

    #[test]
    #[should_panic(expected = "invalid header name")]
    fn with_header_rejects_bad_names_at_construction() {
        let _ = Response::ok(EntityCodec::text()).with_header("bad name", "x");
    }

    /// A complete client handshake, with the example key from RFC 6455.
    fn upgrade_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(
            "sec-websocket-key",
            HeaderValue::from_static("dGhlIHNhbXBsZSBub25jZQ=="),
        );
        headers.insert("sec-websocket-version", HeaderValue::from_static("13"));
        headers
    }

    #[tokio::test]
    async fn websocket_answers_with_the_derived_accept_key() {
        let response = Response::websocket();

        let rendered = response.respond(&upgrade_headers(), ()).await.into_http();
        assert_eq!(rendered.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(
            rendered.headers()["sec-websocket-accept"],
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
        assert_eq!(rendered.headers()[header::UPGRADE], "websocket");

        let refused = response.respond(&HeaderMap::new(), ()).await.into_http();
        assert_eq!(refused.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn websocket_refuses_incomplete_upgrade_requests() {
        let response = Response::websocket();

        for absent in [
            header::UPGRADE.as_str(),
            header::CONNECTION.as_str(),
            "sec-websocket-key",
            "sec-websocket-version",
        ] {
            let mut headers = upgrade_headers();
            headers.remove(absent);
            let refused = response.respond(&headers, ()).await.into_http();
            assert_eq!(refused.status(), StatusCode::BAD_REQUEST, "without {absent}");
        }

        let mut wrong_version = upgrade_headers();
        wrong_version.insert("sec-websocket-version", HeaderValue::from_static("8"));
        let refused = response.respond(&wrong_version, ()).await.into_http();
        assert_eq!(refused.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_of(refused).await,
            Bytes::from_static(b"Sec-WebSocket-Version must be 13")
        );
    }

    #[tokio::test]
    async fn websocket_upgrade_tokens_are_case_insensitive() {
        let response = Response::websocket();

        let mut headers = upgrade_headers();
        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        headers.insert(
            header::CONNECTION,
            HeaderValue::from_static("keep-alive, upgrade"),
        );
        let rendered = response.respond(&headers, ()).await.into_http();
        assert_eq!(rendered.status(), StatusCode::SWITCHING_PROTOCOLS);
    }

    #[test]
    fn describe_reflects_the_combinators() {
        let response = Response::ok(EntityCodec::<Greeting>::json());
        assert_eq!(response.describe(), "200 OK (application/json)");
        assert_eq!(
            Response::websocket().or_not_found().describe(),
            "websocket upgrade or 404"
        );
    }
}
