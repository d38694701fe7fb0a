//! TestClient for integration testing without network binding.
//!
//! Requests go through the exact dispatch pipeline a served request
//! would, body limit included, but never touch a socket.
//!
//! # Example
//!
//! ```rust,ignore
//! use waymark::prelude::*;
//!
//! #[tokio::test]
//! async fn greets() {
//!     let app = Waymark::new().mode(Mode::Production).route(
//!         Route::new(Request::get(Path::root()), Response::ok(EntityCodec::text()))
//!             .handle_fn(|()| "Hello, World!".to_owned()),
//!     );
//!     let client = TestClient::new(app).await;
//!
//!     let response = client.get("/").await;
//!     response.assert_status(StatusCode::OK);
//!     assert_eq!(response.text(), "Hello, World!");
//! }
//! ```

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::Waymark;
use crate::dispatch::Dispatcher;
use crate::response::HttpResponse;
use crate::server::too_large;

/// In-process client over a built application.
pub struct TestClient {
    dispatcher: Dispatcher,
    body_limit: Option<usize>,
}

impl TestClient {
    /// Builds the application and wraps it.
    ///
    /// # Panics
    ///
    /// Panics if any route's acquisition step fails.
    pub async fn new(app: Waymark) -> Self {
        let body_limit = app.body_limit;
        let dispatcher = app.build().await.expect("application build failed");
        Self {
            dispatcher,
            body_limit,
        }
    }

    /// Sends a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> TestResponse {
        self.request(TestRequest::post(path).json(body)).await
    }

    /// Sends a request with full control.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let response = client.request(
    ///     TestRequest::put("/user/1")
    ///         .header("authorization", "Bearer token")
    ///         .json(&update)
    /// ).await;
    /// ```
    pub async fn request(&self, req: TestRequest) -> TestResponse {
        let mut builder = http::Request::builder().method(req.method).uri(req.path);
        for (name, value) in req.headers.iter() {
            builder = builder.header(name, value);
        }
        let (parts, ()) = builder
            .body(())
            .expect("invalid test request")
            .into_parts();
        let body = req.body.unwrap_or_default();

        // Same cap the server enforces while reading.
        if let Some(limit) = self.body_limit {
            if body.len() > limit {
                return TestResponse::from_http(too_large(limit)).await;
            }
        }

        TestResponse::from_http(self.dispatcher.dispatch(parts, body).await).await
    }
}

/// Test request builder.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl TestRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a POST request.
    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a PUT request.
    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a PATCH request.
    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a DELETE request.
    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Creates a HEAD request.
    pub fn head(path: &str) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (
            key.parse::<http::header::HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Sets a JSON body and the matching `Content-Type` header.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Err(_) => {
                // If serialization fails, leave body empty
            }
        }
        self
    }

    /// Sets a URL-encoded form body and the matching `Content-Type` header.
    pub fn form<T: Serialize>(mut self, body: &T) -> Self {
        match serde_urlencoded::to_string(body) {
            Ok(encoded) => {
                self.body = Some(Bytes::from(encoded.into_bytes()));
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
            }
            Err(_) => {
                // If serialization fails, leave body empty
            }
        }
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Test response with assertion helpers.
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn from_http(response: HttpResponse) -> Self {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Asserts the status code, printing the body on mismatch.
    pub fn assert_status<S: Into<StatusCode>>(&self, expected: S) -> &Self {
        let expected = expected.into();
        assert_eq!(
            self.status,
            expected,
            "expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Asserts a header value.
    pub fn assert_header(&self, key: &str, expected: &str) -> &Self {
        let actual = self
            .headers
            .get(key)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        assert_eq!(
            actual, expected,
            "expected header '{key}' to be '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts the body parses as JSON equal to `expected`.
    pub fn assert_json<T: DeserializeOwned + PartialEq + std::fmt::Debug>(
        &self,
        expected: &T,
    ) -> &Self {
        let actual: T = self.json().expect("failed to parse response body as JSON");
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts the body contains a substring.
    pub fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = self.text();
        assert!(
            body.contains(expected),
            "expected body to contain '{expected}', got '{body}'"
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::entity::EntityCodec;
    use crate::mode::Mode;
    use crate::param::Param;
    use crate::path::Path;
    use crate::query::Query;
    use crate::request::Request;
    use crate::response::Response;
    use crate::route::Route;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        message: String,
        count: i32,
    }

    fn hello_app() -> Waymark {
        Waymark::new().mode(Mode::Production).route(
            Route::new(Request::get(Path::root()), Response::ok(EntityCodec::text()))
                .handle_fn(|()| "Hello, World!".to_owned()),
        )
    }

    fn echo_app() -> Waymark {
        Waymark::new().mode(Mode::Production).route(
            Route::new(
                Request::post(Path::root() / "echo").with_entity(EntityCodec::<TestData>::json()),
                Response::ok(EntityCodec::<TestData>::json()),
            )
            .handle_fn(|(data,): (TestData,)| data),
        )
    }

    #[tokio::test]
    async fn get_request_round_trips() {
        let client = TestClient::new(hello_app()).await;
        let response = client.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "Hello, World!");
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let client = TestClient::new(hello_app()).await;
        let response = client.get("/nonexistent").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_json_round_trips() {
        let client = TestClient::new(echo_app()).await;
        let input = TestData {
            message: "hello".to_string(),
            count: 123,
        };
        let response = client.post_json("/echo", &input).await;
        response.assert_status(StatusCode::OK).assert_json(&input);
    }

    #[tokio::test]
    async fn form_body_decodes() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Login {
            username: String,
        }

        let app = Waymark::new().mode(Mode::Production).route(
            Route::new(
                Request::post(Path::root() / "login").with_entity(EntityCodec::<Login>::form()),
                Response::ok(EntityCodec::text()),
            )
            .handle_fn(|(login,): (Login,)| login.username),
        );
        let client = TestClient::new(app).await;

        let response = client
            .request(TestRequest::post("/login").form(&Login {
                username: "alice".to_string(),
            }))
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.text(), "alice");
    }

    #[tokio::test]
    async fn typed_path_and_query_reach_the_handler() {
        let app = Waymark::new().mode(Mode::Production).route(
            Route::new(
                Request::get(Path::root() / "user" / Param::int("user_id"))
                    .with_query(Query::new().optional("verbose", Codec::boolean())),
                Response::ok(EntityCodec::text()),
            )
            .handle_fn(|(user_id, verbose): (i64, Option<bool>)| {
                format!("{user_id} verbose={verbose:?}")
            }),
        );
        let client = TestClient::new(app).await;

        let response = client.get("/user/42?verbose=true").await;
        assert_eq!(response.text(), "42 verbose=Some(true)");

        let response = client.get("/user/42").await;
        assert_eq!(response.text(), "42 verbose=None");
    }

    #[tokio::test]
    async fn request_builder_sets_methods() {
        assert_eq!(TestRequest::get("/x").method, Method::GET);
        assert_eq!(TestRequest::post("/x").method, Method::POST);
        assert_eq!(TestRequest::put("/x").method, Method::PUT);
        assert_eq!(TestRequest::patch("/x").method, Method::PATCH);
        assert_eq!(TestRequest::delete("/x").method, Method::DELETE);
        assert_eq!(TestRequest::head("/x").method, Method::HEAD);
    }

    #[tokio::test]
    async fn json_builder_sets_content_type() {
        let req = TestRequest::post("/x").json(&TestData {
            message: "m".to_string(),
            count: 1,
        });
        assert!(req.body.is_some());
        assert_eq!(
            req.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn body_over_the_limit_answers_413() {
        let app = Waymark::new()
            .mode(Mode::Production)
            .body_limit(8)
            .route(
                Route::new(
                    Request::post(Path::root() / "echo")
                        .with_entity(EntityCodec::<TestData>::json()),
                    Response::ok(EntityCodec::<TestData>::json()),
                )
                .handle_fn(|(data,): (TestData,)| data),
            );
        let client = TestClient::new(app).await;

        let response = client
            .request(TestRequest::post("/echo").body("a body well over eight bytes"))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        response.assert_body_contains("exceeds limit");
    }

    #[tokio::test]
    async fn assertions_chain() {
        let client = TestClient::new(hello_app()).await;
        let response = client.get("/").await;
        response
            .assert_status(StatusCode::OK)
            .assert_header("content-type", "text/plain; charset=utf-8")
            .assert_body_contains("World");
    }
}
