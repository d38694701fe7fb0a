//! Routes: a request description bound to a response description.
//!
//! A [`Route`] pairs a [`Request`] with a [`Response`] whose input the
//! handler must produce; the types line up at compile time, so a route
//! that builds is a route whose handler, matcher, and renderer agree.
//!
//! Attaching a handler erases the capture types into a [`Handler`], the
//! unit the dispatcher works with. Building a handler runs its acquisition
//! step (if any) exactly once; the result, a [`RouteHandler`], is the
//! immutable per-route matcher-plus-callable the dispatcher probes on
//! every request.
//!
//! ```rust,ignore
//! let route = Route::new(
//!     Request::get(Path::root() / "user" / Param::int("user_id") / "view"),
//!     Response::ok(EntityCodec::json()),
//! )
//! .handle(|(user_id,)| async move { Ok(view_user(user_id).await?) });
//! ```

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::request::Parts;

use crate::error::Fault;
use crate::request::{Record, Request, RouteMiss};
use crate::response::{HttpResponse, Response};
use crate::tuple::Combine;

/// The in-flight answer of a matched route.
pub type RouteFuture = BoxFuture<'static, Result<HttpResponse, Fault>>;

/// A request description paired with the response description its handler
/// must feed.
pub struct Route<P, Q, H, E, R> {
    request: Request<P, Q, H, E>,
    response: Response<R>,
}

impl<P, Q, H, E, R> Route<P, Q, H, E, R> {
    pub fn new(request: Request<P, Q, H, E>, response: Response<R>) -> Self {
        Self { request, response }
    }

    /// Human-readable form of the whole route, e.g.
    /// `GET /user/{user_id}/view -> 200 OK (application/json)`.
    pub fn describe(&self) -> String {
        format!("{} -> {}", self.request.describe(), self.response.describe())
    }
}

impl<P, Q, H, E, R> Route<P, Q, H, E, R>
where
    P: Combine<Q> + 'static,
    Q: 'static,
    H: 'static,
    E: 'static,
    <P as Combine<Q>>::Out: Combine<H>,
    <<P as Combine<Q>>::Out as Combine<H>>::Out: Combine<E>,
    Record<P, Q, H, E>: Send + 'static,
    R: Send + 'static,
{
    /// Attaches an async handler.
    ///
    /// The handler receives the extracted record and produces the response
    /// input, or a [`Fault`] that the dispatcher turns into an error
    /// response. A fault never makes the dispatcher try later routes.
    pub fn handle<F, Fut>(self, handler: F) -> Handler
    where
        F: Fn(Record<P, Q, H, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Fault>> + Send + 'static,
    {
        let describe = self.describe();
        let Route { request, response } = self;
        let built_describe = describe.clone();
        Handler {
            describe,
            build: Box::new(move || {
                Box::pin(async move {
                    Ok(bind_route(built_describe, request, response, handler))
                })
            }),
        }
    }

    /// Attaches a synchronous, infallible handler.
    pub fn handle_fn<F>(self, handler: F) -> Handler
    where
        F: Fn(Record<P, Q, H, E>) -> R + Send + Sync + 'static,
    {
        self.handle(move |record| std::future::ready(Ok(handler(record))))
    }

    /// Attaches a handler with a build-time acquisition step.
    ///
    /// `init` runs once, when the application is built; its output is
    /// shared with every invocation of the handler. Routes whose handlers
    /// need a connection pool, a template cache, or similar get it here
    /// rather than from globals.
    pub fn handle_with<S, Init, InitFut, F, Fut>(self, init: Init, handler: F) -> Handler
    where
        S: Send + Sync + 'static,
        Init: FnOnce() -> InitFut + Send + 'static,
        InitFut: Future<Output = Result<S, Fault>> + Send + 'static,
        F: Fn(Arc<S>, Record<P, Q, H, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Fault>> + Send + 'static,
    {
        let describe = self.describe();
        let Route { request, response } = self;
        let built_describe = describe.clone();
        Handler {
            describe,
            build: Box::new(move || {
                Box::pin(async move {
                    let state = Arc::new(init().await?);
                    Ok(bind_route(built_describe, request, response, move |record| {
                        handler(state.clone(), record)
                    }))
                })
            }),
        }
    }
}

fn bind_route<P, Q, H, E, R, F, Fut>(
    describe: String,
    request: Request<P, Q, H, E>,
    response: Response<R>,
    handler: F,
) -> RouteHandler
where
    P: Combine<Q> + 'static,
    Q: 'static,
    H: 'static,
    E: 'static,
    <P as Combine<Q>>::Out: Combine<H>,
    <<P as Combine<Q>>::Out as Combine<H>>::Out: Combine<E>,
    Record<P, Q, H, E>: Send + 'static,
    R: Send + 'static,
    F: Fn(Record<P, Q, H, E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Fault>> + Send + 'static,
{
    let try_handle = move |parts: &Parts, body: &Bytes| -> Result<RouteFuture, RouteMiss> {
        let record = request.try_extract(parts, body)?;
        // The handler future is created here but only polled by the caller,
        // so a non-matching request costs no handler work at all.
        let invocation = handler(record);
        let headers = parts.headers.clone();
        let response = response.clone();
        Ok(Box::pin(async move {
            let value = invocation.await?;
            Ok(response.respond(&headers, value).await.into_http())
        }))
    };
    RouteHandler { describe, try_handle: Box::new(try_handle) }
}

type BuildFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<RouteHandler, Fault>> + Send>;

/// A route with its handler attached, before the build step has run.
pub struct Handler {
    describe: String,
    build: BuildFn,
}

impl Handler {
    /// Human-readable form of the underlying route.
    pub fn describe(&self) -> &str {
        &self.describe
    }

    /// Runs the acquisition step and produces the dispatchable route.
    pub async fn build(self) -> Result<RouteHandler, Fault> {
        (self.build)().await
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("describe", &self.describe).finish()
    }
}

type TryHandleFn = Box<dyn Fn(&Parts, &Bytes) -> Result<RouteFuture, RouteMiss> + Send + Sync>;

/// A built route: probe it with a request and either run the returned
/// future or move on to the next route with the reported miss.
pub struct RouteHandler {
    describe: String,
    try_handle: TryHandleFn,
}

impl RouteHandler {
    /// Human-readable form of the underlying route.
    pub fn describe(&self) -> &str {
        &self.describe
    }

    /// Matches the request against this route.
    ///
    /// `Ok` means the route accepted the request; the future produces the
    /// response (or the handler's fault). `Err` reports why the route did
    /// not match so the caller can try the next one.
    pub fn try_handle(&self, parts: &Parts, body: &Bytes) -> Result<RouteFuture, RouteMiss> {
        (self.try_handle)(parts, body)
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler").field("describe", &self.describe).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::entity::EntityCodec;
    use crate::param::Param;
    use crate::path::Path;
    use crate::query::Query;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parts(method: &str, uri: &str) -> Parts {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    async fn body_text(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn matched_routes_run_their_handler() {
        let handler = Route::new(
            Request::get(Path::root() / "user" / Param::int("user_id") / "view")
                .with_query(Query::new().required("page", Codec::int())),
            Response::ok(EntityCodec::text()),
        )
        .handle(|(user_id, page)| async move { Ok(format!("user {user_id} page {page}")) })
        .build()
        .await
        .unwrap();

        let future = handler
            .try_handle(&parts("GET", "/user/5/view?page=2"), &Bytes::new())
            .unwrap();
        let response = future.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "user 5 page 2");
    }

    #[tokio::test]
    async fn unmatched_requests_report_the_miss() {
        let handler = Route::new(
            Request::get(Path::root() / "user"),
            Response::ok(EntityCodec::text()),
        )
        .handle_fn(|()| "hi".to_owned())
        .build()
        .await
        .unwrap();

        match handler.try_handle(&parts("GET", "/other"), &Bytes::new()) {
            Err(RouteMiss::Path(_)) => {}
            other => panic!("unexpected result: {:?}", other.err()),
        }
        match handler.try_handle(&parts("POST", "/user"), &Bytes::new()) {
            Err(RouteMiss::Method { .. }) => {}
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn handler_faults_surface_through_the_future() {
        let handler = Route::new(
            Request::get(Path::root() / "boom"),
            Response::ok(EntityCodec::text()),
        )
        .handle(|()| async { Err(Fault::new("upstream unavailable")) })
        .build()
        .await
        .unwrap();

        let future = handler
            .try_handle(&parts("GET", "/boom"), &Bytes::new())
            .unwrap();
        let fault = future.await.unwrap_err();
        assert_eq!(fault.message(), "upstream unavailable");
    }

    #[tokio::test]
    async fn handle_with_shares_built_state_across_requests() {
        let handler = Route::new(
            Request::get(Path::root() / "count"),
            Response::ok(EntityCodec::text()),
        )
        .handle_with(
            || async { Ok(AtomicUsize::new(0)) },
            |counter, ()| async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(n.to_string())
            },
        )
        .build()
        .await
        .unwrap();

        for expected in ["1", "2", "3"] {
            let future = handler
                .try_handle(&parts("GET", "/count"), &Bytes::new())
                .unwrap();
            assert_eq!(body_text(future.await.unwrap()).await, expected);
        }
    }

    #[tokio::test]
    async fn failed_acquisition_fails_the_build() {
        let handler = Route::new(
            Request::get(Path::root() / "db"),
            Response::ok(EntityCodec::text()),
        )
        .handle_with(
            || async { Err::<(), _>(Fault::new("pool refused")) },
            |_state, ()| async move { Ok("never".to_owned()) },
        );

        let err = handler.build().await.unwrap_err();
        assert_eq!(err.message(), "pool refused");
    }

    #[tokio::test]
    async fn describe_survives_type_erasure() {
        let handler = Route::new(
            Request::get(Path::root() / "user" / Param::int("user_id")),
            Response::ok(EntityCodec::text()),
        )
        .handle_fn(|(_user_id,)| String::new());

        assert_eq!(
            handler.describe(),
            "GET /user/{user_id} -> 200 OK (text/plain; charset=utf-8)"
        );
    }
}
