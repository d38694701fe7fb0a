//! Waymark application builder.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::dispatch::Dispatcher;
use crate::error::Fault;
use crate::mode::Mode;
use crate::route::Handler;
use crate::server::{Server, DEFAULT_BODY_LIMIT};

/// Main application builder.
///
/// Routes are tried in the order they are registered; the first route
/// that accepts a request handles it.
///
/// # Example
///
/// ```rust,ignore
/// use waymark::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let user = Request::get(Path::root() / "user" / Param::int("user_id"));
///     let page = Response::ok(EntityCodec::<UserPage>::json());
///
///     Waymark::new()
///         .route(Route::new(user, page).handle(|(user_id,)| lookup(user_id)))
///         .run("127.0.0.1:8080")
///         .await
/// }
/// ```
pub struct Waymark {
    handlers: Vec<Handler>,
    mode: Mode,
    pub(crate) body_limit: Option<usize>,
}

impl Waymark {
    /// Creates a new application.
    ///
    /// The run mode comes from `WAYMARK_ENV` (see [`Mode::from_env`]) and
    /// the body limit defaults to 1MB.
    pub fn new() -> Self {
        // Initialize tracing if not already done
        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,waymark=debug")),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();

        Self {
            handlers: Vec::new(),
            mode: Mode::from_env(),
            body_limit: Some(DEFAULT_BODY_LIMIT),
        }
    }

    /// Registers a route.
    ///
    /// Registration order is match order.
    pub fn route(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Overrides the run mode read from the environment.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the request body size limit in bytes.
    ///
    /// The default limit is 1MB (1024 * 1024 bytes). Requests with larger
    /// bodies answer `413 Payload Too Large` before any route is tried.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    /// Disables the body size limit.
    ///
    /// Warning: this removes protection against large payloads. Only use
    /// this if request sizes are limited elsewhere.
    pub fn no_body_limit(mut self) -> Self {
        self.body_limit = None;
        self
    }

    /// Runs every route's acquisition step, in registration order, and
    /// produces the dispatcher.
    ///
    /// Fails on the first acquisition that fails; routes registered after
    /// it are never built.
    pub async fn build(self) -> Result<Dispatcher, Fault> {
        let mut routes = Vec::with_capacity(self.handlers.len());
        for handler in self.handlers {
            let describe = handler.describe().to_owned();
            match handler.build().await {
                Ok(route) => {
                    tracing::debug!(route = %route.describe(), "route built");
                    routes.push(route);
                }
                Err(fault) => {
                    tracing::error!(route = %describe, error = %fault, "route build failed");
                    return Err(fault);
                }
            }
        }
        tracing::info!(routes = routes.len(), mode = ?self.mode, "application built");
        Ok(Dispatcher::new(routes, self.mode))
    }

    /// Builds the application and serves it on `addr`.
    pub async fn run(self, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let body_limit = self.body_limit;
        let dispatcher = self.build().await?;
        Server::new(dispatcher, body_limit).run(addr).await
    }
}

impl Default for Waymark {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Waymark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waymark")
            .field("routes", &self.handlers.len())
            .field("mode", &self.mode)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}
