//! # Waymark
//!
//! Type-safe, composable, bidirectional HTTP routing.
//!
//! A route is declared once, as a value. The same declaration matches
//! incoming requests, hands the handler a typed record of everything it
//! captured, and renders URLs back from typed values. A handler cannot
//! read a parameter its route never declared, and a link to a route
//! cannot fall out of sync with the route it targets.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waymark::prelude::*;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Greeting {
//!     message: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let hello = Request::get(Path::root() / "hello" / Param::string("name"));
//!     let reply = Response::ok(EntityCodec::<Greeting>::json());
//!
//!     Waymark::new()
//!         .route(Route::new(hello, reply).handle_fn(|(name,): (String,)| Greeting {
//!             message: format!("Hello, {name}!"),
//!         }))
//!         .run("127.0.0.1:8080")
//!         .await
//! }
//! ```
//!
//! ## Highlights
//!
//! - **Bidirectional**: `path_to` renders a URL from the same values the
//!   matcher extracts, so reverse routing is free
//! - **Positional capture**: handlers receive a flat tuple in declaration
//!   order, no string lookups and no `Any` downcasts
//! - **First match wins**: routes are tried in registration order, and in
//!   development an unmatched request answers with every route's reason
//!   for saying no
//! - **Scoped acquisition**: a route's resources are built once at
//!   startup and shared with every invocation

// Re-export core functionality
pub use waymark_core::*;

/// Prelude module - import everything you need with `use waymark::prelude::*`
pub mod prelude {
    pub use waymark_core::{
        Codec,
        Combine,
        Dispatcher,
        EntityCodec,
        // Error handling
        Fault,
        Handler,
        Headers,
        HttpResponse,
        Mode,
        Param,
        // Matchers
        Path,
        Query,
        Record,
        Request,
        Response,
        // Routes
        Route,
        RouteHandler,
        RouteMiss,
        Segment,
        SeqCodec,
        // App builder
        Waymark,
    };

    // Re-export commonly used external types
    pub use http::StatusCode;
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, trace, warn};
}
