//! The route dispatcher.
//!
//! Dispatch is a straight walk over the route table in registration
//! order: each route is probed with [`RouteHandler::try_handle`], the
//! first one that accepts the request wins, and its answer goes on the
//! wire. There is no method pre-indexing or prefix tree; routes may
//! overlap freely (declaration order breaks ties), and every probe
//! leaves a [`RouteMiss`] behind for diagnostics.
//!
//! When no route accepts, the answer depends on [`Mode`]: production gets
//! a bare 404, development gets an HTML page listing every route and why
//! it said no. A matched route whose handler faults answers 500 and is
//! never retried against later routes.

use std::time::Instant;

use bytes::Bytes;
use http::request::Parts;
use http::StatusCode;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Fault;
use crate::mode::Mode;
use crate::request::RouteMiss;
use crate::response::{empty, html, plain, HttpResponse};
use crate::route::RouteHandler;

/// An ordered route table plus the run mode, ready to answer requests.
pub struct Dispatcher {
    routes: Vec<RouteHandler>,
    mode: Mode,
}

impl Dispatcher {
    /// Builds a dispatcher over routes in the given order.
    pub fn new(routes: Vec<RouteHandler>, mode: Mode) -> Self {
        Self { routes, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Answers one buffered request.
    ///
    /// Never fails: unmatched requests and handler faults become
    /// responses according to the run mode.
    pub async fn dispatch(&self, parts: Parts, body: Bytes) -> HttpResponse {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();

        let response = self.probe(&parts, &body, request_id).await;

        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %response.status().as_u16(),
            duration_ms = %started.elapsed().as_millis(),
            "request"
        );
        response
    }

    async fn probe(&self, parts: &Parts, body: &Bytes, request_id: Uuid) -> HttpResponse {
        let mut misses: Vec<(&str, RouteMiss)> = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            match route.try_handle(parts, body) {
                Ok(future) => {
                    return match future.await {
                        Ok(response) => response,
                        Err(fault) => self.fault_response(parts, &fault, request_id),
                    };
                }
                Err(miss) => misses.push((route.describe(), miss)),
            }
        }
        self.unmatched_response(parts, &misses, request_id)
    }

    fn fault_response(&self, parts: &Parts, fault: &Fault, request_id: Uuid) -> HttpResponse {
        error!(
            request_id = %request_id,
            method = %parts.method,
            uri = %parts.uri,
            error = %fault,
            "handler fault"
        );
        match self.mode {
            Mode::Production => plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error"),
            Mode::Development => html(
                StatusCode::INTERNAL_SERVER_ERROR,
                fault_page(parts, fault, request_id),
            ),
        }
    }

    fn unmatched_response(
        &self,
        parts: &Parts,
        misses: &[(&str, RouteMiss)],
        request_id: Uuid,
    ) -> HttpResponse {
        info!(
            request_id = %request_id,
            method = %parts.method,
            uri = %parts.uri,
            routes = misses.len(),
            "no route matched"
        );
        match self.mode {
            Mode::Production => empty(StatusCode::NOT_FOUND),
            Mode::Development => html(
                StatusCode::NOT_FOUND,
                unmatched_page(parts, misses, request_id),
            ),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("mode", &self.mode)
            .finish()
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn unmatched_page(parts: &Parts, misses: &[(&str, RouteMiss)], request_id: Uuid) -> String {
    let mut page = String::with_capacity(1024);
    page.push_str("<!DOCTYPE html><html><head><title>404 Not Found</title></head><body>");
    page.push_str("<h1>404 Not Found</h1>");
    page.push_str(&format!(
        "<p><code>{} {}</code> matched none of the {} registered routes.</p>",
        escape_html(parts.method.as_str()),
        escape_html(&parts.uri.to_string()),
        misses.len()
    ));
    if misses.is_empty() {
        page.push_str("<p>The route table is empty.</p>");
    } else {
        page.push_str("<table border=\"1\" cellpadding=\"4\"><tr><th>route</th><th>reason</th></tr>");
        for (describe, miss) in misses {
            page.push_str(&format!(
                "<tr><td><code>{}</code></td><td>{}</td></tr>",
                escape_html(describe),
                escape_html(&miss.to_string())
            ));
        }
        page.push_str("</table>");
    }
    page.push_str(&format!("<p><small>request id {request_id}</small></p>"));
    page.push_str("</body></html>");
    page
}

fn fault_page(parts: &Parts, fault: &Fault, request_id: Uuid) -> String {
    let mut page = String::with_capacity(512);
    page.push_str("<!DOCTYPE html><html><head><title>500 Internal Server Error</title></head><body>");
    page.push_str("<h1>500 Internal Server Error</h1>");
    page.push_str(&format!(
        "<p>The handler for <code>{} {}</code> faulted.</p>",
        escape_html(parts.method.as_str()),
        escape_html(&parts.uri.to_string())
    ));
    page.push_str("<ul>");
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(fault);
    while let Some(err) = cause {
        page.push_str(&format!("<li>{}</li>", escape_html(&err.to_string())));
        cause = err.source();
    }
    page.push_str("</ul>");
    page.push_str(&format!("<p><small>request id {request_id}</small></p>"));
    page.push_str("</body></html>");
    page
}
