// src/server/livereload.rs

//! Live-reload plumbing: the SSE endpoint browsers subscribe to and the
//! middleware that injects the client script into HTML pages.

use std::convert::Infallible;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::middleware::Next;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Path of the server-sent-events endpoint.
pub const RELOAD_PATH: &str = "/__sitepipe/reload";

/// Largest HTML body the injector will buffer.
const MAX_HTML_BYTES: usize = 16 * 1024 * 1024;

/// Message broadcast to every connected client of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Reload,
    /// Ends every open event stream so graceful shutdown can complete.
    Shutdown,
}

pub fn client_script() -> String {
    format!(
        "<script>(function(){{var es=new EventSource(\"{RELOAD_PATH}\");\
es.addEventListener(\"reload\",function(){{location.reload();}});}})();</script>"
    )
}

/// Insert the client script before the last `</body>` (or append it when
/// there is none).
pub fn inject_script(html: &str) -> String {
    let script = client_script();
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..at]);
            out.push_str(&script);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{script}"),
    }
}

pub(crate) async fn reload_events(
    State(tx): State<broadcast::Sender<ClientMessage>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("live-reload client connected");
    let stream = BroadcastStream::new(tx.subscribe())
        // A lagging client just misses intermediate reloads.
        .filter_map(|msg| msg.ok())
        .take_while(|msg| *msg != ClientMessage::Shutdown)
        .map(|_| Ok(Event::default().event("reload").data("reload")));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub(crate) async fn inject_into_html(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_HTML_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "could not buffer HTML response");
            return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = String::from_utf8_lossy(&bytes);
    let injected = inject_script(&html);
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(injected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_goes_before_closing_body() {
        let out = inject_script("<html><BODY>hi</BODY></html>");
        assert!(out.starts_with("<html><BODY>hi<script>"));
        assert!(out.ends_with("</script></BODY></html>"));
        assert!(out.contains(RELOAD_PATH));
    }

    #[test]
    fn fragments_get_the_script_appended() {
        let out = inject_script("<p>partial</p>");
        assert!(out.starts_with("<p>partial</p><script>"));
    }
}
