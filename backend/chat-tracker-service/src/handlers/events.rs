/// Server-Sent Events endpoint
///
/// Clients connect with `EventSource('/api/sse/events')` and receive every
/// broadcast event until they disconnect or the server shuts down.
use crate::error::Result;
use crate::sse::{Broadcaster, PeerHangup};
use actix_web::http::header::{CacheControl, CacheDirective};
use actix_web::{web, HttpRequest, HttpResponse};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use tracing::debug;

/// Endpoint: GET /api/sse/events
///
/// On servers started with `on_connect(sse::watch_peer)` the stream ends as
/// soon as the client hangs up; otherwise the next failed write ends it.
pub async fn sse_events(
    req: HttpRequest,
    broadcaster: web::Data<Broadcaster>,
) -> Result<HttpResponse> {
    let subscription = broadcaster.subscribe()?;
    debug!(subscriber_id = %subscription.id(), "SSE client connected");

    let hangup = PeerHangup::for_connection(req.conn_data::<PeerHangup>());

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(CacheControl(vec![CacheDirective::NoCache]))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(subscription.take_until(hangup).map(Ok::<_, Infallible>)))
}

/// Endpoint: GET /api/sse/stats
pub async fn sse_stats(broadcaster: web::Data<Broadcaster>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "subscribers": broadcaster.len(),
    }))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/sse")
            .route("/events", web::get().to(sse_events))
            .route("/stats", web::get().to(sse_stats)),
    );
}
