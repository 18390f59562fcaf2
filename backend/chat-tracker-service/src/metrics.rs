//! Prometheus instrumentation
//!
//! Request/response routes feed the API latency histogram. Event-stream
//! responses stay open for as long as the browser tab does, so they are only
//! counted there and their lifetime is tracked by the SSE metrics instead.

use std::rc::Rc;
use std::time::{Duration, Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, TextEncoder,
};

fn register<M: Collector + Clone + 'static>(metric: M) -> M {
    prometheus::default_registry()
        .register(Box::new(metric.clone()))
        .expect("chat-tracker metrics are registered once at startup");
    metric
}

static API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new(
                "chat_tracker_api_requests_total",
                "Requests handled, event streams included",
            ),
            &["method", "route", "status"],
        )
        .expect("valid chat_tracker_api_requests_total"),
    )
});

static API_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register(
        HistogramVec::new(
            HistogramOpts::new(
                "chat_tracker_api_request_duration_seconds",
                "Latency of request/response routes",
            )
            .buckets(vec![0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method", "route"],
        )
        .expect("valid chat_tracker_api_request_duration_seconds"),
    )
});

static SSE_SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    register(
        IntGauge::new(
            "chat_tracker_sse_subscribers",
            "Subscribers currently registered with the broadcaster",
        )
        .expect("valid chat_tracker_sse_subscribers"),
    )
});

static SSE_CONNECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new(
                "chat_tracker_sse_connections_total",
                "Event-stream connection attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid chat_tracker_sse_connections_total"),
    )
});

static SSE_CONNECTION_LIFETIME: Lazy<Histogram> = Lazy::new(|| {
    register(
        Histogram::with_opts(
            HistogramOpts::new(
                "chat_tracker_sse_connection_duration_seconds",
                "How long event-stream subscriptions stayed open",
            )
            .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]),
        )
        .expect("valid chat_tracker_sse_connection_duration_seconds"),
    )
});

static SSE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("chat_tracker_sse_events_total", "Events broadcast by name"),
            &["event"],
        )
        .expect("valid chat_tracker_sse_events_total"),
    )
});

static SSE_DISCONNECTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new(
                "chat_tracker_sse_disconnects_total",
                "Subscribers removed from the broadcaster by reason",
            ),
            &["reason"],
        )
        .expect("valid chat_tracker_sse_disconnects_total"),
    )
});

/// Why a subscriber left the broadcaster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The connection went away and its subscription was dropped
    Client,
    /// A frame could not be handed to the connection
    WriteFailed,
    /// Closed by broadcaster shutdown
    Shutdown,
}

impl DisconnectReason {
    fn as_str(self) -> &'static str {
        match self {
            DisconnectReason::Client => "client",
            DisconnectReason::WriteFailed => "write_failed",
            DisconnectReason::Shutdown => "shutdown",
        }
    }
}

pub fn set_sse_subscribers(count: usize) {
    SSE_SUBSCRIBERS.set(count as i64);
}

/// Count a subscribe attempt; `accepted` is false when the broadcaster
/// refused it during shutdown.
pub fn record_sse_connection(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    SSE_CONNECTIONS.with_label_values(&[outcome]).inc();
}

pub fn observe_sse_lifetime(open_for: Duration) {
    SSE_CONNECTION_LIFETIME.observe(open_for.as_secs_f64());
}

pub fn record_sse_event(event: &str) {
    SSE_EVENTS.with_label_values(&[event]).inc();
}

pub fn record_sse_disconnects(reason: DisconnectReason, count: usize) {
    if count > 0 {
        SSE_DISCONNECTS
            .with_label_values(&[reason.as_str()])
            .inc_by(count as u64);
    }
}

#[cfg(test)]
pub(crate) fn sse_disconnects(reason: DisconnectReason) -> u64 {
    SSE_DISCONNECTS.with_label_values(&[reason.as_str()]).get()
}

/// Endpoint: GET /metrics
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

fn is_event_stream<B>(response: &ServiceResponse<B>) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

/// Counts every request per route and records latency for non-streaming ones.
///
/// Routes are labelled by match pattern (`/api/projects/{id}`) so ids stay out
/// of the label set. For event streams the handler returns as soon as the
/// stream is set up, which says nothing about how long the client stays.
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let route = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;

            let (status, streaming) = match &result {
                Ok(response) => (response.status().as_u16(), is_event_stream(response)),
                Err(_) => (500, false),
            };
            API_REQUESTS
                .with_label_values(&[&method, &route, &status.to_string()])
                .inc();
            if !streaming {
                API_LATENCY
                    .with_label_values(&[&method, &route])
                    .observe(start.elapsed().as_secs_f64());
            }

            result
        })
    }
}
