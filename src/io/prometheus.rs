//! Prometheus metrics HTTP endpoint
//!
//! Exposes welcome-team metrics in Prometheus text format at /metrics and a
//! liveness probe at /health. Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSnapshot, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, site: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {cumulative}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, site_id: &str) -> String {
    let snapshot = metrics.snapshot();
    let mut output = String::with_capacity(4096);

    write_headcount_metrics(&mut output, site_id, &snapshot);
    write_state_metrics(&mut output, site_id, &snapshot);
    write_floor_metrics(&mut output, site_id, &snapshot);
    write_evaluation_metrics(&mut output, site_id, &snapshot);

    output
}

fn write_headcount_metrics(output: &mut String, site: &str, s: &MetricsSnapshot) {
    let counters = [
        ("welcome_team_entries_submitted_total", "Headcount entries accepted", s.entries_submitted),
        ("welcome_team_submissions_rejected_total", "Submissions rejected by validation", s.submissions_rejected),
        ("welcome_team_confirmations_total", "Confirmed counts created", s.confirmations),
        (
            "welcome_team_confirmation_conflicts_total",
            "Confirmations refused because the day was already confirmed",
            s.confirmation_conflicts,
        ),
        (
            "welcome_team_precondition_violations_total",
            "Confirm attempts on a pair that is missing or discrepant",
            s.precondition_violations,
        ),
        ("welcome_team_store_errors_total", "Store operations that failed", s.store_errors),
        ("welcome_team_journal_failures_total", "Journal appends that failed", s.journal_failures),
    ];
    for (name, help, val) in counters {
        write_metric(output, name, help, MetricType::Counter, site, val);
    }
}

fn write_state_metrics(output: &mut String, site: &str, s: &MetricsSnapshot) {
    write_metric(
        output,
        "welcome_team_headcount_phase",
        "Workflow phase (0=no entries, 1=one submitted, 2=discrepant, 3=ready, 4=confirmed)",
        MetricType::Gauge,
        site,
        s.phase,
    );
    write_metric(
        output,
        "welcome_team_discrepant_zones",
        "Zones where the two counters differ by more than the tolerance",
        MetricType::Gauge,
        site,
        s.discrepant_zones,
    );
    write_metric(
        output,
        "welcome_team_ignored_counters",
        "Distinct counters beyond the compared pair",
        MetricType::Gauge,
        site,
        s.ignored_counters,
    );
    write_metric(
        output,
        "welcome_team_confirmed_total",
        "Attendance total of the latest confirmed count",
        MetricType::Gauge,
        site,
        s.confirmed_total,
    );
}

fn write_floor_metrics(output: &mut String, site: &str, s: &MetricsSnapshot) {
    write_metric(
        output,
        "welcome_team_seat_updates_total",
        "Seat occupancy writes",
        MetricType::Counter,
        site,
        s.seat_updates,
    );
    write_metric(
        output,
        "welcome_team_requests_submitted_total",
        "Assistance requests raised",
        MetricType::Counter,
        site,
        s.requests_submitted,
    );
    write_metric(
        output,
        "welcome_team_requests_resolved_total",
        "Assistance requests resolved",
        MetricType::Counter,
        site,
        s.requests_resolved,
    );
}

fn write_evaluation_metrics(output: &mut String, site: &str, s: &MetricsSnapshot) {
    write_metric(
        output,
        "welcome_team_snapshots_evaluated_total",
        "Headcount snapshot evaluations",
        MetricType::Counter,
        site,
        s.snapshots_evaluated,
    );
    write_histogram(
        output,
        "welcome_team_evaluation_latency_us",
        "Snapshot evaluation latency in microseconds",
        site,
        &s.eval_buckets,
        &METRICS_BUCKET_BOUNDS,
        s.eval_latency_sum_us,
    );
    write_metric(
        output,
        "welcome_team_evaluation_latency_p99_us",
        "99th percentile snapshot evaluation latency",
        MetricType::Gauge,
        site,
        s.eval_latency_p99_us,
    );
}

fn text_response(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = hyper::header::HeaderValue::from_str(content_type) {
        response.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    site_id: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&metrics, &site_id),
        ),
        (&Method::GET, "/health") => text_response(StatusCode::OK, "text/plain", "ok"),
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    };
    Ok(response)
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    site_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let site_id = Arc::new(site_id);

    info!(port = %port, site = %site_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let site_id = site_id.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                handle_request(req, metrics.clone(), site_id.clone())
                            });

                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
