//! Metrics and tracing setup for quorumkv.
//!
//! Provides a global [`GatewayMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<GatewayMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static GatewayMetrics {
    METRICS.get_or_init(GatewayMetrics::new)
}

/// All Prometheus metrics exported by a quorumkv process.
pub struct GatewayMetrics {
    pub registry: Registry,

    // ── Outbound node calls ──
    pub rpcs_sent_by_type: IntCounterVec,
    pub rpc_failures_by_type: IntCounterVec,
    pub rpc_latency_secs: HistogramVec,

    // ── KV operations ──
    pub kv_puts: IntCounter,
    pub kv_gets: IntCounter,
    pub quorum_failures: IntCounterVec,
    pub kv_latency_secs: HistogramVec,

    // ── Health ──
    pub nodes_marked_down: IntCounter,
    pub probe_failures: IntCounter,

    // ── Hints ──
    pub hints_stored: IntCounter,
    pub hints_delivered: IntCounter,
    pub hints_requeued: IntCounter,
    pub hints_pending: IntGauge,

    // ── Read repair ──
    pub read_repairs: IntCounter,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for RPC/KV latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("valid counter opts")
}

impl GatewayMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let rpcs_sent_by_type = IntCounterVec::new(
            Opts::new(
                "quorumkv_rpcs_sent_total",
                "Outbound node calls sent, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpcs_sent_by_type counter vec");
        let rpc_failures_by_type = IntCounterVec::new(
            Opts::new(
                "quorumkv_rpc_failures_total",
                "Outbound node calls that failed, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpc_failures_by_type counter vec");
        let rpc_latency_secs = HistogramVec::new(
            HistogramOpts::new("quorumkv_rpc_latency_seconds", "Node call latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["rpc_type"],
        )
        .expect("rpc_latency_secs histogram");

        let kv_puts = counter("quorumkv_kv_puts_total", "Quorum PUT operations");
        let kv_gets = counter("quorumkv_kv_gets_total", "Quorum GET operations");
        let quorum_failures = IntCounterVec::new(
            Opts::new(
                "quorumkv_quorum_failures_total",
                "Quorum operations that failed, by op and reason",
            ),
            &["op_type", "reason"],
        )
        .expect("quorum_failures counter vec");
        let kv_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "quorumkv_kv_latency_seconds",
                "Quorum operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op_type"],
        )
        .expect("kv_latency_secs histogram");

        let nodes_marked_down = counter(
            "quorumkv_nodes_marked_down_total",
            "Health transitions from up to down",
        );
        let probe_failures = counter(
            "quorumkv_probe_failures_total",
            "Health probes that did not return 2xx",
        );

        let hints_stored = counter(
            "quorumkv_hints_stored_total",
            "Hints stored for hinted handoff",
        );
        let hints_delivered = counter(
            "quorumkv_hints_delivered_total",
            "Hints successfully delivered",
        );
        let hints_requeued = counter(
            "quorumkv_hints_requeued_total",
            "Hint deliveries that failed and were re-queued",
        );
        let hints_pending = IntGauge::with_opts(Opts::new(
            "quorumkv_hints_pending",
            "Hints queued after the last delivery pass",
        ))
        .expect("hints_pending gauge");

        let read_repairs = counter(
            "quorumkv_read_repairs_total",
            "Stale replicas rewritten by read repair",
        );

        // Register all metrics
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(rpcs_sent_by_type.clone()),
            Box::new(rpc_failures_by_type.clone()),
            Box::new(rpc_latency_secs.clone()),
            Box::new(kv_puts.clone()),
            Box::new(kv_gets.clone()),
            Box::new(quorum_failures.clone()),
            Box::new(kv_latency_secs.clone()),
            Box::new(nodes_marked_down.clone()),
            Box::new(probe_failures.clone()),
            Box::new(hints_stored.clone()),
            Box::new(hints_delivered.clone()),
            Box::new(hints_requeued.clone()),
            Box::new(hints_pending.clone()),
            Box::new(read_repairs.clone()),
        ];
        for collector in collectors {
            registry.register(collector).expect("register collector");
        }

        Self {
            registry,
            rpcs_sent_by_type,
            rpc_failures_by_type,
            rpc_latency_secs,
            kv_puts,
            kv_gets,
            quorum_failures,
            kv_latency_secs,
            nodes_marked_down,
            probe_failures,
            hints_stored,
            hints_delivered,
            hints_requeued,
            hints_pending,
            read_repairs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&m.registry.gather(), &mut buf) {
        tracing::warn!("prometheus text encoding failed: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Helper: start an outbound node-call latency timer. Returns a guard that
/// records elapsed time on drop.
pub fn start_rpc_timer(rpc_type: &str) -> prometheus::HistogramTimer {
    let m = metrics();
    m.rpcs_sent_by_type.with_label_values(&[rpc_type]).inc();
    m.rpc_latency_secs
        .with_label_values(&[rpc_type])
        .start_timer()
}

/// Helper: start a KV operation latency timer.
pub fn start_kv_timer(op_type: &str) -> prometheus::HistogramTimer {
    metrics()
        .kv_latency_secs
        .with_label_values(&[op_type])
        .start_timer()
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let body = encode_metrics();
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
