//! Prometheus metrics for the relay.
//!
//! Recording goes through the `metrics` facade, so every call is a no-op
//! until [`init_metrics`] installs the exporter.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// All metric names used by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    EventsReceived,
    EventsForwarded,
    EventsNoop,
    EventsFailed,
    ForwardDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::EventsReceived => "slack_relay_events_received_total",
            MetricName::EventsForwarded => "slack_relay_events_forwarded_total",
            MetricName::EventsNoop => "slack_relay_events_noop_total",
            MetricName::EventsFailed => "slack_relay_events_failed_total",
            MetricName::ForwardDuration => "slack_relay_forward_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

pub mod relay {
    use super::MetricName;

    pub fn event_received(source: &str) {
        ::metrics::counter!(MetricName::EventsReceived.as_str(), "source" => source.to_string()).increment(1);
    }

    pub fn event_forwarded(source: &str) {
        ::metrics::counter!(MetricName::EventsForwarded.as_str(), "source" => source.to_string()).increment(1);
    }

    /// `reason` is one of `unknown_source` or `no_message`
    pub fn event_noop(reason: &'static str) {
        ::metrics::counter!(MetricName::EventsNoop.as_str(), "reason" => reason).increment(1);
    }

    pub fn event_failed(kind: &'static str) {
        ::metrics::counter!(MetricName::EventsFailed.as_str(), "kind" => kind).increment(1);
    }

    pub fn forward_duration(seconds: f64) {
        ::metrics::histogram!(MetricName::ForwardDuration.as_str()).record(seconds);
    }
}
