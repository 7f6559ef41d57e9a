use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

struct Inner {
    registry: Registry,
    login_attempts: IntCounterVec,
    registrations: IntCounterVec,
    link_operations: IntCounterVec,
    active_sessions: IntGauge,
}

/// Prometheus metrics shared by the HTTP handlers and background tasks
#[derive(Clone)]
pub struct SharedMetrics(Arc<Inner>);

impl SharedMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new("linkvault_login_attempts_total", "Login attempts by outcome"),
            &["result"],
        )?;
        let registrations = IntCounterVec::new(
            Opts::new("linkvault_registrations_total", "Registration attempts by outcome"),
            &["result"],
        )?;
        let link_operations = IntCounterVec::new(
            Opts::new("linkvault_link_operations_total", "Link operations by kind and outcome"),
            &["op", "result"],
        )?;
        let active_sessions =
            IntGauge::new("linkvault_active_sessions", "Number of unexpired sessions")?;

        registry.register(Box::new(login_attempts.clone()))?;
        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(link_operations.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self(Arc::new(Inner {
            registry,
            login_attempts,
            registrations,
            link_operations,
            active_sessions,
        })))
    }

    pub fn record_login_attempt(&self, success: bool) {
        self.0
            .login_attempts
            .with_label_values(&[outcome(success)])
            .inc();
    }

    pub fn record_registration(&self, success: bool) {
        self.0
            .registrations
            .with_label_values(&[outcome(success)])
            .inc();
    }

    /// `matched` is false for owner-scoped writes that found nothing to change
    pub fn record_link_operation(&self, op: &str, matched: bool) {
        let result = if matched { "ok" } else { "noop" };
        self.0.link_operations.with_label_values(&[op, result]).inc();
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.0.active_sessions.set(count as i64);
    }

    /// Renders all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.0.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
