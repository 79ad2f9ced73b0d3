//! Tracing initialisation and sched-labelled log capture.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber. Workflow code tags every log line with a `sched` field holding
//! its [`crate::sched::SchedulingContext`] label; [`ReplayCapture`] is a
//! subscriber layer that collects those lines as [`LogRecord`]s so
//! [`crate::sched::replay::reorder`] can re-emit them in logical order.

use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::sched::LogRecord;

/// Initialise the global tracing subscriber.
///
/// * `json`: when `true`, emit newline-delimited JSON log lines; each line
///   keeps its `sched` field for downstream correlation.
/// * `level`: default verbosity when `RUST_LOG` is not set.
///
/// Safe to call more than once: the global subscriber can only be set once
/// per process, so subsequent calls are silently ignored.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Subscriber layer that captures sched-labelled log events.
///
/// Events without a `sched` field pass through uncollected. The captured
/// batch arrives in wall-clock order; hand it to
/// [`crate::sched::replay::reorder`] to recover program order. Clones share
/// one buffer, so keep a handle and compose another into the subscriber:
///
/// ```
/// use convoy_core::{reorder, ReplayCapture, SchedulingContext};
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = ReplayCapture::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
/// tracing::subscriber::with_default(subscriber, || {
///     let ctx = SchedulingContext::new().child();
///     tracing::info!(sched = %ctx, "step one");
/// });
/// let logical = reorder(&capture.drain());
/// assert_eq!(logical[0].message, "step one");
/// ```
#[derive(Clone, Default)]
pub struct ReplayCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl ReplayCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every record captured so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock().expect("capture buffer poisoned"))
    }

    /// Number of records captured so far.
    pub fn len(&self) -> usize {
        self.records.lock().expect("capture buffer poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Subscriber> Layer<S> for ReplayCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = SchedVisitor::default();
        event.record(&mut visitor);
        if let Some(label) = visitor.sched {
            self.records
                .lock()
                .expect("capture buffer poisoned")
                .push(LogRecord::new(label, visitor.message.unwrap_or_default()));
        }
    }
}

/// Extracts the `sched` label and the message text from one event.
#[derive(Default)]
struct SchedVisitor {
    sched: Option<String>,
    message: Option<String>,
}

impl Visit for SchedVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "sched" => self.sched = Some(format!("{value:?}")),
            "message" => self.message = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "sched" => self.sched = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            _ => {}
        }
    }
}
