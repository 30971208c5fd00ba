//! Demo run statistics.

use std::time::Duration;

use serde::Serialize;

use notifier::MetricsSnapshot;
use observability::OutcomeSummary;

/// Handler-side counters collected after the run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HandlerTallies {
    pub reserved: u64,
    pub flagged_for_review: u64,
    pub audit_entries: u64,
    pub receipts_sent: u64,
    pub failures_consumed: u64,
}

/// Statistics from a demo run
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    /// "sync" or "async"
    pub mode: &'static str,

    /// Events handed to `notify`
    pub events_raised: u64,

    /// `notify` calls that returned an error
    pub notify_errors: u64,

    /// Total duration of the run, including the wait for background units
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,

    /// Notifier counters
    #[serde(serialize_with = "serialize_snapshot")]
    pub snapshot: MetricsSnapshot,

    /// Background unit outcomes seen by the task sink
    #[serde(skip)]
    pub outcomes: OutcomeSummary,

    pub handlers: HandlerTallies,

    /// Whether the run was interrupted
    pub cancelled: bool,
}

impl DemoReport {
    /// Events raised per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_raised as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Demo Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Mode: {}", self.mode);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events raised: {}", self.events_raised);
        println!("   ├─ Throughput: {:.2} events/s", self.throughput());
        println!("   ├─ notify errors: {}", self.notify_errors);
        println!("   └─ Interrupted: {}", self.cancelled);

        let s = &self.snapshot;
        println!("\n📈 Notifier Counters");
        println!("   ├─ Notifications: {}", s.notifications);
        println!("   ├─ Handler invocations: {}", s.handler_invocations);
        println!("   ├─ Handler failures: {}", s.handler_failures);
        println!("   ├─ Background units: {}", s.scheduled_units);
        println!("   │  ├─ Completed: {}", s.completed_units);
        println!("   │  ├─ Faulted: {}", s.faulted_units);
        println!("   │  └─ Cancelled: {}", s.cancelled_units);
        println!("   ├─ Consumer failures: {}", s.consumer_failures);
        println!("   └─ Unobserved failures: {}", s.unobserved_failures);

        let h = &self.handlers;
        println!("\n🧾 Handlers");
        println!("   ├─ Stock reserved: {}", h.reserved);
        println!("   ├─ Flagged for review: {}", h.flagged_for_review);
        println!("   ├─ Audit entries: {}", h.audit_entries);
        println!("   ├─ Receipts sent: {}", h.receipts_sent);
        println!("   └─ Failures consumed: {}", h.failures_consumed);

        if self.outcomes.total_units > 0 {
            println!("\n{}", self.outcomes);
        } else {
            println!(
                "\n⏱  Notify latency (ms): {}",
                self.outcomes.notify_latency_ms
            );
        }

        println!();
    }
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration.as_secs_f64())
}

fn serialize_snapshot<S: serde::Serializer>(
    snapshot: &MetricsSnapshot,
    s: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;

    let mut state = s.serialize_struct("MetricsSnapshot", 9)?;
    state.serialize_field("notifications", &snapshot.notifications)?;
    state.serialize_field("scheduled_units", &snapshot.scheduled_units)?;
    state.serialize_field("handler_invocations", &snapshot.handler_invocations)?;
    state.serialize_field("handler_failures", &snapshot.handler_failures)?;
    state.serialize_field("consumer_failures", &snapshot.consumer_failures)?;
    state.serialize_field("completed_units", &snapshot.completed_units)?;
    state.serialize_field("faulted_units", &snapshot.faulted_units)?;
    state.serialize_field("cancelled_units", &snapshot.cancelled_units)?;
    state.serialize_field("unobserved_failures", &snapshot.unobserved_failures)?;
    state.end()
}
