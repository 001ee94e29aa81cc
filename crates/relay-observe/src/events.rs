//! Taskvisor event logging.
//!
//! Background tasks of the relay (the maintenance cycle) run under taskvisor;
//! this subscriber turns their lifecycle events into tracing records.
use async_trait::async_trait;
use taskvisor::{Event, EventKind, Subscribe};
use tracing::{debug, error, info, trace, warn};

/// Bounded queue between the event bus and this subscriber.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Logs taskvisor events with a severity matching their meaning.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventLogger;

#[async_trait]
impl Subscribe for EventLogger {
    async fn on_event(&self, event: &Event) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "relay-event-logger"
    }

    fn queue_capacity(&self) -> usize {
        EVENT_QUEUE_CAPACITY
    }
}

fn log_event(e: &Event) {
    let task = e.task.as_deref().unwrap_or("unknown");
    let reason = e.reason.as_deref().unwrap_or("");
    let attempt = e.attempt.unwrap_or(0);

    match e.kind {
        EventKind::TaskStarting => debug!(task, attempt, "task starting"),
        EventKind::TaskStopped => trace!(task, "task stopped"),
        EventKind::TaskFailed => warn!(task, attempt, reason, "task attempt failed"),
        EventKind::TimeoutHit => warn!(
            task,
            timeout_ms = e.timeout_ms.unwrap_or(0),
            "task exceeded its timeout"
        ),
        EventKind::BackoffScheduled => trace!(
            task,
            attempt,
            delay_ms = e.delay_ms.unwrap_or(0),
            "next run scheduled"
        ),
        EventKind::TaskAdded => debug!(task, "task added"),
        EventKind::TaskRemoved => debug!(task, "task removed"),
        EventKind::ActorExhausted => info!(task, reason, "task will not restart"),
        EventKind::ActorDead => error!(task, reason, "task terminated permanently"),
        EventKind::ShutdownRequested => info!("shutdown requested"),
        EventKind::AllStoppedWithinGrace => info!("all tasks stopped"),
        EventKind::GraceExceeded => warn!("some tasks did not stop within grace period"),
        EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
            error!(task, reason, "event subscriber failure")
        }
        _ => trace!(task, kind = ?e.kind, "taskvisor event"),
    }
}
