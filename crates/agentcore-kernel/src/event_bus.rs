//! Process-wide event bus (§9): a structural-log / UI-notification channel,
//! injected rather than a hidden singleton. Each session owns its own
//! `EventBus`; nothing here is `static`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use agentcore_types::BudgetVerdict;

/// Structural events the kernel publishes as it runs. Front-ends (TUI, LSP
/// bridge, ...) are external collaborators (§1) that subscribe to this;
/// the kernel itself never blocks on a subscriber being present.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelEvent {
    IterationStarted { iteration: u32, at: DateTime<Utc> },
    IterationEnded { iteration: u32, at: DateTime<Utc> },
    BudgetVerdictIssued { verdict: BudgetVerdict },
    ToolExecuted { tool_call_id: String, name: String, success: bool },
    DecisionRequired { plan_id: String, step_number: u32 },
    SessionCancelled { reason: String },
    SessionEnded { success: bool },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KernelEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(2048);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KernelEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: KernelEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(KernelEvent::SessionCancelled { reason: "timeout".into() });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, KernelEvent::SessionCancelled { reason } if reason == "timeout"));
    }
}
