use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// Events emitted by the scanner workflow. Consumers (the in-process
/// `process_events` task today, external integrations later) receive them
/// best-effort: a dropped event never fails the operation that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ScanRecorded {
        sku: String,
        location_id: String,
        previous_quantity: i32,
        new_quantity: i32,
        log_id: String,
    },
    ScanReverted {
        sku: String,
        location_id: String,
        restored_quantity: i32,
        log_id: Option<String>,
    },
    ScanUndone {
        sku: String,
        location_id: String,
        restored_quantity: i32,
        log_id: String,
    },
    ScanLogsCleared {
        deleted: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "Processing event");
    }
    info!("Event channel closed; event processor shutting down");
}
