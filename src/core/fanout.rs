//! Live fan-out: pushes every committed change to the dashboards whose
//! subscription filter matches it. Independent of owner notifications.

use crate::core::feed::drain_ready;
use crate::core::registry::SubscriberRegistry;
use crate::models::change_event::ChangeEvent;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace, warn};

pub struct LiveFanout {
    registry: Arc<SubscriberRegistry>,
}

impl LiveFanout {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    pub fn deliver(&self, event: &ChangeEvent) -> usize {
        let delivered = self.registry.dispatch(event);
        trace!(
            entity_id = event.entity_id(),
            sequence = event.sequence,
            delivered,
            "fan-out"
        );
        delivered
    }

    /// Dashboards cannot be told which events they missed, so a lag
    /// disconnects everyone; they re-register and re-read current state.
    fn lagged(&self, missed: u64) {
        let dropped = self.registry.disconnect_all();
        warn!(missed, dropped, "fan-out lagged behind the change feed, subscribers disconnected");
    }

    pub async fn run(
        self,
        mut feed: broadcast::Receiver<ChangeEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("live fan-out started");
        loop {
            tokio::select! {
                biased;
                received = feed.recv() => match received {
                    Ok(event) => {
                        self.deliver(&event);
                    }
                    Err(RecvError::Lagged(missed)) => self.lagged(missed),
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    let (pending, missed) = drain_ready(&mut feed);
                    if missed > 0 {
                        self.lagged(missed);
                    }
                    for event in &pending {
                        self.deliver(event);
                    }
                    break;
                }
            }
        }
        debug!("live fan-out stopped");
    }
}
