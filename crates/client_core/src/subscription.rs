use std::future::Future;

use futures::StreamExt;
use shared::protocol::{LedgerEvent, LedgerEventKind};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

/// What a subscription handler is woken for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(LedgerEvent),
    /// The receiver fell behind and `skipped` events of unknown kind were lost.
    Lagged { skipped: u64 },
}

/// Handle for one ledger event listener. Dropping it unsubscribes.
pub struct EventSubscription {
    kinds: Vec<LedgerEventKind>,
    task: JoinHandle<()>,
}

impl EventSubscription {
    /// Runs `handler` for every event of one of `kinds` arriving on
    /// `receiver`, one delivery at a time. A lag is reported once for the
    /// receiver, whatever kinds were lost.
    pub fn spawn<F, Fut>(
        kinds: &[LedgerEventKind],
        receiver: broadcast::Receiver<LedgerEvent>,
        handler: F,
    ) -> Self
    where
        F: Fn(Delivery) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let kinds = kinds.to_vec();
        let filter = kinds.clone();
        let mut stream = BroadcastStream::new(receiver);
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) if filter.contains(&event.kind()) => {
                        handler(Delivery::Event(event)).await
                    }
                    Ok(_) => {}
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "sync: ledger event receiver lagged");
                        handler(Delivery::Lagged { skipped }).await;
                    }
                }
            }
            debug!("sync: ledger event stream closed");
        });
        Self { kinds, task }
    }

    pub fn kinds(&self) -> &[LedgerEventKind] {
        &self.kinds
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(kinds = ?self.kinds, "sync: ledger event subscription released");
    }
}
