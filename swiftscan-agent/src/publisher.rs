//! Publish side: renders event batches for the downstream pipeline.
//!
//! The [`Publisher`] trait is the seam to the transport; the provided
//! implementation writes NDJSON to stdout, which a log shipper picks up.
//! Publish failures are logged and dropped, never retried here; the next
//! scan tick re-attempts everything.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use swiftscan_core::Event;

#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Deliver one batch. Implementations must not re-order events within
    /// the batch.
    async fn publish(&self, batch: &[Event]) -> std::io::Result<()>;
}

/// Renders each event as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct NdjsonPublisher;

impl NdjsonPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Publisher for NdjsonPublisher {
    async fn publish(&self, batch: &[Event]) -> std::io::Result<()> {
        let mut out = Vec::new();
        for event in batch {
            serde_json::to_writer(&mut out, event)?;
            out.push(b'\n');
        }

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&out).await?;
        stdout.flush().await
    }
}

/// Pumps batches from the spooler to the publisher, forwarding
/// successfully published batches to the registrar.
pub struct PublishPump {
    rx: mpsc::Receiver<Vec<Event>>,
    publisher: Arc<dyn Publisher>,
    registrar_tx: mpsc::Sender<Vec<Event>>,
    publish_async: bool,
}

impl PublishPump {
    pub fn new(
        rx: mpsc::Receiver<Vec<Event>>,
        publisher: Arc<dyn Publisher>,
        registrar_tx: mpsc::Sender<Vec<Event>>,
        publish_async: bool,
    ) -> Self {
        Self {
            rx,
            publisher,
            registrar_tx,
            publish_async,
        }
    }

    pub async fn run(mut self) {
        info!(publish_async = self.publish_async, "starting publisher");
        let mut in_flight = JoinSet::new();

        while let Some(batch) = self.rx.recv().await {
            debug!(events = batch.len(), "publishing batch");
            let publisher = self.publisher.clone();
            let registrar_tx = self.registrar_tx.clone();

            if self.publish_async {
                in_flight.spawn(deliver(publisher, registrar_tx, batch));
                // Reap whatever has already finished.
                while in_flight.try_join_next().is_some() {}
            } else {
                deliver(publisher, registrar_tx, batch).await;
            }
        }

        while in_flight.join_next().await.is_some() {}
        info!("publisher stopped");
    }
}

async fn deliver(
    publisher: Arc<dyn Publisher>,
    registrar_tx: mpsc::Sender<Vec<Event>>,
    batch: Vec<Event>,
) {
    match publisher.publish(&batch).await {
        Ok(()) => {
            // Registrar only sees batches that made it out.
            let _ = registrar_tx.send(batch).await;
        }
        Err(e) => error!(events = batch.len(), error = %e, "publish failed, dropping batch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use swiftscan_core::{PartitionInfo, PlacementContext, ResourceType};

    fn event(part_id: i64) -> Event {
        Event::ObjectPartition(PartitionInfo {
            placement: PlacementContext::unresolved(
                "sdb",
                ResourceType::Object,
                part_id,
                part_id.to_string(),
                Utc::now(),
                Utc::now(),
            ),
            num_datafiles: 1,
            num_tombstones: 0,
            bytes_total: 0,
            bytes_total_mb: 0,
            last_indexed: Utc::now(),
            ttl: None,
        })
    }

    struct RecordingPublisher {
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, batch: &[Event]) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::other("downstream gone"));
            }
            self.batches.lock().unwrap().push(batch.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn published_batches_reach_the_registrar() {
        let publisher = Arc::new(RecordingPublisher {
            batches: Mutex::new(Vec::new()),
            fail: false,
        });
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (registrar_tx, mut registrar_rx) = mpsc::channel(4);

        let pump = PublishPump::new(batch_rx, publisher.clone(), registrar_tx, false);
        let task = tokio::spawn(pump.run());

        batch_tx.send(vec![event(1), event(2)]).await.unwrap();
        let forwarded = registrar_rx.recv().await.unwrap();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(*publisher.batches.lock().unwrap(), vec![2]);

        drop(batch_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_batches_are_dropped_not_forwarded() {
        let publisher = Arc::new(RecordingPublisher {
            batches: Mutex::new(Vec::new()),
            fail: true,
        });
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (registrar_tx, mut registrar_rx) = mpsc::channel(4);

        let pump = PublishPump::new(batch_rx, publisher, registrar_tx, false);
        let task = tokio::spawn(pump.run());

        batch_tx.send(vec![event(1)]).await.unwrap();
        drop(batch_tx);
        task.await.unwrap();

        assert!(registrar_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn async_mode_still_delivers_everything() {
        let publisher = Arc::new(RecordingPublisher {
            batches: Mutex::new(Vec::new()),
            fail: false,
        });
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (registrar_tx, mut registrar_rx) = mpsc::channel(4);

        let pump = PublishPump::new(batch_rx, publisher.clone(), registrar_tx, true);
        let task = tokio::spawn(pump.run());

        for i in 0..3 {
            batch_tx.send(vec![event(i)]).await.unwrap();
        }
        drop(batch_tx);
        task.await.unwrap();

        let mut forwarded = 0;
        while registrar_rx.recv().await.is_some() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 3);
        assert_eq!(publisher.batches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ndjson_renders_one_line_per_event() {
        // Render through the same serializer the publisher uses.
        let batch = vec![event(1), event(2)];
        let mut out = Vec::new();
        for event in &batch {
            serde_json::to_writer(&mut out, event).unwrap();
            out.push(b'\n');
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains("\"type\":\"object_partition\"")));
    }
}
