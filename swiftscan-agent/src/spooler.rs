//! Event spooler: batches events for the publisher.
//!
//! Flushes when the buffer reaches `spool_size` or after `idle_timeout`
//! without input, whichever comes first. Closing the input channel flushes
//! the remainder and ends the task, so shutdown never drops buffered
//! events that already passed the state filter.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

use swiftscan_core::{AgentConfig, Event};

pub struct Spooler {
    rx: mpsc::Receiver<Event>,
    out: mpsc::Sender<Vec<Event>>,
    spool_size: usize,
    idle_timeout: Duration,
}

impl Spooler {
    pub fn new(config: &AgentConfig, rx: mpsc::Receiver<Event>, out: mpsc::Sender<Vec<Event>>) -> Self {
        Self {
            rx,
            out,
            spool_size: config.spool_size,
            idle_timeout: config.idle_timeout,
        }
    }

    pub async fn run(mut self) {
        info!(spool_size = self.spool_size, "starting spooler");
        let mut buffer: Vec<Event> = Vec::with_capacity(self.spool_size);

        loop {
            match timeout(self.idle_timeout, self.rx.recv()).await {
                Ok(Some(event)) => {
                    buffer.push(event);
                    if buffer.len() >= self.spool_size
                        && !flush(&self.out, &mut buffer, "size").await
                    {
                        return;
                    }
                }
                Ok(None) => {
                    // Input closed: final flush, then stop.
                    flush(&self.out, &mut buffer, "shutdown").await;
                    info!("spooler stopped");
                    return;
                }
                Err(_) => {
                    if !buffer.is_empty() && !flush(&self.out, &mut buffer, "timeout").await {
                        return;
                    }
                }
            }
        }
    }
}

async fn flush(out: &mpsc::Sender<Vec<Event>>, buffer: &mut Vec<Event>, reason: &str) -> bool {
    if buffer.is_empty() {
        return true;
    }
    debug!(events = buffer.len(), reason, "flushing spooler");
    out.send(std::mem::take(buffer)).await.is_ok()
}
