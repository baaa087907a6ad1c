//! Agent wiring and lifecycle.
//!
//! Start order matters: registrar first (loads persisted state), then
//! publisher, then spooler, then the prospector. Stopping happens in the
//! inverse order, driven by channel closure: when the prospector stops,
//! the spooler flushes and closes, the publisher drains, and the
//! registrar writes its final snapshot.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use swiftscan_core::{AgentConfig, Event, StateStore};

use crate::prospector::Prospector;
use crate::publisher::{NdjsonPublisher, PublishPump, Publisher};
use crate::registrar::Registrar;
use crate::spooler::Spooler;
use crate::Result;

pub struct Agent {
    config: AgentConfig,
    publisher: Arc<dyn Publisher>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            publisher: Arc::new(NdjsonPublisher::new()),
        })
    }

    /// Replace the default stdout publisher, e.g. for tests or another
    /// transport.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Run until the shutdown token fires. Startup errors (bad device
    /// dir, corrupt registry) are fatal; everything later is logged and
    /// retried naturally by the next scan tick.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let states = Arc::new(StateStore::new());

        let registrar = Registrar::new(self.config.registry_file.clone(), states.clone())?;
        registrar.load_states().await?;

        let (batch_tx, batch_rx) = mpsc::channel::<Vec<Event>>(1);
        let (registrar_tx, registrar_rx) = mpsc::channel::<Vec<Event>>(1);
        let (spooler_tx, spooler_rx) = mpsc::channel::<Event>(64);

        let registrar_task = tokio::spawn(registrar.run(registrar_rx));

        let pump = PublishPump::new(
            batch_rx,
            self.publisher.clone(),
            registrar_tx,
            self.config.publish_async,
        );
        let pump_task = tokio::spawn(pump.run());

        let spooler = Spooler::new(&self.config, spooler_rx, batch_tx);
        let spooler_task = tokio::spawn(spooler.run());

        let prospector = Prospector::new(&self.config, states, spooler_tx, shutdown)?;
        prospector.run().await;

        // Prospector done: the channel-close cascade stops the rest in
        // inverse start order.
        let _ = spooler_task.await;
        let _ = pump_task.await;
        let _ = registrar_task.await;

        info!("agent stopped");
        Ok(())
    }
}
