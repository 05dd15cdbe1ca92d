//! Simulation service
//!
//! Runs a [`Simulation`] inside a tokio task. The task advances simulated
//! time on a wall-clock interval and answers [`Command`]s sent through a
//! [`ServiceHandle`]. Commands are either read-only queries or requests that
//! schedule new events; nothing outside the task touches node state.
//!
//! Terminating stops the network but keeps the service answering queries
//! until it is shut down or every handle is dropped.

use std::time::Duration;

use bytes::Bytes;
use star_core::{EventId, Metric, NodeId, StarError, StarResult};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::application::Delivered;
use crate::simulation::{SimReport, Simulation};

/// Capacity of the command queue
const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Simulation service has stopped")]
    Closed,

    #[error(transparent)]
    Star(#[from] StarError),
}

/// Request to the service task, answered through `reply`
#[derive(Debug)]
pub enum Command {
    RoutingTable {
        node: NodeId,
        reply: oneshot::Sender<StarResult<String>>,
    },
    RoutingTables {
        reply: oneshot::Sender<String>,
    },
    /// `node`'s view of the topology rooted at `root`
    TopologyView {
        node: NodeId,
        root: NodeId,
        reply: oneshot::Sender<StarResult<String>>,
    },
    /// Source tree of `root` as known by `node`
    SourceTree {
        node: NodeId,
        root: NodeId,
        reply: oneshot::Sender<StarResult<String>>,
    },
    BuildTree {
        node: NodeId,
        reply: oneshot::Sender<StarResult<String>>,
    },
    Send {
        from: NodeId,
        to: NodeId,
        body: Bytes,
        reply: oneshot::Sender<StarResult<EventId>>,
    },
    SetLink {
        a: NodeId,
        b: NodeId,
        cost: Option<Metric>,
        reply: oneshot::Sender<StarResult<()>>,
    },
    Inbox {
        node: NodeId,
        reply: oneshot::Sender<StarResult<Vec<Delivered>>>,
    },
    Report {
        reply: oneshot::Sender<SimReport>,
    },
    Terminate {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Pacing of simulated time
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Wall-clock time between advances
    pub tick_interval: Duration,
    /// Simulated ticks per advance
    pub ticks_per_interval: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            ticks_per_interval: 1,
        }
    }
}

/// Cloneable handle to a running service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    commands: mpsc::Sender<Command>,
}

impl ServiceHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ServiceError::Closed)?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn routing_table(&self, node: NodeId) -> Result<String, ServiceError> {
        Ok(self
            .request(|reply| Command::RoutingTable { node, reply })
            .await??)
    }

    pub async fn routing_tables(&self) -> Result<String, ServiceError> {
        self.request(|reply| Command::RoutingTables { reply }).await
    }

    pub async fn topology_view(&self, node: NodeId, root: NodeId) -> Result<String, ServiceError> {
        Ok(self
            .request(|reply| Command::TopologyView { node, root, reply })
            .await??)
    }

    pub async fn source_tree(&self, node: NodeId, root: NodeId) -> Result<String, ServiceError> {
        Ok(self
            .request(|reply| Command::SourceTree { node, root, reply })
            .await??)
    }

    pub async fn build_tree(&self, node: NodeId) -> Result<String, ServiceError> {
        Ok(self
            .request(|reply| Command::BuildTree { node, reply })
            .await??)
    }

    pub async fn send_message(
        &self,
        from: NodeId,
        to: NodeId,
        body: impl Into<Bytes>,
    ) -> Result<EventId, ServiceError> {
        let body = body.into();
        Ok(self
            .request(|reply| Command::Send {
                from,
                to,
                body,
                reply,
            })
            .await??)
    }

    pub async fn set_link(
        &self,
        a: NodeId,
        b: NodeId,
        cost: Option<Metric>,
    ) -> Result<(), ServiceError> {
        Ok(self
            .request(|reply| Command::SetLink { a, b, cost, reply })
            .await??)
    }

    pub async fn inbox(&self, node: NodeId) -> Result<Vec<Delivered>, ServiceError> {
        Ok(self
            .request(|reply| Command::Inbox { node, reply })
            .await??)
    }

    pub async fn report(&self) -> Result<SimReport, ServiceError> {
        self.request(|reply| Command::Report { reply }).await
    }

    /// Terminate every node; returns the number of discarded events
    pub async fn terminate(&self) -> Result<usize, ServiceError> {
        self.request(|reply| Command::Terminate { reply }).await
    }

    /// Stop the service task
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| ServiceError::Closed)
    }
}

/// The task owning the simulation
pub struct SimulationService {
    sim: Simulation,
    commands: mpsc::Receiver<Command>,
    config: ServiceConfig,
}

impl SimulationService {
    /// Start `sim` and spawn the service task.
    ///
    /// The task returns the simulation when it stops, or the fatal error
    /// that halted it.
    pub fn spawn(
        sim: Simulation,
        config: ServiceConfig,
    ) -> (ServiceHandle, JoinHandle<StarResult<Simulation>>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let service = Self {
            sim,
            commands: rx,
            config,
        };
        let task = tokio::spawn(async move { service.run().await });
        (ServiceHandle { commands: tx }, task)
    }

    async fn run(mut self) -> StarResult<Simulation> {
        self.sim.start()?;
        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            ticks = self.config.ticks_per_interval,
            "Simulation service started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.sim.is_terminated() {
                        continue;
                    }
                    if let Err(e) = self.sim.advance(self.config.ticks_per_interval) {
                        error!(error = %e, now = %self.sim.now(), "Simulation halted");
                        return Err(e);
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                }
            }
        }

        info!(now = %self.sim.now(), "Simulation service stopped");
        Ok(self.sim)
    }

    fn handle(&mut self, command: Command) {
        debug!(?command, "Command received");
        let sim = &mut self.sim;
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::RoutingTable { node, reply } => {
                let _ = reply.send(sim.render_routing_table(node));
            }
            Command::RoutingTables { reply } => {
                let _ = reply.send(sim.render_routing_tables());
            }
            Command::TopologyView { node, root, reply } => {
                let _ = reply.send(sim.render_topology(node, root));
            }
            Command::SourceTree { node, root, reply } => {
                let _ = reply.send(sim.render_source_tree(node, root));
            }
            Command::BuildTree { node, reply } => {
                let _ = reply.send(sim.build_shortest_path_tree(node));
            }
            Command::Send {
                from,
                to,
                body,
                reply,
            } => {
                let _ = reply.send(sim.send_message(from, to, body));
            }
            Command::SetLink { a, b, cost, reply } => {
                let _ = reply.send(sim.set_link_cost(a, b, cost));
            }
            Command::Inbox { node, reply } => {
                let _ = reply.send(sim.inbox(node).map(<[Delivered]>::to_vec));
            }
            Command::Report { reply } => {
                let _ = reply.send(sim.report());
            }
            Command::Terminate { reply } => {
                let _ = reply.send(sim.terminate());
            }
            Command::Shutdown => {}
        }
    }
}
