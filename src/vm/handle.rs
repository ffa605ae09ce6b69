//! The `Send` handle callers actually hold; the real `VmCore` stays on
//! its worker thread (see [`super::worker`]).

use super::captured::CapturedData;
use super::config::VmConfig;
use super::core::{DenoVmCore, VmCore};
use super::worker::{self, Command};
use crate::error::AppError;
use std::sync::mpsc::Sender;
use std::time::Duration;
use tokio::sync::oneshot;

/// A channel-backed reference to one worker-thread-owned VM. Cheap to
/// clone; every clone talks to the same worker.
#[derive(Clone)]
pub struct VmHandle {
    tx: Sender<Command>,
}

impl VmHandle {
    /// Spawns a new worker thread running a real `DenoVmCore`.
    pub fn spawn_deno() -> Result<Self, AppError> {
        let tx = worker::spawn(DenoVmCore::new)?;
        Ok(Self { tx })
    }

    /// Spawns a worker thread running a caller-supplied `VmCore`
    /// (for tests: typically a `FakeVmCore`).
    pub fn spawn_with<C, F>(build: F) -> Result<Self, AppError>
    where
        C: VmCore + 'static,
        F: FnOnce() -> Result<C, AppError> + Send + 'static,
    {
        let tx = worker::spawn(build)?;
        Ok(Self { tx })
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| AppError::VmConfigure("vm worker thread is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| AppError::VmConfigure("vm worker thread dropped the reply".into()))
    }

    /// Sends a `Configure` command to the worker thread and awaits its reply.
    pub async fn configure(&self, config: VmConfig) -> Result<(), AppError> {
        self.call(|reply| Command::Configure { config, reply })
            .await?
    }

    /// Sends an `Execute` command to the worker thread and awaits its reply.
    pub async fn execute(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        timeout: Duration,
    ) -> Result<CapturedData, AppError> {
        let name = name.into();
        let source = source.into();
        self.call(|reply| Command::Execute {
            name,
            source,
            timeout,
            reply,
        })
        .await?
    }

    /// Sends a `Reset` command to the worker thread and awaits its reply.
    pub async fn reset(&self) -> Result<(), AppError> {
        self.call(|reply| Command::Reset { reply }).await
    }

    /// Stops the worker thread. Safe to call even if other clones still
    /// exist; they'll see a closed channel on their next call.
    pub fn close(&self) {
        let _ = self.tx.send(Command::Close);
    }
}
