//! Dedicated-thread actor running one `VmCore`.
//!
//! `deno_core::JsRuntime` is `!Send`/`!Sync` (it's built around `Rc`s and
//! thread-affine V8 isolates), but the VM pool needs to be shared across
//! the HTTP server's worker threads. The fix: give each VM its own OS
//! thread and never let the `VmCore` leave it. The pool instead shares a
//! `Send` channel handle — a thread spawning its own owned resource and
//! exposing only a message-passing handle to callers, the same shape as
//! the dedicated SSR worker threads in the pack's other render-pool
//! example.

use super::captured::CapturedData;
use super::config::VmConfig;
use super::core::VmCore;
use crate::error::AppError;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tokio::sync::oneshot;

pub(super) enum Command {
    Configure {
        config: VmConfig,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Execute {
        name: String,
        source: String,
        timeout: Duration,
        reply: oneshot::Sender<Result<CapturedData, AppError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Close,
}

/// Spawns a worker thread owning a freshly constructed `C` and returns
/// the `Send` command channel for it. The thread exits once the sender
/// is dropped or a [`Command::Close`] arrives.
pub(super) fn spawn<C, F>(build: F) -> Result<Sender<Command>, AppError>
where
    C: VmCore + 'static,
    F: FnOnce() -> Result<C, AppError> + Send + 'static,
{
    let (tx, rx): (Sender<Command>, Receiver<Command>) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AppError>>();

    std::thread::Builder::new()
        .name("webvm-vm".into())
        .spawn(move || {
            let mut vm = match build() {
                Ok(vm) => {
                    let _ = ready_tx.send(Ok(()));
                    vm
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            for command in rx.iter() {
                match command {
                    Command::Configure { config, reply } => {
                        let _ = reply.send(vm.configure(config));
                    }
                    Command::Execute {
                        name,
                        source,
                        timeout,
                        reply,
                    } => {
                        let _ = reply.send(vm.execute(&name, &source, timeout));
                    }
                    Command::Reset { reply } => {
                        vm.reset();
                        let _ = reply.send(());
                    }
                    Command::Close => break,
                }
            }
        })
        .map_err(|e| AppError::VmConfigure(format!("failed to spawn vm worker thread: {e}")))?;

    ready_rx
        .recv()
        .map_err(|_| AppError::VmConfigure("vm worker thread died before starting".into()))??;

    Ok(tx)
}
