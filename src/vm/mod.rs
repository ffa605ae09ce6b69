//! Sandboxed JS execution: one VM per worker thread, pooled and reused
//! across requests.
//!
//! A VM owns a `deno_core` isolate with a fixed `process`/`server`
//! object graph wired to host ops (see [`ops`]). `Configure` binds
//! per-request data onto the existing context; `Execute` runs the
//! bundle with cooperative, timeout-driven termination; `Reset` clears
//! only the captured response effects, leaving the context (and its
//! one-time host-API wiring) intact for the next request. [`pool`]
//! bounds how many of these exist concurrently.

mod bootstrap;
mod captured;
mod config;
mod core;
mod handle;
mod ops;
mod pool;
mod request;
mod worker;

pub use captured::{clamp_status, CapturedData};
pub use config::VmConfig;
pub use core::{DenoVmCore, FakeVmCore, VmCore, VmStatus};
pub use handle::VmHandle;
pub use pool::{VmLease, VmPool};
pub use request::RequestView;

/// Host-captured effects of one `Execute`, per spec nomenclature.
pub type VmResult = CapturedData;
