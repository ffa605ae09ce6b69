//! Per-`Configure` VM bindings.

use super::request::RequestView;

/// What a single `Configure` call rebinds on an existing context.
/// `Configure` never resets captured data; only `Reset`/`Put` do.
#[derive(Debug, Clone, Default)]
pub struct VmConfig {
    /// The handler's configured environment name (e.g. `"production"`).
    pub env: String,
    /// The inbound request this VM is rendering for.
    pub request: RequestView,
    /// Server-state JSON, as returned verbatim by `server.handler.state()`.
    pub state: Option<String>,
}
