//! # webvm — sandboxed SSR host
//!
//! Serves server-rendered SPA HTML by executing a JS app bundle inside a
//! pooled, sandboxed `deno_core` VM, with rule-driven state materialisation
//! and a TTL-bounded response cache.
//!
//! ## Architecture
//!
//! - **`cache`**: concurrency-safe, TTL-bounded, capacity-limited map
//!   shared by every handler.
//! - **`render`**: buffered response accumulator (`RenderWriter`) and its
//!   object pool.
//! - **`dom`**: ordered id→element map used to inject `<meta>`/`<link>`/
//!   `<script>` nodes into the index document.
//! - **`vm`**: one `deno_core` isolate per worker thread, a bounded pool
//!   of them, and the host API surface (`server.*`) the bundle calls into.
//! - **`handler`**: the app handler — rule engine, index/bundle read
//!   cache, VM execution, HTML mutation, response cache integration.
//! - **`handlers`**: auxiliary `file`/`robots`/`sitemap` routes,
//!   illustrating the render-writer and cache contracts only.
//! - **`config`**, **`store`**, **`error`**: configuration, the resource
//!   store seam, and the domain error type.
//!
//! ## Thread safety
//!
//! `deno_core::JsRuntime` is neither `Send` nor `Sync`; each VM lives on
//! its own dedicated worker thread for its entire lifetime, and callers
//! only ever hold a `Send`+`Clone` channel handle to it (see
//! [`vm::VmHandle`]). The VM pool bounds how many such threads exist at
//! once.

#![deny(missing_docs)]

pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod render;
pub mod store;
pub mod vm;
