//! Render writer, its immutable snapshot, and an object pool of writers.
//!
//! A `RenderWriter` accumulates one response's worth of state (status,
//! headers, body bytes, or a redirect) as handlers build it up; calling
//! `render()` takes an immutable, independently-owned snapshot
//! (`Render`) that the HTTP layer and the response cache can both hold
//! without aliasing the writer's buffer (invariant I6).

use std::collections::HashMap;
use std::sync::Mutex;

/// An immutable response snapshot produced by [`RenderWriter::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    /// Response body. Empty for a redirect.
    pub body: Vec<u8>,
    /// Response headers.
    pub header: HashMap<String, Vec<String>>,
    /// Response status.
    pub status: u16,
    /// Whether this snapshot is a redirect.
    pub redirect: bool,
    /// Redirect target. Empty unless `redirect` is set.
    pub redirect_url: String,
}

impl Render {
    /// Whether the status is in the `2xx` range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Mutable response-state accumulator. Not thread-safe by itself; one
/// writer belongs to exactly one in-flight request at a time (enforced
/// by [`RenderWriterPool`]).
#[derive(Debug, Default)]
pub struct RenderWriter {
    buf: Vec<u8>,
    header: HashMap<String, Vec<String>>,
    status: u16,
    redirect: bool,
    redirect_url: String,
}

const DEFAULT_STATUS: u16 = 200;

impl RenderWriter {
    /// A fresh writer with an empty body and a `200` default status.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            header: HashMap::new(),
            status: DEFAULT_STATUS,
            redirect: false,
            redirect_url: String::new(),
        }
    }

    /// Appends bytes to the body buffer.
    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Sets the response status. Last call before `render()` wins.
    pub fn write_header(&mut self, status: u16) {
        self.status = status;
    }

    /// Marks the response as a redirect to `url` with the given status.
    pub fn write_redirect(&mut self, url: impl Into<String>, status: u16) {
        self.redirect = true;
        self.redirect_url = url.into();
        self.status = status;
    }

    /// Mutable access to the header multi-map.
    pub fn header_mut(&mut self) -> &mut HashMap<String, Vec<String>> {
        &mut self.header
    }

    /// Takes an immutable snapshot. A redirect snapshot carries no body.
    pub fn render(&self) -> Render {
        if self.redirect {
            Render {
                body: Vec::new(),
                header: self.header.clone(),
                status: self.status,
                redirect: true,
                redirect_url: self.redirect_url.clone(),
            }
        } else {
            Render {
                body: self.buf.clone(),
                header: self.header.clone(),
                status: self.status,
                redirect: false,
                redirect_url: String::new(),
            }
        }
    }

    /// Returns the writer to its initial state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.header.clear();
        self.status = DEFAULT_STATUS;
        self.redirect = false;
        self.redirect_url.clear();
    }
}

/// An unbounded, thread-safe free list of [`RenderWriter`]s. `get()`
/// never blocks: it pops a released writer or allocates a fresh one.
#[derive(Default)]
pub struct RenderWriterPool {
    free: Mutex<Vec<RenderWriter>>,
}

impl RenderWriterPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Checks out a writer, allocating one if the free list is empty.
    pub fn get(&self) -> RenderWriter {
        self.free
            .lock()
            .expect("render writer pool lock poisoned")
            .pop()
            .unwrap_or_default()
    }

    /// Resets and returns a writer to the free list.
    pub fn put(&self, mut writer: RenderWriter) {
        writer.reset();
        self.free
            .lock()
            .expect("render writer pool lock poisoned")
            .push(writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_header_round_trips() {
        let mut w = RenderWriter::new();
        w.write(b"hello");
        w.write_header(201);
        let r = w.render();
        assert_eq!(r.body, b"hello");
        assert_eq!(r.status, 201);
        assert!(!r.redirect);
    }

    #[test]
    fn redirect_drops_body() {
        let mut w = RenderWriter::new();
        w.write(b"ignored");
        w.write_redirect("/login", 302);
        let r = w.render();
        assert!(r.body.is_empty());
        assert!(r.redirect);
        assert_eq!(r.redirect_url, "/login");
        assert_eq!(r.status, 302);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut w = RenderWriter::new();
        w.write(b"x");
        w.write_header(500);
        w.header_mut().insert("x".into(), vec!["y".into()]);
        w.reset();
        let r = w.render();
        assert!(r.body.is_empty());
        assert_eq!(r.status, 200);
        assert!(r.header.is_empty());
        assert!(!r.redirect);
    }

    #[test]
    fn render_snapshot_is_stable_across_later_writes() {
        let mut w = RenderWriter::new();
        w.write(b"first");
        let snapshot = w.render();
        w.write(b"second");
        assert_eq!(snapshot.body, b"first");
    }

    #[test]
    fn pool_get_never_blocks_and_put_resets() {
        let pool = RenderWriterPool::new();
        let mut w = pool.get();
        w.write(b"data");
        pool.put(w);
        let w2 = pool.get();
        assert!(w2.render().body.is_empty());
    }
}
