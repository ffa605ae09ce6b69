//! Data captured from the JS bundle's host-API calls during one `Execute`.

use crate::dom::DomElementList;
use std::collections::HashMap;

/// Clamps a status code into `[100, 599]`; anything unparsable is 500.
pub fn clamp_status(status: Option<i32>, default: u16) -> u16 {
    match status {
        None => default,
        Some(s) if (100..=599).contains(&s) => s as u16,
        Some(_) => 500,
    }
}

/// Effects recorded by `server.response.*` calls during one `Execute`.
/// A fresh, empty instance is installed at `Configure` and taken by
/// `Execute`'s caller; `Reset` clears it back to empty (invariant I5).
#[derive(Debug, Clone, Default)]
pub struct CapturedData {
    /// HTML passed to `server.response.render()`, if it was called.
    pub render_html: Option<String>,
    /// Status passed to `server.response.render()`, clamped and defaulted.
    pub status: Option<u16>,
    /// Whether `server.response.redirect()` was called.
    pub redirect: bool,
    /// Target URL passed to `server.response.redirect()`.
    pub redirect_url: Option<String>,
    /// Status passed to `server.response.redirect()`, clamped and defaulted.
    pub redirect_status: Option<u16>,
    /// Headers set via `server.response.header()`, in call order.
    pub headers: HashMap<String, Vec<String>>,
    /// Document title set via `server.response.title()`.
    pub title: Option<String>,
    /// `<meta>` tags added via `server.response.meta()`.
    pub metas: DomElementList,
    /// `<link>` tags added via `server.response.link()`.
    pub links: DomElementList,
    /// `<script>` tags added via `server.response.script()`.
    pub scripts: DomElementList,
}

impl CapturedData {
    /// Records a `server.response.render()` call.
    pub fn render(&mut self, html: String, status: Option<i32>) {
        self.render_html = Some(html);
        self.status = Some(clamp_status(status, 200));
    }

    /// Records a `server.response.redirect()` call.
    pub fn redirect(&mut self, url: String, status: Option<i32>) {
        self.redirect = true;
        self.redirect_url = Some(url);
        self.redirect_status = Some(clamp_status(status, 302));
    }

    /// Records a `server.response.header()` call.
    pub fn set_header(&mut self, key: String, value: String) {
        self.headers.entry(key).or_default().push(value);
    }

    /// Records a `server.response.title()` call.
    pub fn set_title(&mut self, text: String) {
        self.title = Some(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_clamps_valid_status() {
        let mut c = CapturedData::default();
        c.render("<p>hi</p>".into(), Some(201));
        assert_eq!(c.status, Some(201));
    }

    #[test]
    fn render_out_of_range_status_is_500() {
        let mut c = CapturedData::default();
        c.render("<p>hi</p>".into(), Some(999));
        assert_eq!(c.status, Some(500));
    }

    #[test]
    fn render_unset_status_defaults_to_200() {
        let mut c = CapturedData::default();
        c.render("<p>hi</p>".into(), None);
        assert_eq!(c.status, Some(200));
    }

    #[test]
    fn redirect_defaults_to_302() {
        let mut c = CapturedData::default();
        c.redirect("/login".into(), None);
        assert!(c.redirect);
        assert_eq!(c.redirect_status, Some(302));
    }

    #[test]
    fn set_header_appends_to_multimap() {
        let mut c = CapturedData::default();
        c.set_header("x-a".into(), "1".into());
        c.set_header("x-a".into(), "2".into());
        assert_eq!(c.headers.get("x-a").unwrap(), &vec!["1".to_string(), "2".to_string()]);
    }
}
