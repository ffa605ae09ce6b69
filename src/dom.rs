//! DOM element and DOM element list.
//!
//! A minimal ordered-map model for the `<meta>`/`<link>`/`<script>` nodes
//! the VM asks the app handler to inject into the rendered index document
//! (spec: `server.response.setMeta/setLink/setScript`). Identity is by
//! `id`; insertion order is preserved across replacement, matching the
//! invariant that `list.Ids()` is a stable permutation of `list`'s keys.

use std::collections::HashMap;

/// A single element: its attributes in first-seen order.
///
/// Attribute order is preserved the same way the list preserves id
/// order, so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomElement {
    id: String,
    keys: Vec<String>,
    values: HashMap<String, String>,
    text_content: Option<String>,
}

impl DomElement {
    /// Creates a new, attribute-less element with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keys: Vec::new(),
            values: HashMap::new(),
            text_content: None,
        }
    }

    /// The element's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the element's text content (used by `<script>` elements,
    /// whose `children` attribute is text content rather than an
    /// emitted HTML attribute).
    pub fn set_text_content(&mut self, text: impl Into<String>) {
        self.text_content = Some(text.into());
    }

    /// The element's text content, if any.
    pub fn text_content(&self) -> Option<&str> {
        self.text_content.as_deref()
    }

    /// Upserts an attribute, preserving the position of the key if it
    /// already exists.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.values.insert(key, value.into());
    }

    /// Returns the attribute value, or an empty string if unset.
    pub fn get_attribute(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Attribute keys in insertion order.
    pub fn attributes(&self) -> &[String] {
        &self.keys
    }

    /// Iterates `(key, value)` pairs in insertion order.
    pub fn attribute_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .map(move |k| (k.as_str(), self.values.get(k).map(String::as_str).unwrap_or("")))
    }
}

/// Error returned by [`DomElementList::get`] for an unknown id.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid id")]
pub struct InvalidId;

/// An ordered collection of [`DomElement`]s keyed by id.
///
/// `ids()` always returns a permutation of `data`'s keys (invariant I7):
/// insertion order is preserved, and replacing an existing id does not
/// move it.
#[derive(Debug, Clone, Default)]
pub struct DomElementList {
    ids: Vec<String>,
    data: HashMap<String, DomElement>,
}

impl DomElementList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts an element by id, appending to `ids` only on first insert.
    pub fn set(&mut self, element: DomElement) {
        let id = element.id().to_string();
        if !self.data.contains_key(&id) {
            self.ids.push(id.clone());
        }
        self.data.insert(id, element);
    }

    /// Looks up an element by id.
    pub fn get(&self, id: &str) -> Result<&DomElement, InvalidId> {
        self.data.get(id).ok_or(InvalidId)
    }

    /// Ids in first-insert order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// True if no elements have been inserted.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates elements in first-insert order.
    pub fn iter(&self) -> impl Iterator<Item = &DomElement> {
        self.ids.iter().filter_map(move |id| self.data.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_defaults_to_none() {
        let mut el = DomElement::new("x");
        assert_eq!(el.text_content(), None);
        el.set_text_content("console.log(1)");
        assert_eq!(el.text_content(), Some("console.log(1)"));
    }

    #[test]
    fn attribute_order_is_first_seen() {
        let mut el = DomElement::new("x");
        el.set_attribute("b", "2");
        el.set_attribute("a", "1");
        el.set_attribute("b", "20");
        assert_eq!(el.attributes(), &["b".to_string(), "a".to_string()]);
        assert_eq!(el.get_attribute("b"), "20");
    }

    #[test]
    fn missing_attribute_is_empty_string() {
        let el = DomElement::new("x");
        assert_eq!(el.get_attribute("missing"), "");
    }

    #[test]
    fn list_ids_preserve_first_insert_order() {
        let mut list = DomElementList::new();
        list.set(DomElement::new("one"));
        list.set(DomElement::new("two"));
        list.set(DomElement::new("one"));
        assert_eq!(list.ids(), &["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn replacing_an_id_does_not_move_it() {
        let mut list = DomElementList::new();
        list.set(DomElement::new("a"));
        list.set(DomElement::new("b"));
        let mut replaced = DomElement::new("a");
        replaced.set_attribute("k", "v");
        list.set(replaced);
        assert_eq!(list.ids(), &["a".to_string(), "b".to_string()]);
        assert_eq!(list.get("a").unwrap().get_attribute("k"), "v");
    }

    #[test]
    fn get_unknown_id_fails() {
        let list = DomElementList::new();
        assert_eq!(list.get("nope"), Err(InvalidId));
    }
}
