//! Host API ops bound into the VM's `Deno.core.ops.*` namespace.
//!
//! Each op reads or mutates state stashed in `OpState`: a read-only
//! [`super::config::VmConfig`] (rebuilt per `Configure`) and the
//! [`super::captured::CapturedData`] the bundle is filling in during
//! the current `Execute` (shared with the host via `Rc<RefCell<_>>` so
//! `Execute`'s caller can take it back out once the script returns).

use super::captured::CapturedData;
use super::config::VmConfig;
use deno_core::{op2, OpState};
use std::cell::RefCell;
use std::rc::Rc;

pub(super) type SharedCaptured = Rc<RefCell<CapturedData>>;
pub(super) type SharedConfig = Rc<RefCell<VmConfig>>;

#[op2]
#[string]
pub fn op_handler_state(state: &mut OpState) -> String {
    let config = state.borrow::<SharedConfig>().borrow();
    config.state.clone().unwrap_or_else(|| "null".to_string())
}

#[op2]
pub fn op_response_render(
    state: &mut OpState,
    #[string] html: String,
    status: Option<i32>,
) {
    state
        .borrow::<SharedCaptured>()
        .borrow_mut()
        .render(html, status);
}

#[op2]
pub fn op_response_redirect(
    state: &mut OpState,
    #[string] url: String,
    status: Option<i32>,
) {
    state
        .borrow::<SharedCaptured>()
        .borrow_mut()
        .redirect(url, status);
}

#[op2(fast)]
pub fn op_response_set_header(
    state: &mut OpState,
    #[string] key: String,
    #[string] value: String,
) {
    state
        .borrow::<SharedCaptured>()
        .borrow_mut()
        .set_header(key, value);
}

#[op2(fast)]
pub fn op_response_set_title(state: &mut OpState, #[string] text: String) {
    state.borrow::<SharedCaptured>().borrow_mut().set_title(text);
}

fn set_dom_element(
    state: &mut OpState,
    id: String,
    attrs_json: String,
    pick: impl Fn(&mut CapturedData) -> &mut crate::dom::DomElementList,
) {
    let attrs: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&attrs_json).unwrap_or_default();

    let mut element = crate::dom::DomElement::new(id);
    for (key, value) in attrs {
        let value = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        if key == "children" {
            element.set_text_content(value);
        } else {
            element.set_attribute(key, value);
        }
    }

    let captured = state.borrow::<SharedCaptured>();
    let mut captured = captured.borrow_mut();
    pick(&mut captured).set(element);
}

#[op2(fast)]
pub fn op_response_set_meta(
    state: &mut OpState,
    #[string] id: String,
    #[string] attrs_json: String,
) {
    set_dom_element(state, id, attrs_json, |c| &mut c.metas);
}

#[op2(fast)]
pub fn op_response_set_link(
    state: &mut OpState,
    #[string] id: String,
    #[string] attrs_json: String,
) {
    set_dom_element(state, id, attrs_json, |c| &mut c.links);
}

#[op2(fast)]
pub fn op_response_set_script(
    state: &mut OpState,
    #[string] id: String,
    #[string] attrs_json: String,
) {
    set_dom_element(state, id, attrs_json, |c| &mut c.scripts);
}

deno_core::extension!(
    webvm_host,
    ops = [
        op_handler_state,
        op_response_render,
        op_response_redirect,
        op_response_set_header,
        op_response_set_title,
        op_response_set_meta,
        op_response_set_link,
        op_response_set_script,
    ],
);

/// Builds the extension registering this module's ops, for `JsRuntime::new`.
pub(super) fn extension() -> deno_core::Extension {
    webvm_host::init_ops()
}
