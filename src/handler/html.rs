//! Index-HTML mutation (§4.7.5): append the rendered body, client-state
//! script, and head elements into the cached index template.

use crate::error::AppError;
use crate::vm::VmResult;
use lol_html::html_content::ContentType;
use lol_html::{element, HtmlRewriter, Settings};
use std::cell::Cell;
use std::rc::Rc;

fn escape_html_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_html_text(text).replace('"', "&quot;")
}

fn element_tags(tag: &str, list: &crate::dom::DomElementList) -> String {
    let mut out = String::new();
    for el in list.iter() {
        out.push('<');
        out.push_str(tag);
        out.push_str(" id=\"");
        out.push_str(&escape_attr(el.id()));
        out.push('"');
        for (key, value) in el.attribute_pairs() {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        if let Some(text) = el.text_content() {
            out.push_str(text);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
    out
}

/// Mutates `index_bytes` per the `VMResult` and returns the serialised
/// document. `client_state_json` is the JSON blob embedded as the
/// `<script id="{state_id}">`, if any rule exported state.
pub fn mutate(
    index_bytes: &[u8],
    container_id: &str,
    state_id: &str,
    result: &VmResult,
    client_state_json: Option<&str>,
) -> Result<Vec<u8>, AppError> {
    let container_selector = format!("#{container_id}");
    let container_found = Rc::new(Cell::new(false));
    let body_found = Rc::new(Cell::new(false));
    let head_found = Rc::new(Cell::new(false));

    let needs_body = client_state_json.is_some();
    let needs_head = result.title.is_some()
        || !result.metas.is_empty()
        || !result.links.is_empty()
        || !result.scripts.is_empty();

    let mut head_html = String::new();
    if let Some(title) = &result.title {
        head_html.push_str("<title>");
        head_html.push_str(&escape_html_text(title));
        head_html.push_str("</title>");
    }
    head_html.push_str(&element_tags("meta", &result.metas));
    head_html.push_str(&element_tags("link", &result.links));
    head_html.push_str(&element_tags("script", &result.scripts));

    let body_html = client_state_json.map(|json| {
        format!(
            r#"<script id="{}" type="application/json">{}</script>"#,
            escape_attr(state_id),
            json
        )
    });

    let mut output = Vec::new();
    {
        let container_found_h = Rc::clone(&container_found);
        let body_found_h = Rc::clone(&body_found);
        let head_found_h = Rc::clone(&head_found);

        let mut handlers = vec![element!(container_selector, move |el| {
            container_found_h.set(true);
            if let Some(html) = &result.render_html {
                el.append(html, ContentType::Html);
            }
            Ok(())
        })];

        if let Some(body_html) = body_html.clone() {
            handlers.push(element!("body", move |el| {
                body_found_h.set(true);
                el.append(&body_html, ContentType::Html);
                Ok(())
            }));
        }

        if needs_head {
            let head_html = head_html.clone();
            handlers.push(element!("head", move |el| {
                head_found_h.set(true);
                el.append(&head_html, ContentType::Html);
                Ok(())
            }));
        }

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::new()
            },
            |chunk: &[u8]| output.extend_from_slice(chunk),
        );

        rewriter
            .write(index_bytes)
            .map_err(|e| AppError::Render(format!("html parse failed: {e}")))?;
        rewriter
            .end()
            .map_err(|e| AppError::Render(format!("html parse failed: {e}")))?;
    }

    if result.render_html.is_some() && !container_found.get() {
        return Err(AppError::Render("container not found".into()));
    }
    if needs_body && !body_found.get() {
        return Err(AppError::Render("body not found".into()));
    }
    if needs_head && !head_found.get() {
        return Err(AppError::Render("head not found".into()));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomElement;

    fn base_result() -> VmResult {
        VmResult::default()
    }

    #[test]
    fn render_is_appended_into_container() {
        let mut result = base_result();
        result.render_html = Some("<h1>hi</h1>".into());
        let html = mutate(
            b"<html><body><div id=\"root\"></div></body></html>",
            "root",
            "state",
            &result,
            None,
        )
        .unwrap();
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains("<div id=\"root\"><h1>hi</h1></div>"));
    }

    #[test]
    fn missing_container_is_a_render_error() {
        let mut result = base_result();
        result.render_html = Some("<h1>hi</h1>".into());
        let err = mutate(b"<html><body></body></html>", "root", "state", &result, None);
        assert!(err.is_err());
    }

    #[test]
    fn client_state_script_is_appended_to_body() {
        let result = base_result();
        let html = mutate(
            b"<html><body></body></html>",
            "root",
            "state",
            &result,
            Some(r#"{"a":1}"#),
        )
        .unwrap();
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains(r#"<script id="state" type="application/json">{"a":1}</script>"#));
    }

    #[test]
    fn title_and_meta_land_in_head() {
        let mut result = base_result();
        result.title = Some("Hi".into());
        let mut meta = DomElement::new("og");
        meta.set_attribute("name", "og:title");
        result.metas.set(meta);
        let html = mutate(
            b"<html><head></head><body></body></html>",
            "root",
            "state",
            &result,
            None,
        )
        .unwrap();
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains("<title>Hi</title>"));
        assert!(html.contains(r#"<meta id="og" name="og:title">"#));
    }

    #[test]
    fn script_children_become_text_content_not_an_attribute() {
        let mut result = base_result();
        let mut script = DomElement::new("analytics");
        script.set_text_content("console.log(1)");
        result.scripts.set(script);
        let html = mutate(
            b"<html><head></head><body></body></html>",
            "root",
            "state",
            &result,
            None,
        )
        .unwrap();
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains(r#"<script id="analytics">console.log(1)</script>"#));
        assert!(!html.contains("children"));
    }
}
