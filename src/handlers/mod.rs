//! Auxiliary handlers (§1, §6): `file`, `robots`, `sitemap`. Only their
//! cache and render-writer contract is specified — bodies are
//! illustrative stand-ins for the real static-file/SEO routes.

use crate::cache::TtlCache;
use crate::render::{Render, RenderWriterPool};
use actix_web::http::StatusCode;
use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

const ROBOTS_TXT: &str = include_str!("../../assets/robots.txt");
const SITEMAP_XML: &str = include_str!("../../assets/sitemap.xml");

/// The shared cache and writer pool backing `file`/`robots`/`sitemap`.
pub struct AuxiliaryHandlers {
    cache: TtlCache<Render>,
    writer_pool: RenderWriterPool,
}

impl AuxiliaryHandlers {
    /// Builds a response cache of the given ttl/capacity and a fresh
    /// render-writer pool.
    pub fn new(cache_ttl_s: i64, cache_max_items: usize) -> Arc<Self> {
        Arc::new(Self {
            cache: TtlCache::new(cache_ttl_s, cache_max_items),
            writer_pool: RenderWriterPool::new(),
        })
    }

    fn cached_text(&self, key: &str, content_type: &str, body: &str) -> Render {
        if let Some(render) = self.cache.get(key) {
            return render;
        }
        let mut writer = self.writer_pool.get();
        writer
            .header_mut()
            .insert("content-type".to_string(), vec![content_type.to_string()]);
        writer.write(body.as_bytes());
        writer.write_header(200);
        let render = writer.render();
        self.writer_pool.put(writer);
        self.cache.set(key, render.clone());
        render
    }
}

fn to_http_response(render: &Render) -> HttpResponse {
    let status = StatusCode::from_u16(render.status).unwrap_or(StatusCode::OK);
    let mut builder = HttpResponse::build(status);
    for (key, values) in &render.header {
        for value in values {
            builder.append_header((key.as_str(), value.as_str()));
        }
    }
    builder.body(render.body.clone())
}

/// Serves a single file from disk under `/static/`, short-circuited by
/// the shared cache keyed on the request path.
#[get("/static/{filename:.*}")]
pub async fn file(aux: web::Data<Arc<AuxiliaryHandlers>>, path: web::Path<String>) -> HttpResponse {
    let filename = path.into_inner();
    let key = format!("file:{filename}");

    if let Some(render) = aux.cache.get(&key) {
        return to_http_response(&render);
    }

    let bytes = match std::fs::read(&filename) {
        Ok(bytes) => bytes,
        Err(_) => return HttpResponse::NotFound().finish(),
    };

    let mut writer = aux.writer_pool.get();
    writer.write(&bytes);
    writer.write_header(200);
    let render = writer.render();
    aux.writer_pool.put(writer);
    aux.cache.set(key, render.clone());
    to_http_response(&render)
}

/// Serves the embedded `robots.txt`, cached like any other response.
#[get("/robots.txt")]
pub async fn robots(aux: web::Data<Arc<AuxiliaryHandlers>>) -> HttpResponse {
    to_http_response(&aux.cached_text("robots.txt", "text/plain", ROBOTS_TXT))
}

/// Serves the embedded `sitemap.xml`, cached like any other response.
#[get("/sitemap.xml")]
pub async fn sitemap(aux: web::Data<Arc<AuxiliaryHandlers>>) -> HttpResponse {
    to_http_response(&aux.cached_text("sitemap.xml", "application/xml", SITEMAP_XML))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn robots_is_served_from_cache_on_second_call() {
        let aux = AuxiliaryHandlers::new(60, 0);
        let first = aux.cached_text("robots.txt", "text/plain", ROBOTS_TXT);
        let second = aux.cached_text("robots.txt", "text/plain", ROBOTS_TXT);
        assert_eq!(first, second);
        assert_eq!(first.status, 200);
    }
}
