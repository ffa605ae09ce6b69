//! The app handler: rule engine → state materialisation → VM execution →
//! HTML mutation → response cache (§4.7).

mod file_cache;
mod html;
mod rules;

use crate::cache::TtlCache;
use crate::config::ValidatedConfig;
use crate::error::AppError;
use crate::render::{Render, RenderWriterPool};
use crate::store::ResourceStore;
use crate::vm::{RequestView, VmConfig, VmPool};
use actix_web::http::{StatusCode, Version};
use actix_web::{get, web, HttpRequest, HttpResponse};
use file_cache::FileCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const BUNDLE_SCRIPT_NAME: &str = "bundle";

/// Ties together the index/bundle read-cache, the rule engine, the VM
/// pool, and the response cache for one configured app mount.
pub struct AppHandler {
    config: ValidatedConfig,
    store: Arc<dyn ResourceStore>,
    index_cache: FileCache,
    bundle_cache: FileCache,
    vm_pool: Arc<VmPool>,
    writer_pool: RenderWriterPool,
    response_cache: TtlCache<Render>,
}

impl AppHandler {
    /// Allocates the render-writer pool, VM pool, and response cache
    /// (§4.7.1's `Init`). `config` must already be validated.
    pub fn init(config: ValidatedConfig, store: Arc<dyn ResourceStore>) -> Arc<Self> {
        let vm_pool = VmPool::new(config.max_vms);
        let response_cache = TtlCache::new(config.cache_ttl_s, config.cache_max_items);
        Arc::new(Self {
            index_cache: FileCache::new(config.index.clone()),
            bundle_cache: FileCache::new(config.bundle.clone()),
            writer_pool: RenderWriterPool::new(),
            vm_pool,
            response_cache,
            config,
            store,
        })
    }

    /// Performs the initial index/bundle read; failure here is fatal
    /// (§4.7.1's `Start`).
    pub fn start(&self) -> Result<(), AppError> {
        self.index_cache.read()?;
        self.bundle_cache.read()?;
        Ok(())
    }

    /// Clears cached mtimes and the response cache (§4.7.7). Pool
    /// contents and VMs outlive this call.
    pub fn stop(&self) {
        self.index_cache.forget();
        self.bundle_cache.forget();
        self.response_cache.clear();
    }

    #[cfg(test)]
    fn init_with_pool(config: ValidatedConfig, store: Arc<dyn ResourceStore>, vm_pool: Arc<VmPool>) -> Arc<Self> {
        let response_cache = TtlCache::new(config.cache_ttl_s, config.cache_max_items);
        Arc::new(Self {
            index_cache: FileCache::new(config.index.clone()),
            bundle_cache: FileCache::new(config.bundle.clone()),
            writer_pool: RenderWriterPool::new(),
            vm_pool,
            response_cache,
            config,
            store,
        })
    }

    /// Renders one request end-to-end: cache lookup, rule evaluation, VM
    /// execution, HTML mutation, and response-cache population.
    pub async fn render(&self, request: RequestView) -> Result<Render, AppError> {
        if self.config.cache_enabled {
            if let Some(cached) = self.response_cache.get(&request.path) {
                return Ok(cached);
            }
        }

        let cache_key = request.path.clone();
        let bundle = self.bundle_cache.read()?;
        let index = self.index_cache.read()?;

        let rule_match = rules::evaluate(&self.config.rules, &request.path, self.store.as_ref());
        let server_state_json = serde_json::to_string(&rule_match.server_state)
            .map_err(|e| AppError::VmConfigure(format!("server state serialize failed: {e}")))?;

        let vm_config = VmConfig {
            env: self.config.env.clone(),
            request,
            state: Some(server_state_json),
        };

        let source = String::from_utf8_lossy(&bundle).into_owned();
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let lease = self.vm_pool.get().await?;
        lease.configure(vm_config).await?;
        let result = lease
            .handle()
            .execute(BUNDLE_SCRIPT_NAME, source, timeout)
            .await?;

        let mut writer = self.writer_pool.get();

        if result.redirect {
            let url = result.redirect_url.clone().unwrap_or_default();
            let status = result.redirect_status.unwrap_or(302);
            writer.write_redirect(url, status);
        } else {
            for (key, values) in &result.headers {
                let entry = writer.header_mut().entry(key.clone()).or_default();
                entry.extend(values.iter().cloned());
            }
            let status = if rule_match.valid {
                result.status.unwrap_or(200)
            } else {
                503
            };
            writer.write_header(status);

            let client_state_json = rule_match
                .client_state
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| AppError::Render(format!("client state serialize failed: {e}")))?;

            let html = html::mutate(
                &index,
                &self.config.container,
                &self.config.state,
                &result,
                client_state_json.as_deref(),
            )?;
            writer.write(&html);
        }

        let render = writer.render();
        self.writer_pool.put(writer);

        if self.config.cache_enabled {
            self.response_cache
                .set_with_ttl(cache_key, render.clone(), self.config.cache_ttl_s);
        }

        Ok(render)
    }
}

fn request_view(req: &HttpRequest) -> RequestView {
    let (proto_major, proto_minor) = match req.version() {
        Version::HTTP_09 => (0, 9),
        Version::HTTP_10 => (1, 0),
        Version::HTTP_2 => (2, 0),
        Version::HTTP_3 => (3, 0),
        _ => (1, 1),
    };

    let query_map = parse_query(req.query_string());
    let header_map = collect_headers(req);

    RequestView {
        method: req.method().as_str().to_string(),
        proto: format!("HTTP/{proto_major}.{proto_minor}"),
        proto_major,
        proto_minor,
        remote_addr: req
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default(),
        host: req.connection_info().host().to_string(),
        path: req.path().to_string(),
        query_json: serde_json::to_string(&query_map).unwrap_or_else(|_| "{}".to_string()),
        headers_json: serde_json::to_string(&header_map).unwrap_or_else(|_| "{}".to_string()),
    }
}

fn parse_query(query_string: &str) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    map
}

fn collect_headers(req: &HttpRequest) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            map.entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    map
}

fn render_to_response(render: Render) -> HttpResponse {
    let status = StatusCode::from_u16(render.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if render.redirect {
        return HttpResponse::build(status)
            .append_header(("Location", render.redirect_url))
            .finish();
    }

    let mut builder = HttpResponse::build(status);
    for (key, values) in &render.header {
        for value in values {
            builder.append_header((key.as_str(), value.as_str()));
        }
    }
    builder.body(render.body)
}

/// Catch-all route for the app handler: evaluates rules, runs the
/// bundle, and serves the mutated index document.
#[get("/{path:.*}")]
pub async fn app(handler: web::Data<Arc<AppHandler>>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let request = request_view(&req);
    let render = handler.render(request).await?;
    Ok(render_to_response(render))
}
