//! Script tags and the one-time JS bootstrap that wires `Deno.core.ops.*`
//! into the `process`/`server` object graph the bundle sees.

pub(super) mod script_tags {
    pub const BOOTSTRAP: &str = "<bootstrap>";
    pub const CONFIGURE: &str = "<configure>";
    pub const EXECUTE: &str = "<execute>";
}

/// Runs once per VM, at the first `Configure`. Declares `process`,
/// `process.env`, `server.handler`, `server.request`, `server.response`
/// as thin wrappers over the ops bound in [`super::ops`]. `process.env`
/// and the request-scalar getters are backed by `globalThis.__webvm`,
/// which [`super::bootstrap::configure_script`] overwrites on every
/// `Configure` without re-running this script.
pub(super) const BOOTSTRAP_SCRIPT: &str = r#"
    globalThis.__webvm = { env: "", request: {}, state: null };

    globalThis.process = {
        get env() {
            return { ENV: globalThis.__webvm.env };
        },
    };

    globalThis.server = {
        handler: {
            state() {
                return JSON.parse(Deno.core.ops.op_handler_state());
            },
        },
        request: {
            get method() { return globalThis.__webvm.request.method; },
            get proto() { return globalThis.__webvm.request.proto; },
            get protoMajor() { return globalThis.__webvm.request.protoMajor; },
            get protoMinor() { return globalThis.__webvm.request.protoMinor; },
            get remoteAddr() { return globalThis.__webvm.request.remoteAddr; },
            get host() { return globalThis.__webvm.request.host; },
            path() { return globalThis.__webvm.request.path; },
            query() { return JSON.parse(globalThis.__webvm.request.queryJson); },
            headers() { return JSON.parse(globalThis.__webvm.request.headersJson); },
        },
        response: {
            render(html, status) {
                Deno.core.ops.op_response_render(String(html ?? ""), status ?? null);
            },
            redirect(url, status) {
                Deno.core.ops.op_response_redirect(String(url ?? ""), status ?? null);
            },
            setHeader(key, value) {
                Deno.core.ops.op_response_set_header(String(key), String(value));
            },
            setTitle(text) {
                Deno.core.ops.op_response_set_title(String(text));
            },
            setMeta(id, attrs) {
                Deno.core.ops.op_response_set_meta(String(id), JSON.stringify(attrs ?? {}));
            },
            setLink(id, attrs) {
                Deno.core.ops.op_response_set_link(String(id), JSON.stringify(attrs ?? {}));
            },
            setScript(id, attrs) {
                Deno.core.ops.op_response_set_script(String(id), JSON.stringify(attrs ?? {}));
            },
        },
    };
"#;

/// Rebinds the per-request fields on `globalThis.__webvm` without
/// touching the object graph built by [`BOOTSTRAP_SCRIPT`]. `state` is
/// passed through as a JSON string and re-parsed lazily by
/// `server.handler.state()` (re-parsed on every call, not memoized —
/// see the configuration's accompanying design notes).
pub(super) fn configure_script(env: &str, request_json: &str) -> String {
    format!(
        r#"
        globalThis.__webvm.env = {env};
        globalThis.__webvm.request = {request};
        "#,
        env = serde_json::to_string(env).unwrap_or_else(|_| "\"\"".to_string()),
        request = request_json,
    )
}

/// Wraps the bundle source in a try/catch that rethrows with the
/// original stack attached.
pub(super) fn wrap_execute(source: &str) -> String {
    format!(
        r#"
        try {{
            {source}
        }} catch (e) {{
            const err = new Error(e && e.message ? e.message : String(e));
            err.stack = e && e.stack ? e.stack : err.stack;
            throw err;
        }}
        "#,
        source = source
    )
}
