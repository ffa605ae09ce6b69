//! The inbound-request view bound into a VM at `Configure`.

use serde::Serialize;

/// Scalar and multi-map fields of the request the bundle is rendering
/// for. Constructed by the app handler from the actix-web request;
/// the VM never sees the live `HttpRequest`, only this snapshot.
///
/// Serializes camelCase to match the field names the bootstrap script
/// reads off `globalThis.__webvm.request`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    /// HTTP method, e.g. `"GET"`.
    pub method: String,
    /// Protocol name, e.g. `"HTTP/1.1"`.
    pub proto: String,
    /// Major HTTP version number.
    pub proto_major: i32,
    /// Minor HTTP version number.
    pub proto_minor: i32,
    /// Peer address, as seen by the server.
    pub remote_addr: String,
    /// Request `Host` header value.
    pub host: String,
    /// Request path, without the query string.
    pub path: String,
    /// Pre-serialized JSON multi-map, handed straight to `server.request.query()`.
    pub query_json: String,
    /// Pre-serialized JSON multi-map, handed straight to `server.request.headers()`.
    pub headers_json: String,
}
