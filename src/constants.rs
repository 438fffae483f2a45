/// Source system ids and wire-level names shared across the relay

// Source ids (the `service_id` field of an incoming event)
pub const PIPELINE_SOURCE: &str = "pipeline";
pub const TOOLCHAIN_SOURCE: &str = "toolchain";

// Slack usernames per translator
pub const PIPELINE_USERNAME: &str = "Pipeline";
pub const TOOLCHAIN_USERNAME: &str = "Toolchain";
pub const FALLBACK_USERNAME: &str = "Unknown Event";

// Request headers carrying a correlation token, in lookup order
pub const CORRELATION_HEADERS: [&str; 2] = ["vcap_request_id", "x-request-id"];

pub const BASIC_SCHEME: &str = "basic";

/// Get all source ids with a dedicated translator
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![PIPELINE_SOURCE, TOOLCHAIN_SOURCE]
}
