//! Page-context scripts evaluated by the chromiumoxide session.
//!
//! Scripts live in `scripts/` so editors highlight them; they are bundled at
//! compile time.

/// Arrow function taking a CSS selector and returning whether its first match
/// is visible: present, not `visibility: hidden`, not `display: none`, and
/// with a non-empty bounding box.
pub const VISIBILITY_PROBE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/visibility_probe.js"
));

/// Expression applying [`VISIBILITY_PROBE`] to `selector`.
///
/// The selector is embedded as a JSON string literal, so quotes and
/// backslashes in it cannot break out of the call.
pub fn visibility_expression(selector: &str) -> String {
    let literal = serde_json::Value::String(selector.to_string()).to_string();
    format!("({})({literal})", VISIBILITY_PROBE.trim())
}
