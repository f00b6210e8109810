//! Values embedded in the playlist HTML page.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::IgnoredAny;
use serde_json::Deserializer;

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Assignments that precede the initial-data object, most specific first.
static INITIAL_DATA_RE: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        compile_static_regex(r#"window\[['"]ytInitialData['"]\]\s*=\s*"#),
        compile_static_regex(r"ytInitialData\s*=\s*"),
    ]
});

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#));

/// Returns the JSON text assigned to `ytInitialData`.
///
/// The object is delimited by parsing rather than by pattern, so braces
/// inside string values are handled.
#[must_use]
pub fn extract_initial_data(html: &str) -> Option<&str> {
    INITIAL_DATA_RE
        .iter()
        .filter_map(|re| re.find(html))
        .find_map(|assignment| json_object_at(&html[assignment.end()..]))
}

/// Returns the `INNERTUBE_API_KEY` from the embedded client config.
#[must_use]
pub fn extract_api_key(html: &str) -> Option<String> {
    API_KEY_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The leading JSON object of `text`, if it starts with one.
fn json_object_at(text: &str) -> Option<&str> {
    if !text.starts_with('{') {
        return None;
    }
    let mut values = Deserializer::from_str(text).into_iter::<IgnoredAny>();
    values.next()?.ok()?;
    Some(&text[..values.byte_offset()])
}
