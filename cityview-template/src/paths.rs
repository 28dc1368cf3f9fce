use serde_json::{Map, Value};

/// How deep [`extract_attribute_paths`] descends by default.
pub const DEFAULT_PATH_DEPTH: usize = 3;

/// Every `prefix.key` path in `data`, parents before children, recursing
/// into plain objects (not arrays) up to `max_depth` levels.
pub fn extract_attribute_paths(data: &Map<String, Value>, prefix: &str, max_depth: usize) -> Vec<String> {
    let mut paths = Vec::new();
    collect(data, prefix, max_depth, &mut paths);
    paths
}

fn collect(data: &Map<String, Value>, prefix: &str, depth: usize, paths: &mut Vec<String>) {
    if depth == 0 {
        return;
    }
    for (key, value) in data {
        let path = format!("{prefix}.{key}");
        paths.push(path.clone());
        if let Value::Object(nested) = value {
            collect(nested, &path, depth - 1, paths);
        }
    }
}

/// Autocomplete entries: `{{entityId}}`, `{{entityType}}`, then one
/// `{{data.*}}` per attribute path.
pub fn placeholder_suggestions(data: Option<&Map<String, Value>>) -> Vec<String> {
    let mut suggestions = vec!["{{entityId}}".to_string(), "{{entityType}}".to_string()];
    if let Some(data) = data {
        suggestions.extend(
            extract_attribute_paths(data, "data", DEFAULT_PATH_DEPTH)
                .into_iter()
                .map(|p| format!("{{{{{p}}}}}")),
        );
    }
    suggestions
}
