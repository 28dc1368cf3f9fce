//! Popup markup for hovered and clicked features.

use cityview_model::{LayerConfig, format_attribute_name};
use cityview_template::{TemplateContext, format_value, parse_template};
use serde_json::{Map, Value};

const STATUS_GREEN: &str = "#22c55e";
const STATUS_ORANGE: &str = "#f97316";
const STATUS_RED: &str = "#ef4444";
const STATUS_GRAY: &str = "#6b7280";

/// Keys the default detail layout shows in its header instead of the body.
const HEADER_KEYS: [&str; 5] = ["id", "type", "name", "status", "state"];

/// Indicator color for a status keyword, case-insensitive. Unknown keywords
/// are gray.
pub fn status_color(status: &str) -> &'static str {
    match status.to_lowercase().as_str() {
        "online" | "active" | "available" | "ok" => STATUS_GREEN,
        "dispatched" | "busy" | "warning" | "pending" => STATUS_ORANGE,
        "offline" | "error" | "unavailable" => STATUS_RED,
        _ => STATUS_GRAY,
    }
}

/// Shifts `feature_lng` by whole turns so it lies within 180° of
/// `cursor_lng`, so a popup anchors on the copy of the world under the cursor.
pub fn wrap_longitude(feature_lng: f64, cursor_lng: f64) -> f64 {
    if !feature_lng.is_finite() || !cursor_lng.is_finite() {
        return feature_lng;
    }
    let delta = cursor_lng - feature_lng;
    if delta.abs() <= 180.0 {
        return feature_lng;
    }
    let turns = (delta / 360.0).round();
    feature_lng + turns * 360.0
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// First of `keys` holding a non-empty value, as display text.
fn first_text(properties: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| properties.get(*key))
        .map(format_value)
        .find(|text| !text.is_empty())
}

fn status_badge(status: &str, html: &mut String) {
    let color = status_color(status);
    let status = escape_html(status);
    html.push_str(&format!(
        r#"<div class="ngsi-status"><span class="ngsi-status-dot" style="background-color: {color}"></span><span class="ngsi-status-label">{status}</span></div>"#
    ));
}

/// Name, type and status of a hovered feature.
pub fn hover_html(layer: &LayerConfig, properties: Option<&Map<String, Value>>) -> String {
    let Some(properties) = properties else {
        return r#"<div class="ngsi-hover-popup-content">No data</div>"#.to_string();
    };
    let name = first_text(properties, &["name", "id"]).unwrap_or_else(|| layer.name.clone());

    let mut html = String::from(r#"<div class="ngsi-hover-popup-content">"#);
    html.push_str(&format!(r#"<div class="ngsi-title">{}</div>"#, escape_html(&name)));
    if let Some(entity_type) = first_text(properties, &["type"]) {
        html.push_str(&format!(r#"<div class="ngsi-type">{}</div>"#, escape_html(&entity_type)));
    }
    if let Some(status) = first_text(properties, &["status", "state"]) {
        status_badge(&status, &mut html);
    }
    html.push_str(r#"<div class="ngsi-hint">Click for details</div></div>"#);
    html
}

/// Body of the click popup: the layer's template when it has one, otherwise
/// a header plus one row per remaining property.
pub fn detail_html(layer: &LayerConfig, properties: Option<&Map<String, Value>>) -> String {
    let Some(properties) = properties else {
        return "<p>No data available</p>".to_string();
    };
    if let Some(template) = layer.popup_template() {
        return parse_template(template, &TemplateContext::from_properties(properties));
    }

    let name = first_text(properties, &["name", "id"]).unwrap_or_else(|| "Unknown".to_string());
    let entity_type = first_text(properties, &["type"]).unwrap_or_else(|| layer.name.clone());

    let mut html = String::from(r#"<div class="ngsi-popup"><div class="ngsi-popup-header">"#);
    html.push_str(&format!(r#"<div class="ngsi-title">{}</div>"#, escape_html(&name)));
    if let Some(status) = first_text(properties, &["status", "state"]) {
        status_badge(&status, &mut html);
    }
    html.push_str("</div>");
    html.push_str(&format!(r#"<div class="ngsi-type">{}</div>"#, escape_html(&entity_type)));

    html.push_str(r#"<div class="ngsi-popup-body">"#);
    for (key, value) in properties {
        if HEADER_KEYS.contains(&key.as_str()) {
            continue;
        }
        let display = match value {
            Value::Null => "-".to_string(),
            other => format_value(other),
        };
        html.push_str(&format!(
            r#"<div class="ngsi-row"><span class="ngsi-key">{}</span><span class="ngsi-value">{}</span></div>"#,
            escape_html(&format_attribute_name(key)),
            escape_html(&display)
        ));
    }
    html.push_str("</div></div>");
    html
}
