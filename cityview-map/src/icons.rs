//! Colorized vector marker icons.

use crate::IconImage;
use cityview_model::IconShape;

const COLOR_SLOT: &str = "{{color}}";

const PIN_SVG: &str = r#"<svg width="24" height="32" viewBox="0 0 24 32" fill="none" xmlns="http://www.w3.org/2000/svg"><path d="M12 0C5.373 0 0 5.373 0 12c0 9 12 20 12 20s12-11 12-20c0-6.627-5.373-12-12-12z" fill="{{color}}"/><circle cx="12" cy="12" r="5" fill="white"/></svg>"#;
const SQUARE_SVG: &str = r#"<svg width="24" height="24" viewBox="0 0 24 24" fill="none" xmlns="http://www.w3.org/2000/svg"><rect x="2" y="2" width="20" height="20" rx="3" fill="{{color}}" stroke="white" stroke-width="2"/></svg>"#;
const TRIANGLE_SVG: &str = r#"<svg width="24" height="24" viewBox="0 0 24 24" fill="none" xmlns="http://www.w3.org/2000/svg"><path d="M12 2L22 20H2L12 2z" fill="{{color}}" stroke="white" stroke-width="2"/></svg>"#;
const STAR_SVG: &str = r#"<svg width="24" height="24" viewBox="0 0 24 24" fill="none" xmlns="http://www.w3.org/2000/svg"><path d="M12 2l2.4 7.2H22l-6 4.8 2.4 7.2L12 16.8l-6.4 4.4 2.4-7.2-6-4.8h7.6L12 2z" fill="{{color}}" stroke="white" stroke-width="1"/></svg>"#;

/// Icons are drawn at 16 px per unit of marker size.
const ICON_BASE_SIZE: f64 = 16.0;

/// Image id for a (shape, color) pair, e.g. `ngsi-icon-pin-ef4444`.
pub fn icon_id(shape: IconShape, color: &str) -> String {
    format!("ngsi-icon-{}-{}", shape.as_str(), color.replace('#', ""))
}

/// The colorized SVG for `shape`. `Circle` has no icon: it is drawn as a
/// circle layer.
pub fn icon_image(shape: IconShape, color: &str) -> Option<IconImage> {
    let (template, width, height) = match shape {
        IconShape::Circle => return None,
        IconShape::Pin => (PIN_SVG, 24, 32),
        IconShape::Square => (SQUARE_SVG, 24, 24),
        IconShape::Triangle => (TRIANGLE_SVG, 24, 24),
        IconShape::Star => (STAR_SVG, 24, 24),
    };
    Some(IconImage {
        svg: template.replace(COLOR_SLOT, color),
        width,
        height,
    })
}

/// Style-spec `icon-size` for a marker size.
pub fn icon_scale(size: f64) -> f64 {
    size / ICON_BASE_SIZE
}

/// Pins point at their location with the tip; other shapes are centered.
pub fn icon_anchor(shape: IconShape) -> &'static str {
    match shape {
        IconShape::Pin => "bottom",
        _ => "center",
    }
}
