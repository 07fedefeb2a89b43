use anyhow::Result;
use serde_json::json;

use super::dom::IndexedElement;
use super::page::PageDriver;

pub const HIGHLIGHT_PALETTE: [&str; 12] = [
    "#FF0000", "#00A000", "#0000FF", "#FFA500", "#800080", "#008080", "#FF69B4", "#4B0082",
    "#FF4500", "#2E8B57", "#DC143C", "#4682B4",
];

pub const OVERLAY_CONTAINER_ID: &str = "__autopilot_highlight_overlay";

pub fn highlight_color(index: usize) -> &'static str {
    HIGHLIGHT_PALETTE[index % HIGHLIGHT_PALETTE.len()]
}

/// Script that draws one labelled box per element inside a fixed container
pub fn build_overlay_script(elements: &[IndexedElement]) -> String {
    let boxes: Vec<_> = elements
        .iter()
        .map(|el| {
            json!({
                "index": el.index,
                "x": el.bounding_box.x,
                "y": el.bounding_box.y,
                "width": el.bounding_box.width,
                "height": el.bounding_box.height,
                "color": highlight_color(el.index),
            })
        })
        .collect();

    format!(
        r#"
(() => {{
    const old = document.getElementById('{id}');
    if (old) old.remove();
    const container = document.createElement('div');
    container.id = '{id}';
    container.style.cssText = 'position:fixed;top:0;left:0;width:100%;height:100%;pointer-events:none;z-index:2147483647;';
    for (const b of {boxes}) {{
        const box = document.createElement('div');
        box.style.cssText = `position:fixed;left:${{b.x}}px;top:${{b.y}}px;width:${{b.width}}px;height:${{b.height}}px;border:2px solid ${{b.color}};box-sizing:border-box;`;
        const label = document.createElement('span');
        label.textContent = String(b.index);
        label.style.cssText = `position:absolute;top:-2px;right:-2px;background:${{b.color}};color:#fff;font:bold 11px monospace;padding:0 3px;`;
        box.appendChild(label);
        container.appendChild(box);
    }}
    document.documentElement.appendChild(container);
    return true;
}})()
"#,
        id = OVERLAY_CONTAINER_ID,
        boxes = serde_json::Value::Array(boxes),
    )
}

pub fn remove_overlay_script() -> String {
    format!(
        "(() => {{ const el = document.getElementById('{}'); if (el) el.remove(); return true; }})()",
        OVERLAY_CONTAINER_ID
    )
}

/// Draw index boxes, capture one screenshot, then remove the overlay.
///
/// Removal is attempted whether or not drawing or capturing failed.
pub async fn screenshot_with_highlights(
    page: &dyn PageDriver,
    elements: &[IndexedElement],
    timeout_ms: u64,
) -> Result<String> {
    let shot = match page.evaluate(&build_overlay_script(elements), timeout_ms).await {
        Ok(_) => page.screenshot(timeout_ms).await,
        Err(e) => Err(e),
    };

    if let Err(e) = page.evaluate(&remove_overlay_script(), timeout_ms).await {
        tracing::warn!("Failed to remove highlight overlay: {}", e);
    }

    shot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::dom::BoundingBox;

    #[test]
    fn test_palette_cycles() {
        assert_eq!(highlight_color(0), highlight_color(12));
        assert_eq!(highlight_color(5), highlight_color(29));
        assert_ne!(highlight_color(0), highlight_color(1));
    }

    #[test]
    fn test_overlay_script_embeds_boxes() {
        let el = IndexedElement {
            index: 13,
            element_type: "button".to_string(),
            text: None,
            placeholder: None,
            href: None,
            aria_label: None,
            selector: "#go".to_string(),
            bounding_box: BoundingBox {
                x: 4.0,
                y: 8.0,
                width: 100.0,
                height: 20.0,
            },
        };
        let script = build_overlay_script(&[el]);
        assert!(script.contains(OVERLAY_CONTAINER_ID));
        assert!(script.contains("\"index\":13"));
        assert!(script.contains(highlight_color(13)));
    }
}
