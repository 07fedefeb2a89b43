use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::page::PageDriver;
use crate::models::ElementIndex;

/// Viewport-relative rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An interactive element observed in one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedElement {
    pub index: ElementIndex,
    /// Element category, e.g. "button", "input[email]", "a"
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    pub selector: String,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

/// Thresholds for deciding that the page changed under a running batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomChangeThresholds {
    /// Element-count delta, as a fraction of the old count
    pub count_delta_ratio: f64,
    /// Fraction of new elements whose selector was absent before
    pub new_selector_ratio: f64,
}

impl Default for DomChangeThresholds {
    fn default() -> Self {
        Self {
            count_delta_ratio: 0.2,
            new_selector_ratio: 0.3,
        }
    }
}

/// Elements of one indexing pass, addressable by index
#[derive(Debug, Clone, Default)]
pub struct ElementSnapshot {
    pub elements: Vec<IndexedElement>,
    by_index: HashMap<ElementIndex, usize>,
}

impl ElementSnapshot {
    pub fn new(elements: Vec<IndexedElement>) -> Self {
        let by_index = elements
            .iter()
            .enumerate()
            .map(|(pos, el)| (el.index, pos))
            .collect();
        Self { elements, by_index }
    }

    pub fn get(&self, index: ElementIndex) -> Option<&IndexedElement> {
        self.by_index.get(&index).map(|&pos| &self.elements[pos])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn format_for_llm(&self) -> String {
        format_elements_for_llm(&self.elements)
    }
}

/// Elements further than this outside the viewport are not indexed
pub const VIEWPORT_MARGIN_PX: u32 = 300;

/// Max characters kept for descriptive strings
pub const MAX_TEXT_CHARS: usize = 50;

/// JavaScript that discovers interactive elements in document order.
///
/// Categories are visited in a fixed order and a node seen under an earlier
/// category is skipped. Returns `IndexedElement`-shaped objects.
pub const INDEX_ELEMENTS_SCRIPT: &str = r#"
(() => {
    const MARGIN = __MARGIN__;
    const MAX_TEXT = __MAX_TEXT__;

    const categories = [
        'a[href]',
        'button',
        'input:not([type="hidden"])',
        'textarea',
        'select',
        '[role="button"]',
        '[role="link"]',
        '[role="tab"]',
        '[role="menuitem"]',
        '[onclick]'
    ];

    const clip = (s) => {
        if (s === null || s === undefined) return null;
        const t = String(s).trim().replace(/\s+/g, ' ');
        if (!t) return null;
        return t.length > MAX_TEXT ? t.substring(0, MAX_TEXT) : t;
    };

    const quote = (v) => String(v).replace(/\\/g, '\\\\').replace(/"/g, '\\"');

    const isVisible = (el) => {
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 || rect.height === 0) return false;
        const style = window.getComputedStyle(el);
        if (style.display === 'none') return false;
        if (style.visibility === 'hidden') return false;
        if (rect.bottom < -MARGIN || rect.top > window.innerHeight + MARGIN) return false;
        if (rect.right < -MARGIN || rect.left > window.innerWidth + MARGIN) return false;
        return true;
    };

    const stableId = (id) => id && /^[A-Za-z][\w-]*$/.test(id) && !/\d{4,}/.test(id);

    const getSelector = (el) => {
        const tag = el.tagName.toLowerCase();

        if (stableId(el.id)) return '#' + CSS.escape(el.id);

        for (const attr of ['data-testid', 'data-test', 'data-cy', 'data-test-id']) {
            const v = el.getAttribute(attr);
            if (v) return `[${attr}="${quote(v)}"]`;
        }

        const name = el.getAttribute('name');
        if (name) return `${tag}[name="${quote(name)}"]`;

        if (tag === 'a') {
            const href = el.getAttribute('href');
            if (href && href.length <= 100 && !href.startsWith('javascript:')) {
                return `a[href="${quote(href)}"]`;
            }
        }

        const aria = el.getAttribute('aria-label');
        if (aria) return `${tag}[aria-label="${quote(aria)}"]`;

        const role = el.getAttribute('role');
        if (role) return `${tag}[role="${quote(role)}"]`;

        if (tag === 'input' && el.type) return `input[type="${quote(el.type)}"]`;

        return tag;
    };

    const getType = (el) => {
        const tag = el.tagName.toLowerCase();
        if (tag === 'input') return `input[${(el.type || 'text').toLowerCase()}]`;
        if (['a', 'button', 'textarea', 'select'].includes(tag)) return tag;
        return el.getAttribute('role') || tag;
    };

    const getText = (el) => {
        if (['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName)) return null;
        return clip(el.innerText || el.textContent);
    };

    const seen = new Set();
    const elements = [];

    for (const selector of categories) {
        for (const el of document.querySelectorAll(selector)) {
            if (seen.has(el)) continue;
            seen.add(el);
            if (!isVisible(el)) continue;

            const rect = el.getBoundingClientRect();
            elements.push({
                index: elements.length,
                type: getType(el),
                text: getText(el),
                placeholder: clip(el.getAttribute('placeholder')),
                href: clip(el.getAttribute('href')),
                ariaLabel: clip(el.getAttribute('aria-label')),
                selector: getSelector(el),
                boundingBox: {
                    x: Math.round(rect.x),
                    y: Math.round(rect.y),
                    width: Math.round(rect.width),
                    height: Math.round(rect.height)
                }
            });
        }
    }

    return elements;
})()
"#;

/// Index script with its constants filled in
pub fn index_script() -> String {
    INDEX_ELEMENTS_SCRIPT
        .replace("__MARGIN__", &VIEWPORT_MARGIN_PX.to_string())
        .replace("__MAX_TEXT__", &MAX_TEXT_CHARS.to_string())
}

/// Index the interactive elements of the current page
pub async fn index_elements(page: &dyn PageDriver, timeout_ms: u64) -> Result<ElementSnapshot> {
    let value = page.evaluate(&index_script(), timeout_ms).await?;
    let elements = parse_elements(value)?;
    tracing::debug!("Indexed {} interactive elements", elements.len());
    Ok(ElementSnapshot::new(elements))
}

/// Parse the index script output. Indices are reassigned sequentially so
/// they are unique and follow output order.
pub fn parse_elements(value: serde_json::Value) -> Result<Vec<IndexedElement>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let mut elements: Vec<IndexedElement> = serde_json::from_value(value)
        .map_err(|e| anyhow!("Failed to parse elements: {}", e))?;
    for (i, el) in elements.iter_mut().enumerate() {
        el.index = i;
    }
    Ok(elements)
}

/// Decide whether the page changed enough that a planned batch is stale
pub fn has_significant_dom_change(
    old: &[IndexedElement],
    new: &[IndexedElement],
    thresholds: &DomChangeThresholds,
) -> bool {
    let old_count = old.len() as f64;
    let new_count = new.len() as f64;

    if (new_count - old_count).abs() > old_count * thresholds.count_delta_ratio {
        return true;
    }

    if new.is_empty() {
        return false;
    }

    let old_selectors: HashSet<&str> = old.iter().map(|e| e.selector.as_str()).collect();
    let appeared = new
        .iter()
        .filter(|e| !old_selectors.contains(e.selector.as_str()))
        .count() as f64;

    appeared / new_count > thresholds.new_selector_ratio
}

/// Format elements for LLM context.
/// Output format: [index]<type attr=value />text
pub fn format_elements_for_llm(elements: &[IndexedElement]) -> String {
    let mut output = String::new();

    for el in elements {
        let mut attrs: Vec<String> = Vec::new();

        if let Some(p) = &el.placeholder {
            attrs.push(format!("placeholder=\"{}\"", p));
        }

        if let Some(a) = &el.aria_label {
            let same_as_text = el
                .text
                .as_ref()
                .map(|t| t.eq_ignore_ascii_case(a))
                .unwrap_or(false);
            if !same_as_text {
                attrs.push(format!("aria-label=\"{}\"", a));
            }
        }

        if let Some(h) = &el.href {
            if !h.starts_with("javascript:") {
                attrs.push(format!("href=\"{}\"", h));
            }
        }

        let attr_str = if attrs.is_empty() {
            String::new()
        } else {
            format!(" {}", attrs.join(" "))
        };

        let line = match el.text.as_deref().filter(|t| !t.is_empty()) {
            Some(t) => format!("[{}]<{}{}>{}", el.index, el.element_type, attr_str, t),
            None => format!("[{}]<{}{} />", el.index, el.element_type, attr_str),
        };

        output.push_str(&line);
        output.push('\n');
    }

    if output.is_empty() {
        output.push_str("(no interactive elements found)\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn el(index: usize, selector: &str) -> IndexedElement {
        IndexedElement {
            index,
            element_type: "button".to_string(),
            text: Some(format!("Button {}", index)),
            placeholder: None,
            href: None,
            aria_label: None,
            selector: selector.to_string(),
            bounding_box: BoundingBox::default(),
        }
    }

    fn many(n: usize, prefix: &str) -> Vec<IndexedElement> {
        (0..n).map(|i| el(i, &format!("#{}-{}", prefix, i))).collect()
    }

    #[test]
    fn test_identical_snapshots_unchanged() {
        let old = many(10, "a");
        assert!(!has_significant_dom_change(&old, &old.clone(), &DomChangeThresholds::default()));
    }

    #[test]
    fn test_count_change_above_threshold() {
        let old = many(10, "a");
        let new = many(7, "a");
        assert!(has_significant_dom_change(&old, &new, &DomChangeThresholds::default()));
    }

    #[test]
    fn test_count_change_at_threshold_is_not_significant() {
        let old = many(10, "a");
        let new = many(8, "a");
        assert!(!has_significant_dom_change(&old, &new, &DomChangeThresholds::default()));
    }

    #[test]
    fn test_new_selectors_above_threshold() {
        let old = many(10, "a");
        let mut new = many(6, "a");
        new.extend((6..10).map(|i| el(i, &format!("#b-{}", i))));
        assert!(has_significant_dom_change(&old, &new, &DomChangeThresholds::default()));
    }

    #[test]
    fn test_few_new_selectors_tolerated() {
        let old = many(10, "a");
        let mut new = many(8, "a");
        new.extend((8..10).map(|i| el(i, &format!("#b-{}", i))));
        assert!(!has_significant_dom_change(&old, &new, &DomChangeThresholds::default()));
    }

    #[test]
    fn test_empty_page_gaining_elements() {
        assert!(has_significant_dom_change(&[], &many(3, "a"), &DomChangeThresholds::default()));
        assert!(!has_significant_dom_change(&[], &[], &DomChangeThresholds::default()));
    }

    #[test]
    fn test_parse_reassigns_sequential_indices() {
        let value = json!([
            {"index": 5, "type": "a", "selector": "a[href=\"/home\"]", "href": "/home", "text": "Home"},
            {"index": 5, "type": "input[email]", "selector": "#email", "placeholder": "Email Address",
             "boundingBox": {"x": 10.0, "y": 20.0, "width": 200.0, "height": 30.0}}
        ]);
        let elements = parse_elements(value).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].index, 0);
        assert_eq!(elements[1].index, 1);
        assert_eq!(elements[1].bounding_box.width, 200.0);

        let snapshot = ElementSnapshot::new(elements);
        assert_eq!(snapshot.get(1).map(|e| e.selector.as_str()), Some("#email"));
        assert!(snapshot.get(2).is_none());
    }

    #[test]
    fn test_parse_null_is_empty() {
        assert!(parse_elements(serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_format_for_llm() {
        let mut input = el(1, "#email");
        input.element_type = "input[email]".to_string();
        input.text = None;
        input.placeholder = Some("Email Address".to_string());
        let out = format_elements_for_llm(&[el(0, "#go"), input]);
        assert_eq!(
            out,
            "[0]<button>Button 0\n[1]<input[email] placeholder=\"Email Address\" />\n"
        );
    }

    #[test]
    fn test_index_script_has_constants_filled() {
        let script = index_script();
        assert!(!script.contains("__MARGIN__"));
        assert!(script.contains("const MARGIN = 300;"));
    }
}
