//! Specification (attribute table) extraction.
//!
//! Retailers publish spec sheets as data tables, as `<li>` runs, or as loose
//! label/value card markup, and some only as free prose. Extraction widens
//! its net in that order: structured patterns scoped to the product element,
//! the same patterns rescoped to the whole page, then a keyword-gated
//! free-text sweep. Total failure is an empty map, never an error.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

pub const MAX_KEY_LEN: usize = 50;
pub const MAX_VALUE_LEN: usize = 100;
/// Looser bounds used while collecting, before the final cleaning pass.
const RAW_KEY_LIMIT: usize = 100;
const RAW_VALUE_LIMIT: usize = 200;
/// Enough attributes; stop trying further patterns.
const ENOUGH_SPECS: usize = 5;

/// Spec keys must contain one of these for the free-text fallback to trust
/// them. Keeps the sweep from harvesting navigation and boilerplate.
const DOMAIN_KEYWORDS: [&str; 28] = [
    "پردازنده",
    "حافظه",
    "دوربین",
    "باتری",
    "نمایشگر",
    "صفحه نمایش",
    "رم",
    "حافظه داخلی",
    "سیستم عامل",
    "وزن",
    "ابعاد",
    "رنگ",
    "شبکه",
    "اتصال",
    "سنسور",
    "گارانتی",
    "processor",
    "cpu",
    "memory",
    "camera",
    "battery",
    "display",
    "ram",
    "storage",
    "operating system",
    "weight",
    "dimension",
    "sensor",
];

// ── Structured patterns ───────────────────────────────────────────────────────

/// The three structural shapes spec sheets come in. Tried in order; the
/// first shape that yields anything wins for its scope.
enum SpecPattern {
    /// `<tr>` rows where the first cell is the label, the second the value.
    TableRows,
    /// List items with a `key: value` or `key - value` text body.
    ListItems,
    /// Generic spec/feature/detail containers, with either explicit
    /// label/value children or a splittable text body.
    Cards,
}

impl SpecPattern {
    const CASCADE: [SpecPattern; 3] = [
        SpecPattern::TableRows,
        SpecPattern::ListItems,
        SpecPattern::Cards,
    ];

    fn extract(&self, scope: ElementRef<'_>, out: &mut BTreeMap<String, String>) {
        match self {
            SpecPattern::TableRows => extract_table_rows(scope, out),
            SpecPattern::ListItems => extract_list_items(scope, out),
            SpecPattern::Cards => extract_cards(scope, out),
        }
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn extract_table_rows(scope: ElementRef<'_>, out: &mut BTreeMap<String, String>) {
    let Ok(row_sel) = Selector::parse("table tr") else {
        return;
    };
    let Ok(cell_sel) = Selector::parse("th, td") else {
        return;
    };

    for row in scope.select(&row_sel) {
        if out.len() > ENOUGH_SPECS {
            break;
        }
        let cells: Vec<String> = row.select(&cell_sel).map(element_text).collect();
        if cells.len() >= 2 {
            insert_cleaned(out, &cells[0], &cells[1]);
        }
    }
}

fn extract_list_items(scope: ElementRef<'_>, out: &mut BTreeMap<String, String>) {
    let Ok(item_sel) = Selector::parse("ul li, ol li") else {
        return;
    };

    for item in scope.select(&item_sel) {
        if out.len() > ENOUGH_SPECS {
            break;
        }
        let text = element_text(item);
        if let Some((key, value)) = split_pair(&text, &[':', '-']) {
            insert_cleaned(out, &key, &value);
        }
    }
}

const CARD_SELECTORS: [&str; 6] = [
    ".specification",
    ".spec-item",
    ".feature-item",
    "[class*=\"spec\"]",
    "[class*=\"feature\"]",
    "[class*=\"detail\"]",
];

/// Explicit label/value child pairs inside a card, most specific first.
const LABEL_VALUE_SELECTORS: [(&str, &str); 4] = [
    ("dt", "dd"),
    (".spec-label", ".spec-value"),
    (".label", ".value"),
    ("th", "td"),
];

fn extract_cards(scope: ElementRef<'_>, out: &mut BTreeMap<String, String>) {
    for card_sel in CARD_SELECTORS {
        let Ok(sel) = Selector::parse(card_sel) else {
            continue;
        };

        for card in scope.select(&sel) {
            if out.len() > ENOUGH_SPECS {
                return;
            }
            if extract_card_children(card, out) {
                continue;
            }
            // No explicit sub-elements: split the card's own text.
            let text = element_text(card);
            if let Some((key, value)) = split_pair(&text, &[':', '-', '=']) {
                insert_cleaned(out, &key, &value);
            }
        }

        if !out.is_empty() {
            break;
        }
    }
}

/// Pairs up explicit label/value children. Returns true when the card had
/// any, even if cleaning rejected them.
fn extract_card_children(card: ElementRef<'_>, out: &mut BTreeMap<String, String>) -> bool {
    for (label_str, value_str) in LABEL_VALUE_SELECTORS {
        let (Ok(label_sel), Ok(value_sel)) =
            (Selector::parse(label_str), Selector::parse(value_str))
        else {
            continue;
        };

        let labels: Vec<String> = card.select(&label_sel).map(element_text).collect();
        let values: Vec<String> = card.select(&value_sel).map(element_text).collect();
        if labels.is_empty() || values.is_empty() {
            continue;
        }

        for (label, value) in labels.iter().zip(values.iter()) {
            insert_cleaned(out, label, value);
        }
        return true;
    }
    false
}

// ── Free-text fallback ────────────────────────────────────────────────────────

fn extract_free_text(page: ElementRef<'_>, out: &mut BTreeMap<String, String>) {
    let Ok(text_sel) = Selector::parse("p, div, span, li") else {
        return;
    };

    for node in page.select(&text_sel) {
        if out.len() > ENOUGH_SPECS {
            break;
        }
        let text: String = node.text().collect();
        for line in text.lines() {
            let Some((key, value)) = split_pair(line.trim(), &[':']) else {
                continue;
            };
            if is_domain_key(&key) {
                insert_cleaned(out, &key, &value);
            }
        }
    }
}

fn is_domain_key(key: &str) -> bool {
    let key = key.to_lowercase();
    DOMAIN_KEYWORDS.iter().any(|kw| key.contains(kw))
}

// ── Pair splitting & cleaning ─────────────────────────────────────────────────

/// Split on the first occurrence of any separator, earliest position wins.
/// Both sides must be non-empty and within the loose collection bounds.
fn split_pair(text: &str, separators: &[char]) -> Option<(String, String)> {
    let pos = separators
        .iter()
        .filter_map(|&sep| text.find(sep))
        .min()?;

    let (left, right) = text.split_at(pos);
    let key = left.trim();
    // `pos` indexes a one-byte separator for ':'/'-'/'='.
    let value = right[1..].trim();

    if key.is_empty()
        || value.is_empty()
        || key.chars().count() >= RAW_KEY_LIMIT
        || value.chars().count() >= RAW_VALUE_LIMIT
    {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('\u{0600}'..='\u{06FF}').contains(&c)
        || c == '\u{200C}'
        || c == ' '
        || matches!(c, '.' | ',' | '/' | '(' | ')' | '%' | '-' | '+' | '×' | '"')
}

/// Final cleaning pass: allow-listed characters only, strict length bounds,
/// and a defensive filter against script fragments scraped as content.
fn insert_cleaned(out: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let key: String = key.chars().filter(|&c| allowed_char(c)).collect();
    let value: String = value.chars().filter(|&c| allowed_char(c)).collect();
    let key = key.split_whitespace().collect::<Vec<_>>().join(" ");
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");

    if key.is_empty()
        || value.is_empty()
        || key.chars().count() > MAX_KEY_LEN
        || value.chars().count() > MAX_VALUE_LEN
    {
        return;
    }

    let lowered = format!("{} {}", key, value).to_lowercase();
    if lowered.contains("script") || lowered.contains("function") {
        return;
    }

    out.entry(key).or_insert(value);
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Extract specs for one product element, widening to the whole page when
/// the element itself has none.
pub fn extract_specs<'a>(
    element: ElementRef<'a>,
    page: ElementRef<'a>,
) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();

    for pattern in SpecPattern::CASCADE {
        pattern.extract(element, &mut specs);
        if !specs.is_empty() {
            return specs;
        }
    }

    if element.id() != page.id() {
        for pattern in SpecPattern::CASCADE {
            pattern.extract(page, &mut specs);
            if !specs.is_empty() {
                return specs;
            }
        }
    }

    extract_free_text(page, &mut specs);
    specs
}

/// Whole-page extraction, for detail pages fetched separately.
pub fn extract_specs_from_page(doc: &Html) -> BTreeMap<String, String> {
    let root = doc.root_element();
    extract_specs(root, root)
}

/// Convenience wrapper for callers holding raw HTML.
pub fn extract_specs_from_html(html: &str) -> BTreeMap<String, String> {
    extract_specs_from_page(&Html::parse_document(html))
}
