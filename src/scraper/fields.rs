//! Per-candidate field assembly: name, price, image, link, specs.
//!
//! Every field comes out of an ordered selector cascade with early exit on
//! the first usable match. Nothing here fails loudly; a candidate that
//! cannot produce a plausible name and price is simply not a product.

use scraper::{ElementRef, Selector};
use url::Url;

use crate::models::{MAX_NAME_LEN, ScrapedProduct};
use crate::scraper::price::normalize_price;
use crate::scraper::specs;

/// Hosts whose listing cards carry no specs; the spec sheet lives on the
/// product detail page and needs a secondary fetch.
const DETAIL_SPEC_HOSTS: [&str; 1] = ["mobile140"];

/// A scraped product plus crawl-time bookkeeping the scanner needs.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub product: ScrapedProduct,
    /// Specs should be re-extracted from the product's own detail page.
    pub wants_detail_specs: bool,
}

// ── Cascades ──────────────────────────────────────────────────────────────────

const NAME_SELECTORS: [&str; 13] = [
    "h1",
    "h2",
    "h3",
    "h4",
    ".product-title",
    ".product-name",
    ".title",
    ".name",
    "[class*=\"title\"]",
    "[class*=\"name\"]",
    "a[title]",
    ".product-card-name",
    ".item-title",
];

const PRICE_SELECTORS: [&str; 12] = [
    ".price",
    ".cost",
    ".amount",
    "[data-price]",
    ".price-current",
    ".current-price",
    ".final-price",
    "[class*=\"price\"]",
    ".product-price",
    ".item-price",
    "span[class*=\"price\"]",
    "div[class*=\"price\"]",
];

/// Struck-through pre-discount price markup.
const ORIGINAL_PRICE_SELECTORS: [&str; 5] = [
    "del",
    "s",
    ".old-price",
    ".price-old",
    "[class*=\"old-price\"]",
];

const IMAGE_SELECTORS: [&str; 4] = ["img", ".image img", ".product-image img", ".item-image img"];
const IMAGE_SRC_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy"];

const LINK_SELECTORS: [&str; 3] = ["a", ".product-link", ".item-link"];

// ── Field extraction ──────────────────────────────────────────────────────────

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| {
        c.is_ascii_digit() || ('۰'..='۹').contains(&c) || ('٠'..='٩').contains(&c)
    })
}

/// Name cascade: prefer the first match longer than 10 characters, but hang
/// on to the first non-empty shorter one — products with short legitimate
/// names still have to pass the >5 acceptance floor later.
fn extract_name(el: ElementRef<'_>) -> Option<String> {
    let mut short_fallback: Option<String> = None;

    for sel_str in NAME_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let Some(hit) = el.select(&sel).next() else {
            continue;
        };

        let mut name = text_of(hit);
        if name.is_empty() {
            name = hit.attr("title").unwrap_or_default().trim().to_string();
        }
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > 10 {
            return Some(name);
        }
        short_fallback.get_or_insert(name);
    }

    // Some cards keep the full name only on the anchor's title attribute.
    if let Ok(a_sel) = Selector::parse("a") {
        if let Some(title) = el
            .select(&a_sel)
            .next()
            .and_then(|a| a.attr("title"))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
        {
            return Some(title);
        }
    }

    short_fallback
}

fn extract_price_text(el: ElementRef<'_>) -> Option<String> {
    for sel_str in PRICE_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(hit) = el.select(&sel).next() {
            let text = text_of(hit);
            if has_digit(&text) {
                return Some(text);
            }
        }
    }
    None
}

fn extract_original_price(el: ElementRef<'_>) -> Option<u64> {
    for sel_str in ORIGINAL_PRICE_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(hit) = el.select(&sel).next() {
            let price = normalize_price(&text_of(hit));
            if price > crate::models::MIN_PLAUSIBLE_PRICE {
                return Some(price);
            }
        }
    }
    None
}

fn extract_image(el: ElementRef<'_>, base: &Url) -> Option<String> {
    for sel_str in IMAGE_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let Some(img) = el.select(&sel).next() else {
            continue;
        };
        for attr in IMAGE_SRC_ATTRS {
            if let Some(src) = img.attr(attr).map(str::trim).filter(|s| !s.is_empty()) {
                return base.join(src).ok().map(|u| u.to_string());
            }
        }
    }
    None
}

fn extract_link(el: ElementRef<'_>, base: &Url) -> Option<String> {
    for sel_str in LINK_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(href) = el
            .select(&sel)
            .next()
            .and_then(|a| a.attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
        {
            return base.join(href).ok().map(|u| u.to_string());
        }
    }
    None
}

fn wants_detail_specs(product_url: &str) -> bool {
    Url::parse(product_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| DETAIL_SPEC_HOSTS.iter().any(|h| host.contains(h)))
}

// ── Assembly ──────────────────────────────────────────────────────────────────

/// Assemble one candidate container into a product draft.
///
/// `page` is the document root, used when the element itself carries no
/// specs. Returns `None` for anything that fails the name/price acceptance
/// rule — those are noise matches from a broad container selector, not
/// errors worth reporting.
pub fn extract_product<'a>(
    el: ElementRef<'a>,
    page: ElementRef<'a>,
    base: &Url,
) -> Option<ProductDraft> {
    let name = extract_name(el)?;
    let name: String = name.chars().take(MAX_NAME_LEN).collect();

    let price = extract_price_text(el)
        .map(|t| normalize_price(&t))
        .unwrap_or(0);

    let url = extract_link(el, base).unwrap_or_else(|| base.to_string());

    let product = ScrapedProduct {
        name,
        price,
        original_price: extract_original_price(el),
        image: extract_image(el, base),
        url: url.clone(),
        specs: specs::extract_specs(el, page),
    };

    if !product.is_plausible() {
        return None;
    }

    Some(ProductDraft {
        wants_detail_specs: wants_detail_specs(&url),
        product,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn draft_from(html: &str) -> Option<ProductDraft> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(".product-item").unwrap();
        let el = doc.select(&sel).next().expect("container");
        let base = Url::parse("https://shop.example.ir/phones").unwrap();
        extract_product(el, doc.root_element(), &base)
    }

    #[test]
    fn full_card_extracts_all_fields() {
        let draft = draft_from(
            r#"<div class="product-item">
                <h3>Apple iPhone 15 128GB</h3>
                <span class="price">۳۲٬۵۰۰٬۰۰۰ تومان</span>
                <del>۳۵٬۰۰۰٬۰۰۰ تومان</del>
                <img src="/img/iphone15.jpg">
                <a href="/product/iphone-15">مشاهده</a>
            </div>"#,
        )
        .expect("accepted");

        let p = &draft.product;
        assert_eq!(p.name, "Apple iPhone 15 128GB");
        assert_eq!(p.price, 32_500_000);
        assert_eq!(p.original_price, Some(35_000_000));
        assert_eq!(p.image.as_deref(), Some("https://shop.example.ir/img/iphone15.jpg"));
        assert_eq!(p.url, "https://shop.example.ir/product/iphone-15");
        assert!(!draft.wants_detail_specs);
    }

    #[test]
    fn anchor_title_fallback_for_name() {
        let draft = draft_from(
            r#"<div class="product-item">
                <a href="/p/1" title="گوشی موبایل سامسونگ Galaxy S24"></a>
                <span class="price">28,500,000 تومان</span>
            </div>"#,
        )
        .expect("accepted");
        assert_eq!(draft.product.name, "گوشی موبایل سامسونگ Galaxy S24");
    }

    #[test]
    fn lazy_loaded_image_attribute() {
        let draft = draft_from(
            r#"<div class="product-item">
                <h3>Samsung Galaxy S24 Ultra</h3>
                <span class="price">45,000,000</span>
                <img data-src="//cdn.example.ir/s24.jpg">
            </div>"#,
        )
        .expect("accepted");
        assert_eq!(draft.product.image.as_deref(), Some("https://cdn.example.ir/s24.jpg"));
    }

    #[test]
    fn missing_link_defaults_to_page_url() {
        let draft = draft_from(
            r#"<div class="product-item">
                <h3>Xiaomi Redmi Note 13 Pro</h3>
                <span class="price">12,000,000</span>
            </div>"#,
        )
        .expect("accepted");
        assert_eq!(draft.product.url, "https://shop.example.ir/phones");
    }

    #[test]
    fn unresolved_price_drops_candidate() {
        assert!(
            draft_from(
                r#"<div class="product-item">
                    <h3>Apple iPhone 15 128GB</h3>
                    <span class="price">ناموجود</span>
                </div>"#,
            )
            .is_none()
        );
    }

    #[test]
    fn short_name_drops_candidate() {
        assert!(
            draft_from(
                r#"<div class="product-item">
                    <h3>abc</h3>
                    <span class="price">5,000,000</span>
                </div>"#,
            )
            .is_none()
        );
    }

    #[test]
    fn detail_spec_host_flagged() {
        let draft = draft_from(
            r#"<div class="product-item">
                <h3>Nokia 3310 Classic Edition</h3>
                <span class="price">2,500,000</span>
                <a href="https://mobile140.com/product/nokia-3310"></a>
            </div>"#,
        )
        .expect("accepted");
        assert!(draft.wants_detail_specs);
    }

    #[test]
    fn overlong_name_truncated() {
        let long = "گوشی ".repeat(60);
        let html = format!(
            r#"<div class="product-item"><h3>{}</h3><span class="price">5,000,000</span></div>"#,
            long
        );
        let draft = draft_from(&html).expect("accepted");
        assert_eq!(draft.product.name.chars().count(), MAX_NAME_LEN);
    }
}
