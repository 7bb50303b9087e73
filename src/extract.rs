use anyhow::{Result, anyhow};
use scraper::{ElementRef, Selector};
use std::collections::HashSet;

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| anyhow!("invalid css selector {selector}: {err:?}"))
}

/// First text node that is a direct child of `el`.
pub fn own_text(el: ElementRef<'_>) -> Option<String> {
    el.children()
        .find_map(|node| node.value().as_text().map(|text| String::from(&**text)))
}

/// First direct text node of any element matched by `selector`.
pub fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).find_map(own_text)
}

pub fn first_attr(scope: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    scope
        .select(selector)
        .find_map(|el| el.value().attr(attr).map(ToString::to_string))
}

pub fn text_or(scope: ElementRef<'_>, selector: &Selector, default: &str) -> String {
    first_text(scope, selector).unwrap_or_else(|| default.to_string())
}

pub fn attr_or(scope: ElementRef<'_>, selector: &Selector, attr: &str, default: &str) -> String {
    first_attr(scope, selector, attr).unwrap_or_else(|| default.to_string())
}

/// Joins every non-blank descendant text node of the matched elements with a
/// single space. Nested matches contribute each text node once.
pub fn joined_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();

    for el in scope.select(selector) {
        for node in el.descendants() {
            if let Some(text) = node.value().as_text()
                && seen.insert(node.id())
                && !text.trim().is_empty()
            {
                parts.push(&**text);
            }
        }
    }

    parts.join(" ")
}
