//! Small helpers over `scraper` for null-tolerant field extraction.
//!
//! Every helper returns `Option` so a missing sub-element degrades the one
//! field it feeds, never the whole record.

use crate::normalize::non_empty;
use itertools::Itertools;
use scraper::{ElementRef, Selector};
use url::Url;

/// Compile a selector known at build time.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Visible text of an element with runs of whitespace collapsed.
pub fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text: String = element.text().collect();
    non_empty(&text.split_whitespace().join(" "))
}

/// Text of the `n`th descendant matching `sel`.
pub fn nth_text(element: ElementRef<'_>, sel: &Selector, n: usize) -> Option<String> {
    element.select(sel).nth(n).and_then(text_of)
}

/// Attribute `attr` of the `n`th descendant matching `sel`.
pub fn nth_attr(element: ElementRef<'_>, sel: &Selector, n: usize, attr: &str) -> Option<String> {
    element
        .select(sel)
        .nth(n)
        .and_then(|e| e.value().attr(attr))
        .and_then(non_empty)
}

/// Direct element children named `tag`, in document order.
pub fn child_elements<'a>(element: ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == tag)
        .collect()
}

/// Resolve `href` against the page it was found on.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}
