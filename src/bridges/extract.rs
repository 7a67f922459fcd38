//! Bridge line extraction from the distributor's HTML page.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{BridgeLine, TransportClass};

/// Markup the distributor uses for each bridge line.
static BRIDGE_LINE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("pre.bridge-line").expect("static bridge-line selector is valid")
});

/// Extract up to `limit` bridge lines for `class` from a listing page.
///
/// Looks for `<pre class="bridge-line">` elements first. If the page has none,
/// falls back to scanning the document text line by line for the transport's
/// signature (`obfs4` + `cert=`, `webtunnel` + `http`).
pub fn extract_bridge_lines(html: &str, class: TransportClass, limit: usize) -> Vec<BridgeLine> {
    let document = Html::parse_document(html);

    let tagged: Vec<BridgeLine> = document
        .select(&BRIDGE_LINE_SELECTOR)
        .filter_map(|element| BridgeLine::new(element.text().collect::<String>()))
        .take(limit)
        .collect();

    if !tagged.is_empty() {
        return tagged;
    }

    let text: String = document.root_element().text().collect();
    text.lines()
        .filter(|line| class.matches_signature(line))
        .filter_map(BridgeLine::new)
        .take(limit)
        .collect()
}
