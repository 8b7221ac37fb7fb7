//! Low-level HTML scanning helpers shared by [`crate::discover`] and
//! [`crate::extract`].
//!
//! The target site's markup is regular enough that regex scanning plus a
//! balanced-tag walk covers everything the extractor needs; no HTML tree
//! is ever built.

use regex::Regex;

/// Replaces tags with spaces and decodes the handful of entities the
/// target site actually emits. Callers normalize afterwards.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let tag_re = tag_re();
    let text = tag_re.replace_all(html, " ");
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#8204;", "\u{200C}")
}

fn tag_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

/// Group-1 capture of the first match of `pattern`, if any.
#[must_use]
pub fn first_capture(html: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_owned())
}

/// All group-1 captures of `pattern` over `html`, in document order.
#[must_use]
pub fn all_captures(html: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_owned()))
        .collect()
}

/// Values of `attr` across the whole document, in document order.
#[must_use]
pub fn attr_values(html: &str, attr: &str) -> Vec<String> {
    let pattern = Regex::new(&format!(
        r#"(?i){}\s*=\s*["']([^"']+)["']"#,
        regex::escape(attr)
    ))
    .expect("valid regex");
    all_captures(html, &pattern)
}

/// `(href, visible text)` of every anchor in document order.
#[must_use]
pub fn anchors(html: &str) -> Vec<(String, String)> {
    let pattern = anchor_re();
    pattern
        .captures_iter(html)
        .filter_map(|cap| {
            let href = cap.get(1)?.as_str().to_owned();
            let text = strip_tags(cap.get(2).map_or("", |m| m.as_str()));
            Some((href, text))
        })
        .collect()
}

fn anchor_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a[^>]*href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)
            .expect("valid regex")
    })
}

/// Extracts the bodies of every `<{tag} class="…{class_kw}…">` block,
/// walking nested same-name tags to the balanced close instead of
/// stopping at the first `</{tag}>`. Unclosed blocks run to end of input.
#[must_use]
pub fn class_blocks<'a>(html: &'a str, tag: &str, class_kw: &str) -> Vec<&'a str> {
    let open_re = Regex::new(&format!(
        r#"(?i)<{tag}\b[^>]*class\s*=\s*["'][^"']*{kw}[^"']*["'][^>]*>"#,
        tag = regex::escape(tag),
        kw = regex::escape(class_kw)
    ))
    .expect("valid regex");

    let open_marker = format!("<{tag}");
    let close_marker = format!("</{tag}");

    let mut blocks = Vec::new();
    for m in open_re.find_iter(html) {
        let body_start = m.end();
        let end = balanced_end(&html[body_start..], &open_marker, &close_marker)
            .map_or(html.len(), |rel| body_start + rel);
        blocks.push(&html[body_start..end]);
    }
    blocks
}

/// Byte offset (into `rest`) of the close tag balancing an already-open
/// element, or `None` when the input ends first.
fn balanced_end(rest: &str, open_marker: &str, close_marker: &str) -> Option<usize> {
    let lower = rest.to_lowercase();
    let mut depth = 1usize;
    let mut pos = 0usize;

    loop {
        let next_open = lower[pos..].find(open_marker.to_lowercase().as_str());
        let next_close = lower[pos..].find(close_marker.to_lowercase().as_str());
        match (next_open, next_close) {
            (_, None) => return None,
            (Some(open_at), Some(close_at)) if open_at < close_at => {
                depth += 1;
                pos += open_at + open_marker.len();
            }
            (_, Some(close_at)) => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos + close_at);
                }
                pos += close_at + close_marker.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tags_flattens_markup_to_text() {
        let html = "<p>دکتر <b>رضا</b>&nbsp;کریمی</p>";
        assert_eq!(strip_tags(html).split_whitespace().count(), 3);
        assert!(strip_tags(html).contains("رضا"));
    }

    #[test]
    fn attr_values_collects_in_document_order() {
        let html = r#"<div data-phone="021-1"></div><span data-phone='021-2'></span>"#;
        assert_eq!(attr_values(html, "data-phone"), vec!["021-1", "021-2"]);
    }

    #[test]
    fn anchors_pair_href_with_visible_text() {
        let html = r#"<a href="tel:02112345678"><span>۰۲۱-۱۲۳۴۵۶۷۸</span></a>"#;
        let found = anchors(html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "tel:02112345678");
        assert!(found[0].1.contains("۰۲۱-۱۲۳۴۵۶۷۸"));
    }

    #[test]
    fn class_blocks_walk_past_nested_divs() {
        let html = r#"
            <div class="office card"><div class="addr">A1</div><div class="phone">P1</div></div>
            <div class="office card"><div class="addr">A2</div></div>
        "#;
        let blocks = class_blocks(html, "div", "office");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("A1") && blocks[0].contains("P1"));
        assert!(blocks[1].contains("A2"));
        assert!(!blocks[0].contains("A2"));
    }

    #[test]
    fn unclosed_block_runs_to_end_of_input() {
        let html = r#"<div class="office">A<div>B</div>"#;
        let blocks = class_blocks(html, "div", "office");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains('B'));
    }
}
