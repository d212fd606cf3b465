//! Wiki markup helpers: infobox location, markup stripping, image URLs.

use std::sync::OnceLock;

use md5::{Digest, Md5};
use regex::Regex;

static RE_COMMENT: OnceLock<Regex> = OnceLock::new();
static RE_REF: OnceLock<Regex> = OnceLock::new();
static RE_TEMPLATE: OnceLock<Regex> = OnceLock::new();
static RE_TABLE: OnceLock<Regex> = OnceLock::new();
static RE_NAMESPACE_LINK: OnceLock<Regex> = OnceLock::new();
static RE_PIPED_LINK: OnceLock<Regex> = OnceLock::new();
static RE_PLAIN_LINK: OnceLock<Regex> = OnceLock::new();
static RE_EXTERNAL_LINK: OnceLock<Regex> = OnceLock::new();
static RE_EXTERNAL_BARE: OnceLock<Regex> = OnceLock::new();
static RE_QUOTES: OnceLock<Regex> = OnceLock::new();
static RE_HEADING: OnceLock<Regex> = OnceLock::new();
static RE_HTML_TAG: OnceLock<Regex> = OnceLock::new();
static RE_BLANK_LINES: OnceLock<Regex> = OnceLock::new();

/// The first infobox-like template found in a page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infobox {
    /// Remainder of the template name after the "infobox" prefix,
    /// lower-cased and trimmed. Empty for a bare `{{Infobox}}`.
    pub category_token: String,
    /// Raw `image` parameter value, if the template carries one.
    pub image: Option<String>,
}

/// Scans `text` for the first template whose name begins with the
/// case-insensitive token "infobox" and pulls out the category token and
/// image parameter. Templates with unbalanced braces are ignored.
pub fn find_infobox(text: &str) -> Option<Infobox> {
    for (start, _) in text.match_indices("{{") {
        let inner_start = start + 2;
        let candidate = text[inner_start..].trim_start();
        if !candidate
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("infobox"))
        {
            continue;
        }
        let Some(end) = template_end(text, start) else {
            continue;
        };
        return Some(parse_infobox(&text[inner_start..end]));
    }
    None
}

/// Finds the index just past the content of the template opening at
/// `start` (which must point at `{{`), i.e. the position of its closing
/// braces. Returns `None` when the braces never balance.
fn template_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                depth += 1;
                i += 2;
            }
            (b'}', b'}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

fn parse_infobox(content: &str) -> Infobox {
    let mut segments = split_top_level(content);
    let name = segments.remove(0);
    let name = name.trim();

    // The scan guarantees the prefix; byte slicing is safe because
    // "infobox" is ASCII.
    let category_token = name[7..].trim().to_lowercase();

    let mut image = None;
    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("image") {
            let value = value.trim();
            if !value.is_empty() {
                image = Some(value.to_string());
            }
            break;
        }
    }

    Infobox {
        category_token,
        image,
    }
}

/// Splits template content on `|` at the top level, ignoring pipes nested
/// inside `{{ }}` or `[[ ]]`.
fn split_top_level(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut seg_start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if i + 1 < bytes.len() {
            match (bytes[i], bytes[i + 1]) {
                (b'{', b'{') | (b'[', b'[') => {
                    depth += 1;
                    i += 2;
                    continue;
                }
                (b'}', b'}') | (b']', b']') => {
                    depth = depth.saturating_sub(1);
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        if bytes[i] == b'|' && depth == 0 {
            segments.push(&content[seg_start..i]);
            seg_start = i + 1;
        }
        i += 1;
    }
    segments.push(&content[seg_start..]);
    segments
}

/// Strips wiki markup from a page body, leaving plain text.
///
/// Templates and tables are removed innermost-first until the text is
/// stable, links collapse to their display text, and heading fences drop
/// while the heading text itself is kept.
pub fn strip_markup(text: &str) -> String {
    let mut out = RE_COMMENT
        .get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
        .replace_all(text, "")
        .into_owned();

    out = RE_REF
        .get_or_init(|| Regex::new(r"(?s)<ref[^>/]*/>|<ref[^>]*>.*?</ref>").unwrap())
        .replace_all(&out, "")
        .into_owned();

    out = strip_until_stable(out, || {
        RE_TEMPLATE.get_or_init(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap())
    });
    out = strip_until_stable(out, || {
        RE_TABLE.get_or_init(|| Regex::new(r"(?s)\{\|[^{}]*?\|\}").unwrap())
    });

    // Innermost links resolve first so file captions containing links can
    // be removed wholesale on a later pass.
    loop {
        let ns = RE_NAMESPACE_LINK
            .get_or_init(|| {
                Regex::new(r"(?i)\[\[\s*(?:category|file|image)\s*:[^\[\]]*\]\]").unwrap()
            })
            .replace_all(&out, "");
        let piped = RE_PIPED_LINK
            .get_or_init(|| Regex::new(r"\[\[[^\[\]|]*\|([^\[\]]*)\]\]").unwrap())
            .replace_all(&ns, "$1");
        let plain = RE_PLAIN_LINK
            .get_or_init(|| Regex::new(r"\[\[([^\[\]|]*)\]\]").unwrap())
            .replace_all(&piped, "$1");
        if plain == out {
            break;
        }
        out = plain.into_owned();
    }

    out = RE_EXTERNAL_LINK
        .get_or_init(|| Regex::new(r"\[https?://[^\s\]]+\s+([^\]]*)\]").unwrap())
        .replace_all(&out, "$1")
        .into_owned();
    out = RE_EXTERNAL_BARE
        .get_or_init(|| Regex::new(r"\[https?://[^\]]*\]").unwrap())
        .replace_all(&out, "")
        .into_owned();

    out = RE_QUOTES
        .get_or_init(|| Regex::new(r"'{2,}").unwrap())
        .replace_all(&out, "")
        .into_owned();
    out = RE_HEADING
        .get_or_init(|| Regex::new(r"(?m)^\s*=+\s*(.*?)\s*=+\s*$").unwrap())
        .replace_all(&out, "$1")
        .into_owned();
    out = RE_HTML_TAG
        .get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
        .replace_all(&out, "")
        .into_owned();

    out = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");

    out = RE_BLANK_LINES
        .get_or_init(|| Regex::new(r"\n{3,}").unwrap())
        .replace_all(&out, "\n\n")
        .into_owned();
    out.trim().to_string()
}

fn strip_until_stable(mut text: String, re: impl Fn() -> &'static Regex) -> String {
    loop {
        let replaced = re().replace_all(&text, "");
        if replaced == text {
            return text;
        }
        text = replaced.into_owned();
    }
}

/// Builds the upload-host URL for an image file name.
///
/// The hosting layout shards files by the first hex digits of the MD5 of
/// the normalized name: `/{h[..1]}/{h[..2]}/{name}`.
pub fn image_url(image: &str, namespace: &str) -> String {
    let image = normalize_image_title(image);
    let digest = hex::encode(Md5::digest(image.as_bytes()));
    format!(
        "https://upload.wikimedia.org/wikipedia/{namespace}/{}/{}/{image}",
        &digest[..1],
        &digest[..2]
    )
}

/// Normalizes a page or image title the way the dump host does before
/// hashing.
pub fn normalize_image_title(title: &str) -> String {
    title
        .replace('_', " ")
        .replace('&', "&amp;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_infobox_and_category_token() {
        let text = "{{Short description|A novel}}\n{{Infobox book\n| name = Dune\n| image = Dune.jpg\n| author = Frank Herbert\n}}\nDune is a novel.";
        let infobox = find_infobox(text).unwrap();
        assert_eq!(infobox.category_token, "book");
        assert_eq!(infobox.image.as_deref(), Some("Dune.jpg"));
    }

    #[test]
    fn infobox_match_is_case_insensitive() {
        let infobox = find_infobox("{{infobox Television\n| image = x.png\n}}").unwrap();
        assert_eq!(infobox.category_token, "television");
    }

    #[test]
    fn nested_templates_inside_infobox_do_not_end_the_scan() {
        let text = "{{Infobox film\n| image = F.jpg\n| budget = {{US$|40 million}}\n| caption = [[a|b]]\n}}";
        let infobox = find_infobox(text).unwrap();
        assert_eq!(infobox.category_token, "film");
        assert_eq!(infobox.image.as_deref(), Some("F.jpg"));
    }

    #[test]
    fn missing_image_parameter_yields_none() {
        let infobox = find_infobox("{{Infobox song\n| writer = Someone\n}}").unwrap();
        assert_eq!(infobox.category_token, "song");
        assert_eq!(infobox.image, None);
    }

    #[test]
    fn empty_image_parameter_yields_none() {
        let infobox = find_infobox("{{Infobox song\n| image = \n| writer = X\n}}").unwrap();
        assert_eq!(infobox.image, None);
    }

    #[test]
    fn no_infobox_returns_none() {
        assert_eq!(find_infobox("Plain text with {{citation needed}} only."), None);
        assert_eq!(find_infobox("No templates at all."), None);
    }

    #[test]
    fn unbalanced_infobox_is_ignored() {
        assert_eq!(find_infobox("{{Infobox book\n| name = Broken"), None);
    }

    #[test]
    fn strip_markup_removes_syntax_and_keeps_text() {
        let text = "{{Infobox book|image=X.jpg}}\n'''Dune''' is a [[science fiction]] novel by [[Frank Herbert|Herbert]].<ref>cite</ref>\n\n== Plot ==\nThe story covers {{circa|10,000}} years.\n[[Category:1965 novels]]";
        let plain = strip_markup(text);
        assert!(plain.starts_with("Dune is a science fiction novel by Herbert."));
        assert!(plain.contains("Plot"));
        assert!(plain.contains("The story covers  years."));
        for marker in ["{{", "}}", "[[", "]]", "'''", "==", "<ref"] {
            assert!(!plain.contains(marker), "leftover marker {marker} in {plain:?}");
        }
    }

    #[test]
    fn strip_markup_handles_nested_templates() {
        let plain = strip_markup("Before {{outer|{{inner|x}}|y}} after");
        assert_eq!(plain, "Before  after");
    }

    #[test]
    fn strip_markup_resolves_external_links() {
        let plain = strip_markup("See [https://example.com the site] or [https://example.org].");
        assert_eq!(plain, "See the site or .");
    }

    #[test]
    fn image_url_follows_hash_sharding() {
        // MD5 of the empty string is d41d8cd98f00b204e9800998ecf8427e.
        assert_eq!(
            image_url("", "en"),
            "https://upload.wikimedia.org/wikipedia/en/d/d4/"
        );

        let url = image_url("Cover_art.jpg", "en");
        assert!(url.starts_with("https://upload.wikimedia.org/wikipedia/en/"));
        assert!(url.ends_with("/Cover art.jpg"));
        let shard: Vec<&str> = url
            .trim_start_matches("https://upload.wikimedia.org/wikipedia/en/")
            .split('/')
            .collect();
        assert_eq!(shard[0].len(), 1);
        assert_eq!(shard[1].len(), 2);
        assert!(shard[1].starts_with(shard[0]));
    }

    #[test]
    fn normalize_escapes_like_the_dump_host() {
        assert_eq!(
            normalize_image_title(r#"Tom_&_Jerry_"poster".png"#),
            "Tom &amp; Jerry &quot;poster&quot;.png"
        );
    }
}
