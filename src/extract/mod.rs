//! Record extraction from decoded dump blocks.
//!
//! A block is an arbitrary byte-range slice of a larger document: it has no
//! root element of its own, and the final block may carry the document's
//! dangling closing tag. [`extract_records`] strips that tag, wraps the text
//! in a synthetic root, and event-parses the pages inside, so extraction is
//! decoupled from block boundaries entirely.

pub mod category;
pub mod wikitext;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::config::ImagePolicy;
use crate::types::{IngestError, PageRecord};
use category::Category;

const DANGLING_ROOT_CLOSE: &str = "</mediawiki>";
const IMAGE_NAMESPACE: &str = "en";

#[derive(Debug, Default)]
struct PartialPage {
    title: Option<String>,
    id: Option<String>,
    text: Option<String>,
}

/// Parses one decoded block into classified records.
///
/// Pages missing id, title, or body are dropped silently, as are pages
/// without an infobox-like template or with an unrecognized category token:
/// dumps routinely contain stubs, and this filter is where almost all of the
/// volume goes. Markup errors are reported as a corrupt block tagged with
/// `offset` so the caller's skip policy can apply. The extractor keeps no
/// state between blocks.
pub fn extract_records(
    block_text: &str,
    offset: u64,
    policy: ImagePolicy,
) -> Result<Vec<PageRecord>, IngestError> {
    let trimmed = block_text.trim_end();
    let body = trimmed.strip_suffix(DANGLING_ROOT_CLOSE).unwrap_or(trimmed);
    let wrapped = format!("<pages>\n{body}\n</pages>");

    let mut reader = Reader::from_str(&wrapped);
    let mut records = Vec::new();
    let mut pages_seen = 0usize;
    let mut page: Option<PartialPage> = None;
    let mut capture: Option<&'static str> = None;
    let mut buf = String::new();

    loop {
        match reader
            .read_event()
            .map_err(|err| corrupt_block(offset, err))?
        {
            Event::Start(start) => match start.name().as_ref() {
                b"page" => {
                    page = Some(PartialPage::default());
                }
                b"title" if page.is_some() => {
                    capture = Some("title");
                    buf.clear();
                }
                b"id" if page.is_some() => {
                    capture = Some("id");
                    buf.clear();
                }
                b"text" if page.is_some() => {
                    capture = Some("text");
                    buf.clear();
                }
                _ => {}
            },
            Event::Text(text) => {
                if capture.is_some() {
                    buf.push_str(&text.unescape().map_err(|err| corrupt_block(offset, err))?);
                }
            }
            Event::CData(cdata) => {
                if capture.is_some() {
                    buf.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::End(end) => {
                let Some(current) = page.as_mut() else {
                    continue;
                };
                match end.name().as_ref() {
                    // The page id comes first; revision and contributor ids
                    // must not overwrite it.
                    b"id" => {
                        if current.id.is_none() {
                            current.id = Some(buf.clone());
                        }
                        capture = None;
                    }
                    b"title" => {
                        if current.title.is_none() {
                            current.title = Some(buf.clone());
                        }
                        capture = None;
                    }
                    b"text" => {
                        if current.text.is_none() {
                            current.text = Some(buf.clone());
                        }
                        capture = None;
                    }
                    b"page" => {
                        pages_seen += 1;
                        if let Some(record) = finalize_page(page.take().unwrap_or_default(), policy)
                        {
                            records.push(record);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(
        offset,
        pages_seen,
        records = records.len(),
        "block extracted"
    );
    Ok(records)
}

fn corrupt_block(offset: u64, err: impl std::fmt::Display) -> IngestError {
    IngestError::CorruptBlock {
        offset,
        reason: format!("markup parse: {err}"),
    }
}

fn finalize_page(page: PartialPage, policy: ImagePolicy) -> Option<PageRecord> {
    let title = page.title.filter(|t| !t.is_empty())?;
    let id = page.id?.trim().parse::<u64>().ok()?;
    let text = page.text.filter(|t| !t.is_empty())?;

    let infobox = wikitext::find_infobox(&text)?;
    let category = Category::from_token(&infobox.category_token)?;
    let image = infobox
        .image
        .as_deref()
        .map(|name| wikitext::image_url(name, IMAGE_NAMESPACE));
    if image.is_none() && policy == ImagePolicy::Require {
        return None;
    }

    let body = wikitext::strip_markup(&text);

    Some(PageRecord {
        id,
        title,
        body,
        category,
        image,
    })
}
