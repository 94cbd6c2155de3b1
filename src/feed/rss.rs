use crate::feed::entry::FeedEntry;
use crate::util::strip_control_chars;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;
use thiserror::Error;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const GENERATOR: &str = concat!("hnrss/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while rendering a feed document.
///
/// All of these indicate a bug in the pipeline rather than bad input:
/// upstream data is sanitized before it gets here.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The XML writer failed.
    #[error("XML write error: {0}")]
    Xml(#[from] std::io::Error),

    /// The writer produced bytes that are not UTF-8.
    #[error("Rendered feed contains invalid UTF-8")]
    InvalidUtf8,

    /// An entry reached the renderer with a required field empty.
    #[error("Entry {index} (item {item_id}) has an empty {field}")]
    InvalidEntry {
        index: usize,
        item_id: u64,
        field: &'static str,
    },
}

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    /// Website the channel describes.
    pub link: String,
    /// Public URL of the feed file itself, emitted as `<atom:link rel="self">`.
    pub self_link: Option<String>,
    pub language: String,
}

/// Formats an instant the way RSS 2.0 wants it (RFC 822), always in GMT.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hnrss::feed::format_rfc822;
///
/// let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
/// assert_eq!(format_rfc822(dt), "Mon, 01 Jan 2024 12:00:00 GMT");
/// ```
pub fn format_rfc822(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Renders an RSS 2.0 document.
///
/// Entries are written in the order given. Every user-sourced string is
/// stripped of characters XML cannot carry and escaped by the writer, so
/// titles like `Tom & Jerry <3` survive a parse round trip unchanged.
/// Output depends only on the arguments: identical inputs give identical
/// bytes.
///
/// # Errors
///
/// [`RenderError::InvalidEntry`] if an entry has an empty id, link or title.
pub fn render(
    meta: &FeedMeta,
    entries: &[FeedEntry],
    build_time: DateTime<Utc>,
) -> Result<String, RenderError> {
    for (index, entry) in entries.iter().enumerate() {
        check_entry(index, entry)?;
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    rss.push_attribute(("xmlns:dc", DC_NS));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &meta.title)?;
    write_text_element(&mut writer, "link", &meta.link)?;
    write_text_element(&mut writer, "description", &meta.description)?;
    write_text_element(&mut writer, "language", &meta.language)?;

    if let Some(ref self_link) = meta.self_link {
        let href = strip_control_chars(self_link);
        let mut atom_link = BytesStart::new("atom:link");
        atom_link.push_attribute(("href", &*href));
        atom_link.push_attribute(("rel", "self"));
        atom_link.push_attribute(("type", "application/rss+xml"));
        writer.write_event(Event::Empty(atom_link))?;
    }

    write_text_element(&mut writer, "lastBuildDate", &format_rfc822(build_time))?;
    write_text_element(&mut writer, "generator", GENERATOR)?;

    for entry in entries {
        write_item(&mut writer, entry)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|_| RenderError::InvalidUtf8)
}

fn check_entry(index: usize, entry: &FeedEntry) -> Result<(), RenderError> {
    let field = if entry.id.trim().is_empty() {
        "id"
    } else if entry.link.trim().is_empty() {
        "link"
    } else if entry.title.trim().is_empty() {
        "title"
    } else {
        return Ok(());
    };

    Err(RenderError::InvalidEntry {
        index,
        item_id: entry.item_id,
        field,
    })
}

fn write_item<W: Write>(writer: &mut Writer<W>, entry: &FeedEntry) -> Result<(), RenderError> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    write_text_element(writer, "title", &entry.title)?;
    write_text_element(writer, "link", &entry.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "true"));
    writer.write_event(Event::Start(guid))?;
    writer.write_event(Event::Text(BytesText::new(&strip_control_chars(&entry.id))))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    write_text_element(writer, "comments", &entry.comments_url)?;
    if let Some(ref author) = entry.author {
        write_text_element(writer, "dc:creator", author)?;
    }
    write_text_element(writer, "pubDate", &format_rfc822(entry.published))?;
    if let Some(ref summary) = entry.summary {
        write_text_element(writer, "description", summary)?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), RenderError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&strip_control_chars(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use quick_xml::Reader;

    fn meta() -> FeedMeta {
        FeedMeta {
            title: "Hacker News Top Stories".to_string(),
            description: "Top stories from Hacker News".to_string(),
            link: "https://news.ycombinator.com/".to_string(),
            self_link: Some("https://example.com/hn.xml".to_string()),
            language: "en-us".to_string(),
        }
    }

    fn build_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn entry(id: u64, title: &str) -> FeedEntry {
        let comments_url = format!("https://news.ycombinator.com/item?id={}", id);
        FeedEntry {
            id: comments_url.clone(),
            item_id: id,
            title: title.to_string(),
            link: format!("https://example.com/{}", id),
            comments_url,
            author: Some("pg".to_string()),
            published: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            summary: Some(format!("<p>Summary {}</p>", id)),
            score: Some(10),
            comment_count: Some(2),
        }
    }

    /// Collects the unescaped text of `<tag>` elements nested in `<item>`.
    fn item_texts(xml: &str, tag: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        let mut texts = Vec::new();
        let mut in_item = false;
        let mut in_tag = false;

        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"item" => in_item = true,
                Event::End(e) if e.name().as_ref() == b"item" => in_item = false,
                Event::Start(e) if e.name().as_ref() == tag.as_bytes() => in_tag = true,
                Event::End(e) if e.name().as_ref() == tag.as_bytes() => in_tag = false,
                Event::Text(t) if in_item && in_tag => {
                    texts.push(t.unescape().unwrap().into_owned())
                }
                Event::Eof => break,
                _ => {}
            }
        }

        texts
    }

    #[test]
    fn test_rendered_feed_parses_as_rss() {
        let entries = vec![entry(1, "First"), entry(2, "Second")];
        let xml = render(&meta(), &entries, build_time()).unwrap();

        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(feed.feed_type, feed_rs::model::FeedType::RSS2);
        assert_eq!(feed.title.unwrap().content, "Hacker News Top Stories");
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.id, "https://news.ycombinator.com/item?id=1");
        assert_eq!(first.title.as_ref().unwrap().content, "First");
        assert_eq!(first.links[0].href, "https://example.com/1");
        assert_eq!(
            first.published.unwrap().timestamp(),
            entries[0].published.timestamp()
        );
    }

    #[test]
    fn test_channel_metadata_and_structure() {
        let xml = render(&meta(), &[entry(7, "Seven")], build_time()).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(
            r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/elements/1.1/">"#
        ));
        assert!(xml.contains(
            r#"<atom:link href="https://example.com/hn.xml" rel="self" type="application/rss+xml"/>"#
        ));
        assert!(xml.contains("<lastBuildDate>Tue, 02 Jan 2024 03:04:05 GMT</lastBuildDate>"));
        assert!(xml.contains("<language>en-us</language>"));
        assert!(xml.contains(
            r#"<guid isPermaLink="true">https://news.ycombinator.com/item?id=7</guid>"#
        ));
        assert!(xml.contains("<dc:creator>pg</dc:creator>"));
        assert!(xml.contains("<comments>https://news.ycombinator.com/item?id=7</comments>"));
        assert!(xml.contains("<description>&lt;p&gt;Summary 7&lt;/p&gt;</description>"));
    }

    #[test]
    fn test_self_link_omitted_when_unset() {
        let mut meta = meta();
        meta.self_link = None;
        let xml = render(&meta, &[], build_time()).unwrap();
        assert!(!xml.contains("atom:link"));
    }

    #[test]
    fn test_optional_entry_fields_omitted() {
        let mut e = entry(3, "Three");
        e.author = None;
        e.summary = None;
        let xml = render(&meta(), &[e], build_time()).unwrap();
        assert!(!xml.contains("dc:creator"));
        assert!(item_texts(&xml, "description").is_empty());
    }

    #[test]
    fn test_empty_entries_render_valid_feed() {
        let xml = render(&meta(), &[], build_time()).unwrap();
        assert!(!xml.contains("<item>"));

        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn test_entry_order_preserved() {
        let entries = vec![entry(30, "c"), entry(10, "a"), entry(20, "b")];
        let xml = render(&meta(), &entries, build_time()).unwrap();
        assert_eq!(item_texts(&xml, "title"), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_special_characters_round_trip() {
        let title = r#"Tom & Jerry <3 "quotes" 'apostrophes' >_<"#;
        let mut e = entry(1, title);
        e.author = Some("a&b".to_string());
        let xml = render(&meta(), &[e], build_time()).unwrap();

        assert!(!xml.contains("Tom & Jerry"));
        assert!(xml.contains("Tom &amp; Jerry &lt;3"));
        assert_eq!(item_texts(&xml, "title"), vec![title]);
        assert_eq!(item_texts(&xml, "dc:creator"), vec!["a&b"]);
    }

    #[test]
    fn test_control_characters_stripped() {
        let xml = render(&meta(), &[entry(1, "bell\u{7}ring")], build_time()).unwrap();
        assert_eq!(item_texts(&xml, "title"), vec!["bellring"]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let entries = vec![entry(1, "One"), entry(2, "Two & more")];
        let a = render(&meta(), &entries, build_time()).unwrap();
        let b = render(&meta(), &entries, build_time()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_empty_required_field_is_render_error() {
        let mut bad = entry(5, "Five");
        bad.link = String::new();
        let err = render(&meta(), &[entry(1, "ok"), bad], build_time()).unwrap_err();
        match err {
            RenderError::InvalidEntry {
                index,
                item_id,
                field,
            } => {
                assert_eq!(index, 1);
                assert_eq!(item_id, 5);
                assert_eq!(field, "link");
            }
            e => panic!("Expected InvalidEntry, got {:?}", e),
        }
    }

    #[test]
    fn test_format_rfc822_pads_day() {
        let dt = Utc.with_ymd_and_hms(2003, 6, 3, 9, 39, 21).unwrap();
        assert_eq!(format_rfc822(dt), "Tue, 03 Jun 2003 09:39:21 GMT");
    }

    proptest! {
        #[test]
        fn prop_titles_survive_round_trip(
            titles in proptest::collection::vec("\\PC{0,40}", 0..8)
        ) {
            let titles: Vec<String> = titles.into_iter().map(|t| format!("t{}", t)).collect();
            let entries: Vec<FeedEntry> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| entry(i as u64 + 1, t))
                .collect();

            let xml = render(&meta(), &entries, build_time()).unwrap();
            prop_assert_eq!(item_texts(&xml, "title"), titles);
        }
    }
}
