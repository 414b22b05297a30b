use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted in a feed document.
const MAX_XML_DEPTH: usize = 64;

/// Errors produced while turning a feed body into episode records.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not well-formed XML.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// Well-formed XML, but no `<rss><channel>` to read items from.
    #[error("Feed has no <channel> element under <rss>")]
    MissingChannel,

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// One `<item>` exactly as the feed supplied it.
///
/// Fields stay optional here; deciding what is required belongs to the enricher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEpisode {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    /// Feed-supplied `pubDate`, unparsed.
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Description,
    Link,
    PubDate,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }

    fn slot(self, episode: &mut RawEpisode) -> &mut Option<String> {
        match self {
            Field::Title => &mut episode.title,
            Field::Description => &mut episode.description,
            Field::Link => &mut episode.link,
            Field::PubDate => &mut episode.pub_date,
        }
    }
}

/// Parses an RSS 2.0 document and returns its items in document order.
///
/// Only `rss > channel > item` children named `title`, `description`, `link`
/// and `pubDate` are read; prefixed elements such as `itunes:title` are
/// ignored. Text and CDATA content are both accepted and trimmed. When an
/// item repeats a field, the first occurrence wins.
///
/// A channel without items yields an empty vector.
///
/// # Errors
///
/// - [`ParseError::Xml`] for malformed or truncated XML
/// - [`ParseError::MissingChannel`] when there is no `<rss><channel>`
/// - [`ParseError::MaxDepthExceeded`] for pathologically nested documents
pub fn parse_episodes(bytes: &[u8]) -> Result<Vec<RawEpisode>, ParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations, only the
    // five XML builtins, so feeds cannot trigger XXE.
    // With the `encoding` feature the reader switches decoders when the XML
    // declaration names a non-UTF-8 charset. Field text is trimmed once, when
    // its element closes, so whitespace between Text and CDATA pieces survives.
    let mut reader = Reader::from_reader(bytes);

    let mut episodes = Vec::new();
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut saw_channel = false;

    let mut current: Option<RawEpisode> = None;
    // Field being captured, the depth its element opened at, and its text so far
    let mut capture: Option<(Field, usize, String)> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| ParseError::Xml {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if path.len() >= MAX_XML_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_XML_DEPTH));
                }

                if is_channel(&path, &name) {
                    saw_channel = true;
                } else if is_item(&path, &name) {
                    current = Some(RawEpisode::default());
                } else if current.is_some() && capture.is_none() && path.len() == 3 {
                    if let Some(field) = Field::from_name(&name) {
                        capture = Some((field, path.len(), String::new()));
                    }
                }
                path.push(name);
            }
            Event::Empty(e) => {
                handle_empty(&e, &path, &mut current, &mut saw_channel, &mut episodes);
            }
            Event::Text(e) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    let unescaped = e.unescape().map_err(|err| ParseError::Xml {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    let decoded = reader.decoder().decode(&e).map_err(|err| ParseError::Xml {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    text.push_str(&decoded);
                }
            }
            Event::End(_) => {
                path.pop();

                let closes_capture =
                    matches!(&capture, Some((_, depth, _)) if *depth == path.len());
                if closes_capture {
                    if let (Some((field, _, text)), Some(episode)) =
                        (capture.take(), current.as_mut())
                    {
                        let slot = field.slot(episode);
                        if slot.is_none() {
                            *slot = Some(text.trim().to_string());
                        }
                    }
                }

                // Closing </item> brings us back to rss > channel
                if path.len() == 2 && current.is_some() {
                    episodes.extend(current.take());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !path.is_empty() {
        return Err(ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: "unexpected end of document".to_string(),
        });
    }

    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    Ok(episodes)
}

fn is_channel(path: &[Vec<u8>], name: &[u8]) -> bool {
    name == b"channel" && path.len() == 1 && path[0] == b"rss"
}

fn is_item(path: &[Vec<u8>], name: &[u8]) -> bool {
    name == b"item" && path.len() == 2 && path[1] == b"channel"
}

/// Self-closing elements: `<channel/>`, `<item/>` and `<description/>` carry
/// no text but still count.
fn handle_empty(
    e: &BytesStart<'_>,
    path: &[Vec<u8>],
    current: &mut Option<RawEpisode>,
    saw_channel: &mut bool,
    episodes: &mut Vec<RawEpisode>,
) {
    let name = e.name();
    let name = name.as_ref();

    if is_channel(path, name) {
        *saw_channel = true;
    } else if is_item(path, name) {
        episodes.push(RawEpisode::default());
    } else if path.len() == 3 {
        if let (Some(field), Some(episode)) = (Field::from_name(name), current.as_mut()) {
            let slot = field.slot(episode);
            if slot.is_none() {
                *slot = Some(String::new());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Marketplace</title>
    <link>https://www.marketplace.org</link>
    <item>
      <title>Ep 2</title>
      <itunes:title>Episode two, long form</itunes:title>
      <description><![CDATA[<p>Second &amp; newest</p>]]></description>
      <link>https://example.com/feed/ep-2</link>
      <pubDate>Tue, 13 Aug 2024 22:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/ep-2.mp3" type="audio/mpeg" length="1"/>
    </item>
    <item>
      <title>Ep 1 &amp; friends</title>
      <description>desc text</description>
      <link>https://example.com/feed/ep-1</link>
      <pubDate>Mon, 12 Aug 2024 22:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parses_items_in_feed_order() {
        let episodes = parse_episodes(TWO_ITEMS.as_bytes()).unwrap();
        assert_eq!(
            episodes,
            vec![
                RawEpisode {
                    title: Some("Ep 2".into()),
                    description: Some("<p>Second &amp; newest</p>".into()),
                    link: Some("https://example.com/feed/ep-2".into()),
                    pub_date: Some("Tue, 13 Aug 2024 22:00:00 +0000".into()),
                },
                RawEpisode {
                    title: Some("Ep 1 & friends".into()),
                    description: Some("desc text".into()),
                    link: Some("https://example.com/feed/ep-1".into()),
                    pub_date: Some("Mon, 12 Aug 2024 22:00:00 +0000".into()),
                },
            ]
        );
    }

    #[test]
    fn test_mixed_text_and_cdata_keep_inner_whitespace() {
        let xml = r#"<rss><channel><item>
            <description>
                Hello <![CDATA[big]]> world
            </description>
        </item></channel></rss>"#;
        let episodes = parse_episodes(xml.as_bytes()).unwrap();
        assert_eq!(episodes[0].description.as_deref(), Some("Hello big world"));
    }

    #[test]
    fn test_latin1_declared_feed_is_decoded() {
        let xml: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
<rss version=\"2.0\"><channel><item>\
<title>Caf\xE9</title><description>Cr\xE8me br\xFBl\xE9e</description>\
<link>https://example.com/feed/cafe</link>\
</item></channel></rss>";
        let episodes = parse_episodes(xml).unwrap();
        assert_eq!(episodes[0].title.as_deref(), Some("Caf\u{e9}"));
        assert_eq!(episodes[0].description.as_deref(), Some("Cr\u{e8}me br\u{fb}l\u{e9}e"));
        assert_eq!(episodes[0].link.as_deref(), Some("https://example.com/feed/cafe"));
    }

    #[test]
    fn test_channel_level_fields_not_mistaken_for_items() {
        let xml = r#"<rss><channel><title>Show</title><link>https://show</link></channel></rss>"#;
        assert!(parse_episodes(xml.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_empty_channel_yields_no_episodes() {
        let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        assert!(parse_episodes(xml.as_bytes()).unwrap().is_empty());

        let xml = r#"<rss version="2.0"><channel/></rss>"#;
        assert!(parse_episodes(xml.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_fields_left_as_none() {
        let xml = r#"<rss><channel><item><title>Only a title</title></item></channel></rss>"#;
        let episodes = parse_episodes(xml.as_bytes()).unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title.as_deref(), Some("Only a title"));
        assert_eq!(episodes[0].description, None);
        assert_eq!(episodes[0].link, None);
    }

    #[test]
    fn test_self_closing_description_is_empty_string() {
        let xml = r#"<rss><channel><item><title>T</title><description/><link>https://x/a</link></item></channel></rss>"#;
        let episodes = parse_episodes(xml.as_bytes()).unwrap();
        assert_eq!(episodes[0].description.as_deref(), Some(""));
    }

    #[test]
    fn test_first_occurrence_of_repeated_field_wins() {
        let xml = r#"<rss><channel><item><link>https://x/first</link><link>https://x/second</link></item></channel></rss>"#;
        let episodes = parse_episodes(xml.as_bytes()).unwrap();
        assert_eq!(episodes[0].link.as_deref(), Some("https://x/first"));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let err = parse_episodes(b"<not valid xml").unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }), "got {:?}", err);
    }

    #[test]
    fn test_truncated_document_is_error() {
        let xml = r#"<rss><channel><item><title>Cut off"#;
        assert!(matches!(
            parse_episodes(xml.as_bytes()),
            Err(ParseError::Xml { .. })
        ));
    }

    #[test]
    fn test_document_without_channel_is_error() {
        let xml = r#"<html><body>Service unavailable</body></html>"#;
        assert!(matches!(
            parse_episodes(xml.as_bytes()),
            Err(ParseError::MissingChannel)
        ));
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut xml = String::from("<rss><channel><item>");
        for _ in 0..MAX_XML_DEPTH {
            xml.push_str("<x>");
        }
        for _ in 0..MAX_XML_DEPTH {
            xml.push_str("</x>");
        }
        xml.push_str("</item></channel></rss>");
        assert!(matches!(
            parse_episodes(xml.as_bytes()),
            Err(ParseError::MaxDepthExceeded(MAX_XML_DEPTH))
        ));
    }
}
