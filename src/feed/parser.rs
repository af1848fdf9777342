use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// XML syntax error or an unknown entity reference
    #[error("Malformed feed document: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Well-formed XML without a `<channel>` under the root element
    #[error("Document has no <channel> element")]
    MissingChannel,

    /// Document ended with elements still open
    #[error("Feed document is truncated")]
    UnexpectedEof,
}

/// A decoded RSS channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<Item>,
}

/// One `<item>` of a channel, in document order.
///
/// `pub_date` is kept as the raw string; it is normalized at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

impl Field {
    /// Only unprefixed names match; `atom:link`, `itunes:title` and
    /// `media:description` belong to other vocabularies.
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }
}

/// Text being collected for one field element
struct Capture {
    field: Field,
    in_item: bool,
    /// Path length while inside the field element
    depth: usize,
    text: String,
}

/// Decodes an RSS document into a [`Channel`].
///
/// Missing child elements decode as empty strings and a channel without
/// items is valid. When a field element repeats, the first non-empty one
/// wins. Titles and descriptions have HTML entities decoded after XML
/// unescaping, since many feeds double-encode them (`&amp;amp;`).
///
/// # Errors
///
/// Returns [`ParseError`] for malformed or truncated XML, or a document with
/// no `<channel>`.
///
/// # Security
///
/// XXE is not a concern: `quick-xml` (0.37) never expands `<!ENTITY>`
/// declarations, and `unescape()` fails on anything but the five XML
/// builtins and character references.
pub fn parse_channel(bytes: &[u8]) -> Result<Channel, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    // Names of the currently open elements, root first
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut channel: Option<Channel> = None;
    let mut in_channel = false;
    let mut item: Option<Item> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                let depth = path.len();

                if depth == 1 && name == b"channel" && channel.is_none() {
                    channel = Some(Channel::default());
                    in_channel = true;
                } else if depth == 2 && in_channel && name == b"item" {
                    item = Some(Item::default());
                } else if in_channel && capture.is_none() {
                    let in_item = depth == 3 && item.is_some();
                    if depth == 2 || in_item {
                        if let Some(field) = Field::from_name(&name) {
                            capture = Some(Capture {
                                field,
                                in_item,
                                depth: depth + 1,
                                text: String::new(),
                            });
                        }
                    }
                }

                path.push(name);
            }
            Event::Empty(e) => {
                // `<item/>`: an item with every field missing
                if path.len() == 2 && in_channel && e.name().as_ref() == b"item" {
                    if let Some(channel) = channel.as_mut() {
                        channel.items.push(Item::default());
                    }
                }
            }
            Event::Text(e) => {
                if let Some(capture) = capture.as_mut() {
                    if capture.depth == path.len() {
                        capture.text.push_str(&e.unescape().map_err(quick_xml::Error::from)?);
                    }
                }
            }
            Event::CData(e) => {
                if let Some(capture) = capture.as_mut() {
                    if capture.depth == path.len() {
                        capture.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Event::End(_) => {
                let closing_depth = path.len();
                let closed = path.pop().unwrap_or_default();

                if capture.as_ref().is_some_and(|c| c.depth == closing_depth) {
                    if let Some(done) = capture.take() {
                        store_field(done, channel.as_mut(), item.as_mut());
                    }
                } else if closing_depth == 3 && in_channel && closed == b"item" {
                    if let (Some(channel), Some(done)) = (channel.as_mut(), item.take()) {
                        channel.items.push(done);
                    }
                } else if closing_depth == 2 && in_channel && closed == b"channel" {
                    in_channel = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !path.is_empty() {
        return Err(ParseError::UnexpectedEof);
    }
    channel.ok_or(ParseError::MissingChannel)
}

fn store_field(capture: Capture, channel: Option<&mut Channel>, item: Option<&mut Item>) {
    let raw = capture.text.trim();
    let value = match capture.field {
        Field::Title | Field::Description => decode_entities(raw),
        Field::Link | Field::PubDate => raw.to_string(),
    };

    let slot = if capture.in_item {
        item.map(|item| match capture.field {
            Field::Title => &mut item.title,
            Field::Link => &mut item.link,
            Field::Description => &mut item.description,
            Field::PubDate => &mut item.pub_date,
        })
    } else {
        channel.and_then(|channel| match capture.field {
            Field::Title => Some(&mut channel.title),
            Field::Link => Some(&mut channel.link),
            Field::Description => Some(&mut channel.description),
            Field::PubDate => None,
        })
    };

    if let Some(slot) = slot {
        if slot.is_empty() {
            *slot = value;
        }
    }
}

fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <title>Lane&apos;s Blog</title>
  <link>https://wagslane.dev</link>
  <atom:link href="https://wagslane.dev/index.xml" rel="self" type="application/rss+xml"/>
  <description>Recent content on Lane&amp;amp;s Blog</description>
  <item>
    <title>The Zen of Proverbs</title>
    <link>https://wagslane.dev/posts/zen-of-proverbs/</link>
    <pubDate>Sun, 15 Jan 2023 00:00:00 +0000</pubDate>
    <description>20 rules of thumb for writing better software.</description>
  </item>
  <item>
    <title>Seed Oils &amp; You</title>
    <link>https://wagslane.dev/posts/seed-oils/</link>
    <pubDate>2022-12-01T08:30:00Z</pubDate>
    <description><![CDATA[<p>Fats &amp;amp; oils</p>]]></description>
  </item>
</channel>
</rss>"#;

    /// Channel layout emitted by Hugo: `atom:link` after the metadata
    const HUGO_RSS: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Boot.dev Blog</title>
    <link>https://blog.boot.dev/</link>
    <description>Recent content on Boot.dev Blog</description>
    <generator>Hugo -- gohugo.io</generator>
    <language>en-us</language>
    <lastBuildDate>Wed, 01 Nov 2023 00:00:00 +0000</lastBuildDate>
    <atom:link href="https://blog.boot.dev/index.xml" rel="self" type="application/rss+xml" />
    <item>
      <title>Learn Go</title>
      <link>https://blog.boot.dev/golang/learn-go/</link>
      <pubDate>Wed, 01 Nov 2023 00:00:00 +0000</pubDate>
      <guid>https://blog.boot.dev/golang/learn-go/</guid>
      <description>Go is fast.</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_channel_and_items_in_order() {
        let channel = parse_channel(SAMPLE_RSS.as_bytes()).unwrap();

        assert_eq!(channel.title, "Lane's Blog");
        assert_eq!(channel.link, "https://wagslane.dev");
        assert_eq!(channel.items.len(), 2);
        assert_eq!(channel.items[0].title, "The Zen of Proverbs");
        assert_eq!(
            channel.items[0].link,
            "https://wagslane.dev/posts/zen-of-proverbs/"
        );
        assert_eq!(channel.items[0].pub_date, "Sun, 15 Jan 2023 00:00:00 +0000");
        assert_eq!(channel.items[1].pub_date, "2022-12-01T08:30:00Z");
    }

    #[test]
    fn test_hugo_layout_with_trailing_atom_link() {
        let channel = parse_channel(HUGO_RSS.as_bytes()).unwrap();

        assert_eq!(channel.title, "Boot.dev Blog");
        assert_eq!(channel.link, "https://blog.boot.dev/");
        assert_eq!(channel.description, "Recent content on Boot.dev Blog");
        assert_eq!(
            channel.items,
            vec![Item {
                title: "Learn Go".to_string(),
                link: "https://blog.boot.dev/golang/learn-go/".to_string(),
                description: "Go is fast.".to_string(),
                pub_date: "Wed, 01 Nov 2023 00:00:00 +0000".to_string(),
            }]
        );
    }

    #[test]
    fn test_atom_link_right_after_link() {
        let xml = r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <link>https://d.example.com</link><atom:link href="x"/>
            <item><link>https://d.example.com/1</link><atom:link href="y" rel="self"/></item>
        </channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.link, "https://d.example.com");
        assert_eq!(channel.items[0].link, "https://d.example.com/1");
    }

    #[test]
    fn test_itunes_title_sibling_ignored() {
        let xml = r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
            <title>Podcast</title><itunes:title>Podcast (iTunes)</itunes:title>
            <item>
              <title>Ep 1</title><itunes:title>Episode One</itunes:title>
              <link>https://pod.example.com/1</link>
            </item>
        </channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.title, "Podcast");
        assert_eq!(channel.items[0].title, "Ep 1");
    }

    #[test]
    fn test_media_description_sibling_ignored() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <item>
              <media:description>media text</media:description>
              <description>real</description>
              <link>https://media.example.com/1</link>
            </item>
        </channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.items[0].description, "real");
    }

    #[test]
    fn test_first_non_empty_repeated_field_wins() {
        let xml = r#"<rss><channel><item>
            <link></link><link>https://example.com/first</link><link>https://example.com/second</link>
        </item></channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.items[0].link, "https://example.com/first");
    }

    #[test]
    fn test_item_fields_do_not_leak_into_channel() {
        let xml = r#"<rss><channel>
            <item><title>Only item</title><link>https://example.com/1</link></item>
        </channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.title, "");
        assert_eq!(channel.link, "");
        assert_eq!(channel.items[0].title, "Only item");
    }

    #[test]
    fn test_double_encoded_entities_decoded() {
        let channel = parse_channel(SAMPLE_RSS.as_bytes()).unwrap();

        assert_eq!(channel.description, "Recent content on Lane&s Blog");
        assert_eq!(channel.items[1].title, "Seed Oils & You");
        // CDATA is not XML-unescaped, so the HTML layer does the work
        assert_eq!(channel.items[1].description, "<p>Fats &amp; oils</p>");
    }

    #[test]
    fn test_amp_and_quot_in_title() {
        let xml = r#"<rss><channel><title>x</title>
            <item><title>Tom &amp; Jerry &quot;Live&quot;</title><link>https://example.com/1</link></item>
        </channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.items[0].title, r#"Tom & Jerry "Live""#);
    }

    #[test]
    fn test_html_named_entities_decoded() {
        let xml = r#"<rss><channel>
            <item><title>It&amp;rsquo;s here&amp;hellip;</title><link>https://example.com/1</link></item>
        </channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.items[0].title, "It\u{2019}s here\u{2026}");
    }

    #[test]
    fn test_zero_items_is_not_an_error() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.title, "Quiet");
        assert!(channel.items.is_empty());
    }

    #[test]
    fn test_empty_channel_element() {
        let xml = r#"<rss version="2.0"><channel></channel></rss>"#;
        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel, Channel::default());
    }

    #[test]
    fn test_missing_item_fields_default_to_empty() {
        let xml = r#"<rss><channel><item><link>https://example.com/only-link</link></item><item/></channel></rss>"#;

        let channel = parse_channel(xml.as_bytes()).unwrap();
        assert_eq!(channel.items.len(), 2);
        let item = &channel.items[0];
        assert_eq!(item.link, "https://example.com/only-link");
        assert_eq!(item.title, "");
        assert_eq!(item.description, "");
        assert_eq!(item.pub_date, "");
        assert_eq!(channel.items[1], Item::default());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_channel(b"<not valid xml").is_err());
        assert!(parse_channel(b"<rss><channel></item></channel></rss>").is_err());
    }

    #[test]
    fn test_truncated_document_is_error() {
        let xml = br#"<rss><channel><title>Cut</title><item><link>https://example.com/1</link>"#;
        assert!(matches!(parse_channel(xml), Err(ParseError::UnexpectedEof)));
    }

    #[test]
    fn test_missing_channel_is_error() {
        assert!(matches!(
            parse_channel(b"<html><body>Not a feed</body></html>"),
            Err(ParseError::MissingChannel)
        ));
    }

    #[test]
    fn test_custom_entity_rejected() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE rss [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<rss><channel><title>&xxe;</title></channel></rss>"#;

        assert!(parse_channel(xml.as_bytes()).is_err());
    }
}
