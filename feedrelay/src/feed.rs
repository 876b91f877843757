use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};

use crate::error::FetchError;

/// One parsed syndication document. Lives for a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    /// Site display name (the feed title)
    pub site_name: String,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// `None` when the document carried no date the parser could read
    pub published: Option<DateTime<Utc>>,
    pub title: String,
    pub link: String,
    /// Raw summary text, markup included
    pub summary: String,
}

impl FeedDocument {
    /// Convert a parsed feed into the typed document, checking required fields.
    ///
    /// The feed must have a title, and each entry a title and a link.
    /// Publish time falls back to the `updated` date; summary falls back to
    /// the content body, then to an empty string.
    pub fn from_feed(url: &str, feed: Feed) -> Result<Self, FetchError> {
        let site_name = feed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FetchError::MissingField {
                url: url.to_string(),
                field: "title",
            })?;

        let entries = feed
            .entries
            .into_iter()
            .map(|e| FeedEntry::from_entry(url, e))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { site_name, entries })
    }
}

impl FeedEntry {
    fn from_entry(url: &str, entry: Entry) -> Result<Self, FetchError> {
        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| FetchError::MissingField {
                url: url.to_string(),
                field: "entry title",
            })?;

        let link = entry
            .links
            .into_iter()
            .map(|l| l.href)
            .find(|h| !h.trim().is_empty())
            .ok_or_else(|| FetchError::MissingField {
                url: url.to_string(),
                field: "entry link",
            })?;

        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        Ok(Self {
            published: entry.published.or(entry.updated),
            title,
            link,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Feed {
        feed_rs::parser::parse(xml.as_bytes()).expect("valid feed xml")
    }

    #[test]
    fn rss_items_become_entries() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example News</title>
  <link>https://a.example/</link>
  <description>d</description>
  <item>
    <title>First</title>
    <link>https://a.example/1</link>
    <description>&lt;p&gt;Hello&lt;/p&gt;</description>
    <pubDate>Tue, 10 Sep 2024 12:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Undated</title>
    <link>https://a.example/2</link>
  </item>
</channel></rss>"#;

        let doc = FeedDocument::from_feed("https://a.example/feed", parse(xml)).unwrap();
        assert_eq!(doc.site_name, "Example News");
        assert_eq!(doc.entries.len(), 2);

        let first = &doc.entries[0];
        assert_eq!(first.title, "First");
        assert_eq!(first.link, "https://a.example/1");
        assert_eq!(first.summary, "<p>Hello</p>");
        assert_eq!(
            first.published.map(|d| d.to_rfc3339()),
            Some("2024-09-10T12:00:00+00:00".to_string())
        );

        assert_eq!(doc.entries[1].published, None);
        assert_eq!(doc.entries[1].summary, "");
    }

    #[test]
    fn atom_updated_is_used_when_published_missing() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Site</title>
  <id>urn:x</id>
  <updated>2024-09-10T12:00:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:x:1</id>
    <link href="https://atom.example/1"/>
    <updated>2024-09-10T11:59:00Z</updated>
    <content type="html">Body text</content>
  </entry>
</feed>"#;

        let doc = FeedDocument::from_feed("https://atom.example/feed", parse(xml)).unwrap();
        let entry = &doc.entries[0];
        assert_eq!(
            entry.published.map(|d| d.to_rfc3339()),
            Some("2024-09-10T11:59:00+00:00".to_string())
        );
        assert_eq!(entry.summary, "Body text");
    }

    #[test]
    fn missing_title_is_rejected() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <link>https://a.example/</link>
  <description>d</description>
</channel></rss>"#;

        let err = FeedDocument::from_feed("https://a.example/feed", parse(xml)).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { field: "title", .. }));
        assert_eq!(err.url(), "https://a.example/feed");
    }

    #[test]
    fn entry_without_link_is_rejected() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <link>https://a.example/</link>
  <description>d</description>
  <item><title>No link here</title></item>
</channel></rss>"#;

        let err = FeedDocument::from_feed("https://a.example/feed", parse(xml)).unwrap_err();
        assert!(matches!(
            err,
            FetchError::MissingField {
                field: "entry link",
                ..
            }
        ));
    }
}
