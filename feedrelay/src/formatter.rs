use crate::feed::FeedEntry;

/// A channel-ready rich message: author label, linked title, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub site_name: String,
    pub title: String,
    pub link: String,
    pub summary: String,
}

/// Shape one entry for delivery. Summary is passed through as-is;
/// length limits belong to the chat client.
pub fn format_entry(entry: &FeedEntry, site_name: &str) -> OutgoingMessage {
    OutgoingMessage {
        site_name: site_name.to_string(),
        title: entry.title.clone(),
        link: entry.link.clone(),
        summary: entry.summary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formatting_is_pure_and_keeps_markup() {
        let entry = FeedEntry {
            published: Some(Utc::now()),
            title: "Release 1.0".into(),
            link: "https://a.example/release".into(),
            summary: "<b>big</b> &amp; bold".repeat(500),
        };

        let a = format_entry(&entry, "Example Blog");
        let b = format_entry(&entry, "Example Blog");
        assert_eq!(a, b);
        assert_eq!(a.site_name, "Example Blog");
        assert_eq!(a.title, "Release 1.0");
        assert_eq!(a.link, "https://a.example/release");
        assert_eq!(a.summary, entry.summary);
    }
}
