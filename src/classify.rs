use crate::model::SourceKind;

/// Hosts treated as audio/video platforms. Matching is by host suffix so
/// subdomains (www., m., music.) classify the same as the bare domain.
const MEDIA_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "tiktok.com",
    "instagram.com",
    "facebook.com",
    "fb.watch",
    "dailymotion.com",
    "twitch.tv",
    "soundcloud.com",
    "podcasts.apple.com",
];

/// Classify a source URL by its host. Unparsable URLs fall back to `Text`;
/// misclassification there is harmless because the page path simply declines.
pub fn source_kind(url: &str) -> SourceKind {
    match host_of(url) {
        Some(host) if is_media_host(&host) => SourceKind::VideoAudio,
        _ => SourceKind::Text,
    }
}

fn is_media_host(host: &str) -> bool {
    MEDIA_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
}

/// Pull the lowercased host out of a URL without a full parser: strip the
/// scheme, drop userinfo, cut at the first path/query/fragment separator,
/// drop any port.
fn host_of(url: &str) -> Option<String> {
    let rest = url.trim().split("://").nth(1).or_else(|| {
        // scheme-relative ("//host/...") still classifies
        url.trim().strip_prefix("//")
    })?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority
        .rsplit('@')
        .next()?
        .split(':')
        .next()?
        .to_ascii_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases = [
            ("https://www.youtube.com/watch?v=abc123", SourceKind::VideoAudio),
            ("https://youtu.be/abc123", SourceKind::VideoAudio),
            ("https://m.youtube.com/watch?v=abc", SourceKind::VideoAudio),
            ("https://vimeo.com/1234567", SourceKind::VideoAudio),
            ("https://www.tiktok.com/@cook/video/99", SourceKind::VideoAudio),
            ("https://www.instagram.com/reel/xyz/", SourceKind::VideoAudio),
            ("https://podcasts.apple.com/us/podcast/id12", SourceKind::VideoAudio),
            ("https://www.seriouseats.com/pasta", SourceKind::Text),
            ("https://example.com/youtube.com", SourceKind::Text),
            ("https://notyoutube.community/watch", SourceKind::Text),
            ("not a url at all", SourceKind::Text),
            ("", SourceKind::Text),
        ];

        for (url, expected) in cases {
            assert_eq!(source_kind(url), expected, "url: {}", url);
        }
    }

    #[test]
    fn test_host_ports_and_userinfo() {
        assert_eq!(host_of("https://user@youtube.com:443/w"), Some("youtube.com".into()));
        assert_eq!(host_of("//youtu.be/abc"), Some("youtu.be".into()));
        assert_eq!(host_of("https:///nohost"), None);
    }

    #[test]
    fn test_lookalike_hosts_are_text() {
        // suffix matching must not treat "xyoutube.com" as youtube.com
        assert_eq!(source_kind("https://xyoutube.com/watch"), SourceKind::Text);
        assert_eq!(source_kind("https://youtube.community/v"), SourceKind::Text);
    }
}
