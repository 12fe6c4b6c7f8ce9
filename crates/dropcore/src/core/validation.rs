//! URL validation for inbound messages
//!
//! Links are checked before any fetch starts:
//! - [`extract_youtube_url`] finds the first YouTube link in free text
//! - [`validate_youtube_url`] whitelists scheme and host

use lazy_regex::{lazy_regex, Lazy, Regex};
use url::Url;

use crate::core::error::{AppError, AppResult};

/// Maximum URL length accepted from a chat message
pub const MAX_URL_LENGTH: usize = 2048;

/// Watch pages, shorts, embeds, live pages and youtu.be short links,
/// scheme and `www.`/`m.`/`music.` prefixes optional. The leading group
/// keeps `notyoutube.com/...` from matching in the middle of a host.
static YOUTUBE_LINK: Lazy<Regex> = lazy_regex!(
    r"(?i)(?:^|[^\w.@/-])((?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?\S*?v=|shorts/|embed/|live/)|youtu\.be/)[\w-]+\S*)"
);

/// Returns the first YouTube link in `text`, normalized to an absolute
/// `https://` URL, or `None` when there is no valid one.
///
/// # Examples
/// ```
/// use dropcore::core::validation::extract_youtube_url;
///
/// assert_eq!(
///     extract_youtube_url("look: youtu.be/abc123").as_deref(),
///     Some("https://youtu.be/abc123")
/// );
/// assert_eq!(extract_youtube_url("not a url"), None);
/// ```
pub fn extract_youtube_url(text: &str) -> Option<String> {
    let found = YOUTUBE_LINK.captures(text)?.get(1)?.as_str();
    let has_scheme = found.get(..4).is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"));
    let candidate = if has_scheme {
        found.to_string()
    } else {
        format!("https://{}", found)
    };

    validate_youtube_url(&candidate).ok().map(|url| url.to_string())
}

/// Validates that a URL is a YouTube URL.
///
/// Whitelist approach:
/// - Only HTTP/HTTPS schemes allowed
/// - Only youtube.com, youtu.be, youtube-nocookie.com domains (+ subdomains)
///
/// # Examples
/// ```
/// use dropcore::core::validation::validate_youtube_url;
///
/// assert!(validate_youtube_url("https://youtu.be/dQw4w9WgXcQ").is_ok());
/// assert!(validate_youtube_url("https://www.youtube.com/shorts/dQw4w9WgXcQ").is_ok());
/// assert!(validate_youtube_url("https://evil.com/watch?v=dQw4w9WgXcQ").is_err());
/// assert!(validate_youtube_url("ftp://youtube.com/video").is_err());
/// assert!(validate_youtube_url("not a url").is_err());
/// ```
pub fn validate_youtube_url(url: &str) -> AppResult<Url> {
    if url.len() > MAX_URL_LENGTH {
        return Err(AppError::InvalidUrl(format!("URL longer than {} bytes", MAX_URL_LENGTH)));
    }

    let parsed = Url::parse(url).map_err(|_| AppError::InvalidUrl(url.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::InvalidUrl(format!(
            "{} (invalid scheme: {})",
            url,
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::InvalidUrl(format!("{} (no host)", url)))?
        .to_lowercase();

    let is_youtube = host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtu.be"
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com");

    if !is_youtube {
        return Err(AppError::InvalidUrl(format!(
            "{} (not a YouTube domain: {})",
            url, host
        )));
    }

    // youtu.be/<id> needs the id, youtube.com needs some path or query
    if host == "youtu.be" && parsed.path().trim_matches('/').is_empty() {
        return Err(AppError::InvalidUrl(format!("{} (missing video id)", url)));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== extract_youtube_url Tests ====================

    #[test]
    fn test_extract_from_plain_links() {
        let cases = [
            ("https://youtu.be/abc123", "https://youtu.be/abc123"),
            (
                "https://www.youtube.com/shorts/AbC_-12",
                "https://www.youtube.com/shorts/AbC_-12",
            ),
            (
                "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
                "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
            ),
            (
                "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
                "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            ),
            ("youtube.com/shorts/xyz", "https://youtube.com/shorts/xyz"),
        ];

        for (input, expected) in cases {
            assert_eq!(extract_youtube_url(input).as_deref(), Some(expected), "input: {}", input);
        }
    }

    #[test]
    fn test_extract_from_surrounding_text() {
        let text = "check this out https://youtu.be/abc123?si=share and tell me";
        assert_eq!(
            extract_youtube_url(text).as_deref(),
            Some("https://youtu.be/abc123?si=share")
        );
    }

    #[test]
    fn test_extract_rejects_non_youtube() {
        for text in [
            "not a url",
            "",
            "https://vimeo.com/123",
            "https://youtube.com/",
            "https://youtu.be/",
            "https://notyoutube.com/shorts/abc",
        ] {
            assert_eq!(extract_youtube_url(text), None, "text: {:?}", text);
        }
    }

    // ==================== validate_youtube_url Tests ====================

    #[test]
    fn test_validate_youtube_url_valid() {
        let valid_urls = vec![
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
        ];

        for url in valid_urls {
            assert!(validate_youtube_url(url).is_ok(), "URL should be valid: {}", url);
        }
    }

    #[test]
    fn test_validate_youtube_url_invalid() {
        let invalid_urls = vec![
            "not a url",
            "ftp://youtube.com/video",
            "https://evil.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com.evil.com/watch?v=x",
            "https://youtu.be",
        ];

        for url in invalid_urls {
            assert!(
                matches!(validate_youtube_url(url), Err(AppError::InvalidUrl(_))),
                "URL should be invalid: {}",
                url
            );
        }
    }

    #[test]
    fn test_validate_rejects_overlong_url() {
        let url = format!("https://youtu.be/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(validate_youtube_url(&url).is_err());
    }
}
