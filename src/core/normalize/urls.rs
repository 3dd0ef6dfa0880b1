use once_cell::sync::Lazy;
use regex::Regex;

/// Scheme, optional `www.` and a short domain, up to the first path slash.
pub static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(www\.)?[\w\-_+]*(\.\w{2,4}){0,2}/)").expect("url pattern compiles")
});

/// Optional scheme and host, capturing the path onwards.
static RE_URL_PATH_CAPTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?[^/]*(/.*)").expect("path capture pattern compiles")
});

/// Drops the query string, then the scheme and host.
///
/// `https://www.example.com/shop/?utm=1` -> `/shop/`
pub fn strip_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    url_strip_domain(without_query)
}

/// Text after the first `?`, if any.
pub fn url_extract_parameter(url: &str) -> Option<String> {
    url.split_once('?').map(|(_, params)| params.to_string())
}

/// Everything from the first path slash after the host. Input with no
/// recognisable path is returned unchanged.
pub fn url_strip_domain(url: &str) -> String {
    match RE_URL_PATH_CAPTURE.captures(url).and_then(|c| c.get(1)) {
        Some(path) => path.as_str().to_string(),
        None => url.to_string(),
    }
}

/// Path segment `n` of a landing page (`/a/b/c`, n=1 -> `a`), or `""`.
pub fn path_segment(page_path: &str, n: usize) -> String {
    page_path.split('/').nth(n).unwrap_or_default().to_string()
}

/// Whether `url` starts with scheme and host.
pub fn is_absolute_url(url: &str) -> bool {
    RE_URL.is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_then_domain() {
        assert_eq!(strip_url("https://www.example.com/shop/?utm=1"), "/shop/");
        assert_eq!(strip_url("/already/a/path?x=y"), "/already/a/path");
    }

    #[test]
    fn extracts_parameters() {
        assert_eq!(url_extract_parameter("/p?a=1&b=2").as_deref(), Some("a=1&b=2"));
        assert_eq!(url_extract_parameter("/p"), None);
    }

    #[test]
    fn strip_domain_keeps_query() {
        assert_eq!(url_strip_domain("http://example.co.uk/a?b=c"), "/a?b=c");
        assert_eq!(url_strip_domain("/a?b=c"), "/a?b=c");
        assert_eq!(url_strip_domain("(not set)"), "(not set)");
    }

    #[test]
    fn path_segments() {
        assert_eq!(path_segment("/shoes/red/", 1), "shoes");
        assert_eq!(path_segment("/shoes/red/", 2), "red");
        assert_eq!(path_segment("/", 2), "");
    }

    #[test]
    fn absolute_urls() {
        assert!(is_absolute_url("https://www.example.com/"));
        assert!(!is_absolute_url("/relative"));
    }
}
