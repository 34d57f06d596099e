use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_corpus::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.EDU/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.edu".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether a host falls under an allowed domain suffix
///
/// The match is label-aligned: `example.edu` admits `example.edu` and
/// `catalog.example.edu` but not `badexample.edu`.
pub fn host_matches_suffix(host: &str, suffix: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();

    if suffix.is_empty() {
        return false;
    }

    host == suffix
        || host
            .strip_suffix(suffix.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}
