use crate::url::domain::{extract_domain, host_matches_suffix};
use crate::UrlError;
use url::Url;

/// File extensions that never carry readable page content
///
/// Stylesheets, scripts, archives, audio/video, icons and vector images.
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "zip", "gz", "tar", "rar", "7z", "mp4", "mp3", "webm", "avi", "mov",
    "wav", "ogg", "ico", "svg",
];

/// Normalizes a URL and applies the crawl filter
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Reject hosts that do not end with an allowed domain suffix
/// 3. Reject schemes other than http and https
/// 4. Remove the fragment (everything after #)
/// 5. Reject paths whose file extension is in [`EXCLUDED_EXTENSIONS`]
///
/// The result is idempotent: normalizing an already normalized URL returns
/// the same string.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
/// * `allowed_domains` - Allowed host suffixes (lowercase)
///
/// # Examples
///
/// ```
/// use site_corpus::url::normalize_url;
///
/// let allowed = vec!["example.edu".to_string()];
/// let url = normalize_url("https://WWW.Example.edu/fees#table", &allowed).unwrap();
/// assert_eq!(url.as_str(), "https://www.example.edu/fees");
///
/// assert!(normalize_url("https://example.edu/site.css", &allowed).is_err());
/// ```
pub fn normalize_url(url_str: &str, allowed_domains: &[String]) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    let host = extract_domain(&url).ok_or(UrlError::MissingHost)?;
    if !allowed_domains
        .iter()
        .any(|suffix| host_matches_suffix(&host, suffix))
    {
        return Err(UrlError::DisallowedHost(host));
    }

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    url.set_fragment(None);

    if let Some(ext) = path_extension(url.path()) {
        if EXCLUDED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(UrlError::ExcludedExtension(ext));
        }
    }

    Ok(url)
}

/// Returns the lowercase extension of the last path segment, if any
///
/// Dotfiles such as `/.well-known` have no extension.
fn path_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    match segment.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < segment.len() => {
            Some(segment[idx + 1..].to_ascii_lowercase())
        }
        _ => None,
    }
}
