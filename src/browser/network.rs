//! Request blocking policy and spoofed request headers.

use url::Url;

/// Tracking, tag-manager, social-widget and ad hosts whose requests are
/// aborted. A request matches when its host equals an entry or is a
/// subdomain of one.
pub const DENYLISTED_HOSTS: &[&str] = &[
    "google-analytics.com",
    "googletagmanager.com",
    "facebook.net",
    "facebook.com",
    "doubleclick.net",
    "amazon-adsystem.com",
    "adservice.google.com",
];

/// DevTools resource types that are never needed for extraction.
pub const BLOCKED_RESOURCE_TYPES: &[&str] = &["Image", "Stylesheet", "Font", "Media"];

pub fn is_denylisted_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    DENYLISTED_HOSTS.iter().any(|denied| {
        host == *denied
            || host
                .strip_suffix(denied)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Whether an intercepted request should be aborted.
///
/// `resource_type` is the DevTools protocol name (`"Image"`, `"Script"`, ...).
pub fn should_block(resource_type: &str, url: &str) -> bool {
    if BLOCKED_RESOURCE_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(resource_type))
    {
        return true;
    }

    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(is_denylisted_host))
        .unwrap_or(false)
}

/// Header set a desktop Chrome sends for a top-level navigation.
pub fn browser_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9,hi;q=0.8"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
    ]
}

/// Headers as a JSON object, the shape DevTools expects.
pub fn browser_headers_json() -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = browser_headers()
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_heavy_resource_types() {
        for kind in ["Image", "Stylesheet", "Font", "Media", "image"] {
            assert!(should_block(kind, "https://m.media-amazon.com/x"), "{}", kind);
        }
        assert!(!should_block("Document", "https://www.amazon.in/dp/B0"));
        assert!(!should_block("Script", "https://rukminim2.flixcart.com/app.js"));
    }

    #[test]
    fn blocks_denylisted_hosts_and_subdomains() {
        assert!(should_block("Script", "https://www.googletagmanager.com/gtm.js"));
        assert!(should_block("XHR", "https://connect.facebook.net/sdk.js"));
        assert!(should_block("Script", "https://aax-eu.amazon-adsystem.com/e/dtb"));
        assert!(should_block("Fetch", "https://doubleclick.net/pixel"));
    }

    #[test]
    fn lookalike_hosts_are_not_blocked() {
        assert!(!should_block("Script", "https://notfacebook.com/a.js"));
        assert!(!should_block("Script", "https://google-analytics.com.example.org/a.js"));
        assert!(!should_block("Script", "not a url"));
    }

    #[test]
    fn header_json_has_fetch_metadata() {
        let headers = browser_headers_json();
        assert_eq!(headers["Sec-Fetch-Mode"], "navigate");
        assert_eq!(headers["DNT"], "1");
        assert!(headers["Accept-Language"].as_str().unwrap().starts_with("en"));
    }
}
