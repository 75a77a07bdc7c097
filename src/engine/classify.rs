//! Maps arbitrary URLs to the domain identity used as the tracking unit.

/// Pages the browser renders itself; time on these is never attributed.
const INTERNAL_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "moz-extension://",
    "about:",
];

/// Extracts the trackable domain from a URL: lowercased hostname with a
/// leading `www.` stripped. Returns `None` for browser-internal pages,
/// scheme-less or hostname-less URLs, and hostnames without a dot (a
/// heuristic that excludes `localhost` and bare intranet names). Malformed
/// input degrades to `None`, never to an error.
pub fn classify(url: &str) -> Option<String> {
    let lowered = url.trim().to_ascii_lowercase();

    if INTERNAL_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return None;
    }

    let (_, rest) = lowered.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);

    // Bracketed IPv6 literals are local-network territory, same as no-dot hosts.
    if host.starts_with('[') {
        return None;
    }

    let host = host.split(':').next().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() || !host.contains('.') {
        return None;
    }

    Some(host.to_owned())
}

#[cfg(test)]
mod tests {
    use super::classify;

    #[test]
    fn strips_www_and_lowercases() {
        assert_eq!(classify("https://www.Example.COM/page"), Some("example.com".into()));
        assert_eq!(classify("http://example.com"), Some("example.com".into()));
        assert_eq!(classify("https://news.ycombinator.com/item?id=1"), Some("news.ycombinator.com".into()));
    }

    #[test]
    fn ignores_ports_userinfo_and_fragments() {
        assert_eq!(classify("https://example.com:8443/x"), Some("example.com".into()));
        assert_eq!(classify("https://user:pw@example.com/x"), Some("example.com".into()));
        assert_eq!(classify("https://example.com#frag"), Some("example.com".into()));
    }

    #[test]
    fn rejects_browser_internal_pages() {
        assert_eq!(classify("chrome://newtab/"), None);
        assert_eq!(classify("chrome://settings"), None);
        assert_eq!(classify("chrome-extension://abcdef/popup.html"), None);
        assert_eq!(classify("about:blank"), None);
        assert_eq!(classify("edge://history"), None);
    }

    #[test]
    fn rejects_untrackable_hosts() {
        assert_eq!(classify("http://localhost:3000/"), None);
        assert_eq!(classify("http://intranet/tools"), None);
        assert_eq!(classify("https://[::1]/"), None);
        assert_eq!(classify("file:///home/user/doc.html"), None);
        assert_eq!(classify("not a url at all"), None);
        assert_eq!(classify(""), None);
    }
}
