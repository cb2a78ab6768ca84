// src/extract/links.rs
//! Resource-link mining over post bodies.

use once_cell::sync::Lazy;
use regex::Regex;

/// Stored in `resource_links` when nothing survives filtering.
pub const LINKS_PLACEHOLDER: &str = "Login or registration required to view download links";

const EXCLUDED_FRAGMENTS: &[&str] = &[
    "/login/", "/register/", "/signin/", ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg",
];

/// Each pattern has exactly one capture group holding the URL.
static LINK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // direct links to archives, documents and media
        r#"(?i)(https?://[^\s"<>]+\.(?:zip|rar|7z|txt|csv|xlsx|pdf|exe|dmg|pkg|iso|img|torrent|json|xml))"#,
        // href attributes
        r#"(?i)href=["'](https?://[^\s"'<>]+)["']"#,
        // "Download: <url>" (ASCII or full-width colon)
        r#"(?i)download\s*[:：]\s*(https?://[^\s"<>]+)"#,
        // download/file paths
        r#"(?i)(https?://[^\s"<>]+/download/[^\s"<>]+)"#,
        r#"(?i)(https?://[^\s"<>]+/file/[^\s"<>]+)"#,
        r#"(?i)(https?://[^\s"<>]+/files/[^\s"<>]+)"#,
        // well-known file hosts
        r#"(?i)(https?://(?:mega\.nz|mediafire\.com|sendspace\.com|z-upload\.com|uploadfiles\.com|filefactory\.com|fileshare\.cz|rapidshare\.com|hotfile\.com|depositfiles\.com|4shared\.com)/[^\s"<>]+)"#,
        // download= query parameter
        r#"(?i)(https?://[^\s"<>?]+\?[^\s"<>]*download=[^\s"<>]*)"#,
    ]
    .iter()
    // Constant patterns, exercised by the tests below.
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Collect candidate URLs from every haystack with every pattern, in order.
pub fn mine_links(haystacks: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for re in LINK_PATTERNS.iter() {
        for hay in haystacks {
            for caps in re.captures_iter(hay) {
                let Some(m) = caps.get(1) else { continue };
                let url = m.as_str();
                let lower = url.to_ascii_lowercase();
                if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                    continue;
                }
                if out.iter().any(|seen| seen == url) {
                    continue;
                }
                out.push(url.to_string());
            }
        }
    }
    out.retain(|u| is_resource_link(u));
    out
}

/// False for images and auth pages.
pub fn is_resource_link(url: &str) -> bool {
    let lower = url.to_lowercase();
    !EXCLUDED_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Joined links, or the placeholder when empty.
pub fn join_links(links: &[String]) -> String {
    if links.is_empty() {
        LINKS_PLACEHOLDER.to_string()
    } else {
        links.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_file_link_drops_login_and_image() {
        let body = "https://host.com/file/a.zip https://host.com/login/x https://host.com/b.png";
        assert_eq!(mine_links(&[body]), vec!["https://host.com/file/a.zip".to_string()]);
    }

    #[test]
    fn href_and_download_prefix() {
        let html = r#"<a href="https://cdn.test/dump">get</a> Download: https://cdn.test/other"#;
        let links = mine_links(&[html]);
        assert_eq!(
            links,
            vec![
                "https://cdn.test/dump".to_string(),
                "https://cdn.test/other".to_string()
            ]
        );
    }

    #[test]
    fn file_hosts_and_query_param() {
        let text = "mirror https://mega.nz/folder/AbC#key and https://dl.test/get?id=4&download=1 end";
        let links = mine_links(&[text]);
        assert!(links.contains(&"https://mega.nz/folder/AbC#key".to_string()));
        assert!(links.contains(&"https://dl.test/get?id=4&download=1".to_string()));
    }

    #[test]
    fn duplicates_across_haystacks_collapse() {
        let html = r#"<a href="https://x.test/files/db.sql">https://x.test/files/db.sql</a>"#;
        let text = "https://x.test/files/db.sql";
        assert_eq!(mine_links(&[html, text]).len(), 1);
    }

    #[test]
    fn nothing_found_gives_placeholder() {
        assert!(mine_links(&["no links here"]).is_empty());
        assert_eq!(join_links(&[]), LINKS_PLACEHOLDER);
        assert_eq!(
            join_links(&["a".to_string(), "b".to_string()]),
            "a, b"
        );
    }

    #[test]
    fn register_paths_are_excluded_case_insensitively() {
        assert!(!is_resource_link("https://f.test/REGISTER/now"));
        assert!(!is_resource_link("https://f.test/pic.JPEG"));
        assert!(is_resource_link("https://f.test/download/77"));
    }
}
