//! Request classification for menu view tracking.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::types::DeviceType;

static MOBILE_UA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)mobile|android|iphone|ipad|ipod|blackberry|iemobile|opera mini|windows phone|tablet|kindle|silk|playbook")
        .expect("valid mobile user-agent regex")
});

static TABLET_UA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ipad|tablet|kindle|silk|playbook")
        .expect("valid tablet user-agent regex")
});

/// Classify the device family from a user agent string.
pub fn classify_device(user_agent: &str) -> DeviceType {
    if MOBILE_UA.is_match(user_agent) {
        if TABLET_UA.is_match(user_agent) {
            DeviceType::Tablet
        } else {
            DeviceType::Mobile
        }
    } else {
        DeviceType::Desktop
    }
}

/// Classify the browser family. The first matching rule wins.
pub fn classify_browser(user_agent: &str) -> &'static str {
    let has = |needle: &str| user_agent.contains(needle);

    if has("Chrome") && !has("Edg") {
        "Chrome"
    } else if has("Safari") && !has("Chrome") {
        "Safari"
    } else if has("Firefox") {
        "Firefox"
    } else if has("Edg") {
        "Edge"
    } else if has("Opera") || has("OPR") {
        "Opera"
    } else {
        "Other"
    }
}

/// Resolve the client address from proxy headers: the first `x-forwarded-for`
/// entry, then `x-real-ip`.
pub fn client_ip(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|value| !value.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const FIREFOX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    #[test]
    fn devices_are_classified() {
        assert_eq!(classify_device(IPHONE), DeviceType::Mobile);
        assert_eq!(classify_device(IPAD), DeviceType::Tablet);
        assert_eq!(classify_device(CHROME_DESKTOP), DeviceType::Desktop);
        assert_eq!(classify_device(""), DeviceType::Desktop);
    }

    #[test]
    fn browsers_follow_rule_order() {
        assert_eq!(classify_browser(CHROME_DESKTOP), "Chrome");
        assert_eq!(classify_browser(IPHONE), "Safari");
        assert_eq!(classify_browser(FIREFOX), "Firefox");
        assert_eq!(classify_browser(EDGE), "Edge");
        assert_eq!(classify_browser("Opera/9.80 (Windows NT 6.1)"), "Opera");
        assert_eq!(classify_browser("curl/8.4.0"), "Other");
    }

    #[test]
    fn client_ip_prefers_first_forwarded_entry() {
        assert_eq!(
            client_ip(Some("203.0.113.7, 10.0.0.1"), Some("10.0.0.2")).as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(
            client_ip(None, Some(" 198.51.100.4 ")).as_deref(),
            Some("198.51.100.4")
        );
        assert_eq!(client_ip(Some(""), Some("198.51.100.4")).as_deref(), Some("198.51.100.4"));
        assert_eq!(client_ip(None, None), None);
    }
}
