//! Trap Classifier
//!
//! Whole-word, case-insensitive vocabulary match for anti-blocking and
//! detection infrastructure. False negatives are accepted; the vocabulary is
//! kept narrow so ordinary page scripts are not flagged.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Vocabulary of trap terms
pub const TRAP_PATTERN: &str = r"(?i)\b(ad(s|block|guard|server|remover)?|blockadblock|fuckadblock|pagefair|bait|trap|detect|advertisement)\b";

static TRAP: OnceLock<Regex> = OnceLock::new();
static DEBUGGER: OnceLock<Regex> = OnceLock::new();

fn trap_regex() -> &'static Regex {
    TRAP.get_or_init(|| Regex::new(TRAP_PATTERN).expect("trap vocabulary compiles"))
}

fn debugger_regex() -> &'static Regex {
    DEBUGGER.get_or_init(|| Regex::new(r"\bdebugger\b").expect("debugger pattern compiles"))
}

/// Whether free text belongs to trap infrastructure
pub fn is_trap(text: &str) -> bool {
    trap_regex().is_match(text)
}

/// Resolve a URL as written in page code against the page URL
pub fn resolve_url(base: Option<&url::Url>, raw: &str) -> Result<url::Url> {
    let resolved = match base {
        Some(base) => base.join(raw),
        None => url::Url::parse(raw),
    };
    resolved.map_err(|e| Error::MalformedUrl(format!("{:?}: {}", excerpt(raw), e)))
}

/// Classify a URL as written in page code
///
/// Only the text the page supplied is matched; the page URL it resolves
/// against never contributes. Input that does not resolve is not a trap.
pub fn is_trap_url(base: Option<&url::Url>, raw: &str) -> bool {
    match resolve_url(base, raw) {
        Ok(_) => is_trap(raw),
        Err(e) => {
            tracing::debug!("unclassifiable: {}", e);
            false
        }
    }
}

/// Whether source text contains a debugger breakpoint directive
pub fn has_debugger_directive(source: &str) -> bool {
    debugger_regex().is_match(source)
}

/// First 100 characters of `text`, for logs
pub fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary() {
        assert!(is_trap("var blockAdBlock = new BlockAdBlock();"));
        assert!(is_trap("https://x.com/blockadblock.js"));
        assert!(is_trap("FuckAdBlock"));
        assert!(is_trap("pagefair.js"));
        assert!(is_trap("ad-banner"));
        assert!(is_trap("show ads here"));
        assert!(is_trap("adblock detect"));
        assert!(is_trap("ADVERTISEMENT"));
    }

    #[test]
    fn test_ad_is_whole_word_only() {
        assert!(!is_trap("var loaded = true; readyState"));
        assert!(!is_trap("shadow header download"));
        assert!(!is_trap("https://cdn.example.com/jquery.min.js"));
        assert!(!is_trap("detected"));
    }

    #[test]
    fn test_url_classification() {
        let base = url::Url::parse("https://news.example.com/article").unwrap();
        assert!(is_trap_url(Some(&base), "/js/ads.js"));
        assert!(!is_trap_url(Some(&base), "/js/app.js"));
        assert!(is_trap_url(None, "https://x.com/pagefair.js"));
        assert!(!is_trap_url(None, "::not a url::"));
    }

    #[test]
    fn test_page_url_does_not_leak_into_classification() {
        for page in [
            "https://ad.example.org/",
            "https://news.example.com/ad/",
            "https://detect.io/",
            "https://example.com/bait/trap/",
        ] {
            let base = url::Url::parse(page).unwrap();
            assert!(!is_trap_url(Some(&base), "app.js"), "{}", page);
            assert!(!is_trap_url(Some(&base), "/static/main.js"), "{}", page);
            assert!(is_trap_url(Some(&base), "ads.js"), "{}", page);
        }
    }

    #[test]
    fn test_resolve_url() {
        let base = url::Url::parse("https://news.example.com/a/b").unwrap();
        let url = resolve_url(Some(&base), "../c.js").unwrap();
        assert_eq!(url.as_str(), "https://news.example.com/c.js");
        assert!(matches!(
            resolve_url(None, "relative.js"),
            Err(Error::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_debugger_directive() {
        assert!(has_debugger_directive("debugger;"));
        assert!(has_debugger_directive("while(1){debugger}"));
        assert!(!has_debugger_directive("debuggerEnabled = 1"));
    }

    #[test]
    fn test_excerpt() {
        let long = "x".repeat(250);
        assert_eq!(excerpt(&long).len(), 100);
        assert_eq!(excerpt("short"), "short");
    }
}
