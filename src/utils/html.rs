// src/utils/html.rs

/// Sanitizes user-authored quiz text with a whitelist: safe formatting tags (<b>, <p>, ...) are
/// kept while scripts, iframes and event-handler attributes are removed.
///
/// Text that is not HTML passes through unchanged apart from entity escaping of `<`, `>` and `&`.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
