use ammonia;

/// Clean teacher-authored text (test titles, prompts, option text) with ammonia.
///
/// Whitelist-based: safe formatting tags such as <b> or <p> survive, while
/// <script>, <iframe> and event-handler attributes are stripped. Prompts are
/// rendered by browser clients, so this is the stored-XSS fail-safe.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        let cleaned = clean_html("<b>2 + 2</b><script>alert(1)</script>");
        assert_eq!(cleaned, "<b>2 + 2</b>");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_html("What is the capital of France?"), "What is the capital of France?");
    }
}
