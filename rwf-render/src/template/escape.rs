//! Output escaping used by compilers that print values into HTML.
use std::fmt::Debug;

/// Escapes text printed by a template.
pub trait Escaper: Debug + Send + Sync {
    fn escape(&self, text: &str) -> String;
}

/// Default escaper, replaces HTML special characters with entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlEscaper;

impl Escaper for HtmlEscaper {
    fn escape(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());

        for c in text.chars() {
            match c {
                '&' => result.push_str("&amp;"),
                '<' => result.push_str("&lt;"),
                '>' => result.push_str("&gt;"),
                '"' => result.push_str("&quot;"),
                '\'' => result.push_str("&#39;"),
                c => result.push(c),
            }
        }

        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_html_escaper() {
        assert_eq!(
            HtmlEscaper.escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(HtmlEscaper.escape("plain"), "plain");
    }
}
