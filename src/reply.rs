use crate::config::ReplyFormat;
use crate::platform::telegram::ParseMode;

/// Telegram rejects messages over 4096 characters (counted after entity parsing).
const MAX_REPLY_CHARS: usize = 4096;

/// The fence markers are sent as literal text.
const CODE_FENCE_OVERHEAD: usize = 8;

/// Text ready to go into a `sendMessage` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
}

impl Reply {
    /// Unformatted text, sent as-is.
    pub fn plain(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            text: truncate(&text, MAX_REPLY_CHARS).to_string(),
            parse_mode: None,
        }
    }

    /// Wrap text in the configured code markup.
    pub fn formatted(text: &str, format: ReplyFormat) -> Self {
        match format {
            ReplyFormat::Html => Self {
                text: format!(
                    "<pre language=\"json\">{}</pre>",
                    escape_html(truncate(text, MAX_REPLY_CHARS))
                ),
                parse_mode: Some(ParseMode::Html),
            },
            ReplyFormat::CodeFence => Self {
                text: format!(
                    "```\n{}\n```",
                    truncate(text, MAX_REPLY_CHARS - CODE_FENCE_OVERHEAD)
                ),
                parse_mode: None,
            },
        }
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Cut `text` to at most `max_chars` characters.
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_wraps_in_pre() {
        let reply = Reply::formatted(r#"{"summary":"Test"}"#, ReplyFormat::Html);
        assert_eq!(
            reply.text,
            r#"<pre language="json">{"summary":"Test"}</pre>"#
        );
        assert_eq!(reply.parse_mode, Some(ParseMode::Html));
    }

    #[test]
    fn test_html_escapes_markup() {
        let reply = Reply::formatted("<b>a & b</b>", ReplyFormat::Html);
        assert_eq!(
            reply.text,
            r#"<pre language="json">&lt;b&gt;a &amp; b&lt;/b&gt;</pre>"#
        );
    }

    #[test]
    fn test_code_fence_has_no_parse_mode() {
        let reply = Reply::formatted("internal error", ReplyFormat::CodeFence);
        assert_eq!(reply.text, "```\ninternal error\n```");
        assert_eq!(reply.parse_mode, None);
    }

    #[test]
    fn test_plain_is_verbatim() {
        let reply = Reply::plain("buy milk");
        assert_eq!(reply.text, "buy milk");
        assert!(reply.parse_mode.is_none());
    }

    #[test]
    fn test_cyrillic_within_limit_is_kept_whole() {
        let text = "я".repeat(2500);
        assert_eq!(Reply::plain(text.clone()).text, text);

        let reply = Reply::formatted(&text, ReplyFormat::Html);
        assert_eq!(reply.text, format!("<pre language=\"json\">{}</pre>", text));
    }

    #[test]
    fn test_over_limit_cut_by_characters() {
        let reply = Reply::plain("я".repeat(5000));
        assert_eq!(reply.text.chars().count(), MAX_REPLY_CHARS);
        assert!(reply.text.chars().all(|c| c == 'я'));

        let reply = Reply::formatted(&"ж".repeat(5000), ReplyFormat::CodeFence);
        assert_eq!(reply.text.chars().count(), MAX_REPLY_CHARS);
    }
}
