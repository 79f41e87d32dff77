//! Text helpers shared by posts and comments.

/// Length of the short preview used in logs and CLI output.
pub const PREVIEW_CHARS: usize = 15;
/// Length of the preview used as the post detail page title.
pub const TITLE_CHARS: usize = 30;

/// Truncate `text` to at most `limit` characters, respecting char boundaries.
pub fn preview(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Normalise submitted body text: surrounding whitespace is dropped and
/// Windows line endings collapse to `\n`.
pub fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim().to_string()
}
