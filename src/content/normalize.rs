//! Content Normalizer
//!
//! Converts raw submissions (text plus style-run annotations) into a
//! normalized markup string with a fixed promotional footer. Run offsets
//! are given in UTF-16 code units, as messaging surfaces report them; the
//! walker converts to byte positions before slicing.

use serde::{Deserialize, Serialize};

/// Promotional footer appended to every normalized submission.
pub const FOOTER: &str = "<a href=\"https://t.me/postguard_bot\">Suggest a post</a> \u{2022} \
                          <a href=\"https://t.me/postguard_chat\">Chat</a>";

/// Style-run kind. The set of wrappers is closed; unknown kinds degrade to
/// escaped plain text so newer surface annotations pass through safely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Pre { language: Option<String> },
    Link { url: String },
    Mention { user_id: i64 },
    Unknown,
}

/// One non-overlapping style annotation over the raw text.
/// `offset` and `length` are in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRun {
    pub offset: usize,
    pub length: usize,
    pub kind: RunKind,
}

impl StyleRun {
    pub fn new(offset: usize, length: usize, kind: RunKind) -> Self {
        Self { offset, length, kind }
    }
}

/// Escape the three markup-significant characters.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Map a UTF-16 code-unit offset to a byte offset into `text`.
/// Out-of-range offsets clamp to the end of the string.
fn utf16_to_byte(text: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (byte_idx, ch) in text.char_indices() {
        if units >= utf16_offset {
            return byte_idx;
        }
        units += ch.len_utf16();
    }
    text.len()
}

fn wrap(kind: &RunKind, escaped: &str) -> String {
    match kind {
        RunKind::Bold => format!("<b>{escaped}</b>"),
        RunKind::Italic => format!("<i>{escaped}</i>"),
        RunKind::Underline => format!("<u>{escaped}</u>"),
        RunKind::Strikethrough => format!("<s>{escaped}</s>"),
        RunKind::Code => format!("<code>{escaped}</code>"),
        RunKind::Pre { language: Some(lang) } => {
            format!("<pre><code class=\"language-{}\">{escaped}</code></pre>", escape(lang))
        }
        RunKind::Pre { language: None } => format!("<pre>{escaped}</pre>"),
        RunKind::Link { url } => format!("<a href=\"{}\">{escaped}</a>", escape(url)),
        RunKind::Mention { user_id } => {
            format!("<a href=\"tg://user?id={user_id}\">{escaped}</a>")
        }
        RunKind::Unknown => escaped.to_string(),
    }
}

/// Render raw text plus style runs into normalized markup.
///
/// Runs are sorted by offset and walked once, emitting escaped plain spans
/// interleaved with wrapped spans. Runs that overlap an earlier run are
/// dropped (the input contract says runs do not overlap).
pub fn render_markup(text: &str, runs: &[StyleRun]) -> String {
    if runs.is_empty() {
        return escape(text);
    }

    let mut sorted: Vec<&StyleRun> = runs.iter().collect();
    sorted.sort_by_key(|r| r.offset);

    let mut out = String::with_capacity(text.len() + 32);
    let mut cursor = 0usize; // utf-16 units consumed
    for run in sorted {
        if run.offset < cursor || run.length == 0 {
            continue;
        }
        let start = utf16_to_byte(text, run.offset);
        let end = utf16_to_byte(text, run.offset + run.length);
        if start >= end {
            continue;
        }
        let plain_start = utf16_to_byte(text, cursor);
        if plain_start < start {
            out.push_str(&escape(&text[plain_start..start]));
        }
        out.push_str(&wrap(&run.kind, &escape(&text[start..end])));
        cursor = run.offset + run.length;
    }
    let tail = utf16_to_byte(text, cursor);
    if tail < text.len() {
        out.push_str(&escape(&text[tail..]));
    }
    out
}

/// Append the promotional footer after two newlines. An empty body yields
/// the footer alone.
pub fn with_footer(body: &str) -> String {
    if body.is_empty() {
        FOOTER.to_string()
    } else {
        format!("{body}\n\n{FOOTER}")
    }
}

/// Strip wrappers from a markup string, recovering the plain text. Used by
/// the edit-as-plain-text fallback step and to verify normalizer output.
pub fn strip_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_escaped() {
        assert_eq!(render_markup("a < b & c", &[]), "a &lt; b &amp; c");
    }

    #[test]
    fn test_bold_run_wraps_prefix() {
        let runs = vec![StyleRun::new(0, 5, RunKind::Bold)];
        let markup = render_markup("Hello world", &runs);
        assert_eq!(markup, "<b>Hello</b> world");
        // Stripping the wrappers reproduces the original text verbatim.
        assert_eq!(strip_markup(&markup), "Hello world");
    }

    #[test]
    fn test_italic_run_scenario() {
        let runs = vec![StyleRun::new(0, 5, RunKind::Italic)];
        assert_eq!(render_markup("Great news!", &runs), "<i>Great</i> news!");
    }

    #[test]
    fn test_link_and_mention() {
        let text = "see docs by me";
        let runs = vec![
            StyleRun::new(4, 4, RunKind::Link { url: "https://example.com/a&b".into() }),
            StyleRun::new(12, 2, RunKind::Mention { user_id: 7 }),
        ];
        assert_eq!(
            render_markup(text, &runs),
            "see <a href=\"https://example.com/a&amp;b\">docs</a> by \
             <a href=\"tg://user?id=7\">me</a>"
        );
    }

    #[test]
    fn test_pre_with_language() {
        let runs = vec![StyleRun::new(0, 4, RunKind::Pre { language: Some("rust".into()) })];
        assert_eq!(
            render_markup("code", &runs),
            "<pre><code class=\"language-rust\">code</code></pre>"
        );
    }

    #[test]
    fn test_unknown_kind_degrades_to_plain() {
        let runs = vec![StyleRun::new(0, 5, RunKind::Unknown)];
        assert_eq!(render_markup("<new>", &runs), "&lt;new&gt;");
    }

    #[test]
    fn test_utf16_offsets_with_surrogate_pairs() {
        // The emoji occupies two UTF-16 units; the bold run targets "hi".
        let text = "\u{1F600} hi";
        let runs = vec![StyleRun::new(3, 2, RunKind::Bold)];
        assert_eq!(render_markup(text, &runs), "\u{1F600} <b>hi</b>");
    }

    #[test]
    fn test_overlapping_run_dropped() {
        let runs = vec![
            StyleRun::new(0, 6, RunKind::Bold),
            StyleRun::new(3, 4, RunKind::Italic),
        ];
        assert_eq!(render_markup("abcdefgh", &runs), "<b>abcdef</b>gh");
    }

    #[test]
    fn test_footer_after_two_newlines() {
        let full = with_footer("body");
        assert!(full.starts_with("body\n\n"));
        assert!(full.ends_with(FOOTER));
    }

    #[test]
    fn test_empty_body_is_footer_only() {
        assert_eq!(with_footer(""), FOOTER);
    }
}
