//! Inline narration markup.
//!
//! Scripts may carry bracketed markers:
//!
//! - `[pause]`, `[pause 300ms]`, `[pause 1.5s]` become break tags
//! - any other `[word ...]` is an audio tag passed through to the engine
//!
//! Unterminated brackets are treated as plain text.

/// Pause length for a bare `[pause]` marker.
pub const DEFAULT_PAUSE_MS: u32 = 500;

/// Pause inserted between paragraphs.
pub const PARAGRAPH_PAUSE_MS: u32 = 700;

/// Longest pause a marker may request.
pub const MAX_PAUSE_MS: u32 = 10_000;

/// One lexical piece of a marked-up script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Pause(u32),
    Tag(&'a str),
}

/// Split `text` into plain runs and markers.
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let Some(close_rel) = rest[open..].find(']') else {
            break;
        };
        let close = open + close_rel;
        let inner = rest[open + 1..close].trim();

        if inner.is_empty() || inner.contains('[') {
            // Not a marker; emit through the bracket and keep scanning.
            tokens.push(Token::Text(&rest[..=open]));
            rest = &rest[open + 1..];
            continue;
        }

        if open > 0 {
            tokens.push(Token::Text(&rest[..open]));
        }
        tokens.push(parse_pause(inner).map_or(Token::Tag(inner), Token::Pause));
        rest = &rest[close + 1..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

/// Parse the inside of a `[pause ...]` marker into milliseconds.
#[must_use]
pub fn parse_pause(inner: &str) -> Option<u32> {
    let mut parts = inner.split_whitespace();
    if !parts.next()?.eq_ignore_ascii_case("pause") {
        return None;
    }
    let Some(arg) = parts.next() else {
        return Some(DEFAULT_PAUSE_MS);
    };
    if parts.next().is_some() {
        return None;
    }

    let arg = arg.to_ascii_lowercase();
    let ms = if let Some(v) = arg.strip_suffix("ms") {
        v.parse::<f64>().ok()?
    } else if let Some(v) = arg.strip_suffix('s') {
        v.parse::<f64>().ok()? * 1000.0
    } else {
        return None;
    };

    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    Some(ms.round().min(f64::from(MAX_PAUSE_MS)) as u32)
}

/// Canonical marker text for a pause.
#[must_use]
pub fn pause_marker(ms: u32) -> String {
    format!("[pause {ms}ms]")
}

/// Render marked-up text into the form sent to the voice engine.
///
/// Pauses become `<break time="Nms"/>`, audio tags are kept in brackets,
/// and XML-special characters in plain text are escaped.
#[must_use]
pub fn to_ssml(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for token in tokenize(text) {
        match token {
            Token::Text(t) => escape_into(&mut out, t),
            Token::Pause(ms) => {
                out.push_str(&format!("<break time=\"{ms}ms\"/>"));
            }
            Token::Tag(tag) => {
                out.push('[');
                escape_into(&mut out, tag);
                out.push(']');
            }
        }
    }
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Spoken words, excluding markers.
#[must_use]
pub fn count_words(text: &str) -> usize {
    tokenize(text)
        .iter()
        .map(|t| match t {
            Token::Text(s) => s
                .split_whitespace()
                .filter(|w| w.chars().any(char::is_alphanumeric))
                .count(),
            _ => 0,
        })
        .sum()
}

/// Number of audio tags (pauses excluded).
#[must_use]
pub fn count_tags(text: &str) -> usize {
    tokenize(text)
        .iter()
        .filter(|t| matches!(t, Token::Tag(_)))
        .count()
}

/// Durations of every pause marker, in order.
#[must_use]
pub fn break_durations(text: &str) -> Vec<u32> {
    tokenize(text)
        .into_iter()
        .filter_map(|t| match t {
            Token::Pause(ms) => Some(ms),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pause_forms() {
        assert_eq!(parse_pause("pause"), Some(500));
        assert_eq!(parse_pause("pause 300ms"), Some(300));
        assert_eq!(parse_pause("PAUSE 1.5s"), Some(1500));
        assert_eq!(parse_pause("pause 60s"), Some(MAX_PAUSE_MS));
        assert_eq!(parse_pause("pause soon"), None);
        assert_eq!(parse_pause("whispers"), None);
    }

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("Hi [whispers] there [pause 200ms] friend.");
        assert_eq!(
            tokens,
            vec![
                Token::Text("Hi "),
                Token::Tag("whispers"),
                Token::Text(" there "),
                Token::Pause(200),
                Token::Text(" friend."),
            ]
        );
    }

    #[test]
    fn test_unterminated_bracket_is_text() {
        assert_eq!(tokenize("a [b"), vec![Token::Text("a [b")]);
        assert_eq!(count_tags("a [] b"), 0);
    }

    #[test]
    fn test_to_ssml() {
        assert_eq!(
            to_ssml("Wait [pause] now & [laughs]"),
            "Wait <break time=\"500ms\"/> now &amp; [laughs]"
        );
    }

    #[test]
    fn test_counts() {
        let text = "One two [sighs] three. [pause 1s] Four [pause]";
        assert_eq!(count_words(text), 4);
        assert_eq!(count_tags(text), 1);
        assert_eq!(break_durations(text), vec![1000, 500]);
    }
}
