//! Sentence-boundary chunking.
//!
//! Sentences are merged greedily up to `max_chars`. A sentence longer than
//! the limit is split at clause punctuation, then at word boundaries as a
//! last resort. Bracketed markers are treated as single words and never
//! split.

/// Split text into chunks of at most `max_chars` bytes where possible.
///
/// A single marker or word longer than `max_chars` becomes its own
/// oversized chunk rather than being cut.
#[must_use]
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if !current.is_empty() && current.len() + 1 + sentence.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        if sentence.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_long_sentence(&sentence, max_chars));
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split at `.` `!` `?` followed by whitespace, outside of brackets.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' | '!' | '?' if depth == 0 => {
                if chars.peek().is_some_and(|n| n.is_whitespace()) {
                    push_trimmed(&mut sentences, &current);
                    current.clear();
                }
            }
            _ => {}
        }
    }

    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split an overlong sentence at clause boundaries, then words.
fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();

    for part in split_clauses(sentence) {
        if !current.is_empty() && current.len() + part.len() > max_chars {
            push_trimmed(&mut clauses, &std::mem::take(&mut current));
        }
        current.push_str(part);
    }
    push_trimmed(&mut clauses, &current);

    let mut chunks = Vec::new();
    for clause in clauses {
        if clause.len() > max_chars {
            chunks.extend(hard_split(&clause, max_chars));
        } else {
            chunks.push(clause);
        }
    }
    chunks
}

/// Inclusive split after `,` `;` `:` and dashes, outside of brackets.
fn split_clauses(sentence: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for (i, c) in sentence.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' | ';' | ':' | '—' | '–' if depth == 0 => {
                let end = i + c.len_utf8();
                parts.push(&sentence[start..end]);
                start = end;
            }
            _ => {}
        }
    }
    if start < sentence.len() {
        parts.push(&sentence[start..]);
    }
    parts
}

/// Whitespace-separated atoms with bracketed markers kept whole.
fn atoms(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c.is_whitespace() && depth == 0 {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Last-resort split at word boundaries.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in atoms(text) {
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
