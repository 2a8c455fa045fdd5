//! Shared types and error plumbing for parrot crates.

pub mod error;
pub mod types;

pub use error::FromMessage;

/// Split text into chunks no longer than `max_len` characters, preferring
/// line breaks, then word boundaries, as split points.
///
/// Used by platform layers with hard message-length limits (Discord: 2000).
#[must_use]
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() <= max_len {
            current.push_str(line);
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.chars().count() <= max_len {
            current.push_str(line);
            continue;
        }
        // Single line longer than the limit: fall back to word splits.
        for word in line.split_inclusive(' ') {
            if current.chars().count() + word.chars().count() > max_len {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                // Pathological unbroken run: hard-split on char boundaries.
                let mut rest = word;
                while rest.chars().count() > max_len {
                    let split_at = rest
                        .char_indices()
                        .nth(max_len)
                        .map_or(rest.len(), |(i, _)| i);
                    chunks.push(rest[..split_at].to_string());
                    rest = &rest[split_at..];
                }
                current.push_str(rest);
            } else {
                current.push_str(word);
            }
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 2000), vec!["hello".to_string()]);
    }

    #[test]
    fn splits_on_line_breaks_first() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = chunk_text(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn hard_splits_unbroken_runs() {
        let text = "x".repeat(25);
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 2000).is_empty());
    }
}
