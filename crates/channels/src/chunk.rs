/// Chunk size for platforms without a configured limit.
pub const DEFAULT_CHUNK_SIZE: usize = 3900;

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Splits fall on character boundaries only, so the chunks concatenate back to
/// the input exactly. Empty input yields no chunks. A zero limit is treated
/// as one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn splits_long_text_into_exact_pieces() {
        let text = "x".repeat(10_050);
        let chunks = chunk_text(&text, 3900);
        let sizes: Vec<_> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(sizes, vec![3900, 3900, 2250]);
        assert_eq!(chunks.concat(), text);
    }

    #[rstest]
    #[case("", 10, 0)]
    #[case("short", 10, 1)]
    #[case("exactly10!", 10, 1)]
    #[case("exactly10!x", 10, 2)]
    #[case("abc", 0, 3)]
    fn chunk_counts(#[case] text: &str, #[case] max: usize, #[case] expected: usize) {
        assert_eq!(chunk_text(text, max).len(), expected);
    }

    #[test]
    fn never_splits_inside_a_character() {
        let text = "🧠".repeat(5);
        let chunks = chunk_text(&text, 2);
        assert_eq!(chunks, vec!["🧠🧠", "🧠🧠", "🧠"]);
    }
}
