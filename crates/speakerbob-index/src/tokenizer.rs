//! Splits free text into lowercase search tokens.

/// Split `text` into its lowercase alphanumeric runs, in order.
///
/// Whitespace and punctuation separate tokens and are dropped. Empty input,
/// or input with no alphanumeric characters, yields no tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|run| !run.is_empty())
        .map(str::to_lowercase)
        .collect()
}
