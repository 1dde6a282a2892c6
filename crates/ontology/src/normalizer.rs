use regex::Regex;
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[()\[\]:,;]").unwrap());
static HYPHEN_SPACING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-\s*").unwrap());

/// Normalize a label or mention for index lookups.
///
/// Both the index builder and the resolver go through this function; any
/// change here requires rebuilding the index artifact.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    let joined = HYPHEN_SPACING.replace_all(&stripped, "-");

    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
