use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static RE_WORD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Lowercase and drop diacritics ("Sécurité" -> "securite").
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// URL slug of a label: folded, with runs of anything else collapsed to "-".
pub fn slugify(text: &str) -> String {
    RE_NON_SLUG
        .replace_all(&fold(text), "-")
        .trim_matches('-')
        .to_string()
}

/// Folded words of a label, for keyword matching.
pub fn words(text: &str) -> Vec<String> {
    RE_WORD_SPLIT
        .split(&fold(text))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}
