//! Text normalisation, keyword extraction and hashing.
//!
//! Everything that turns raw dialogue into index terms lives here so the
//! episodic store and the relevance query agree on one tokenisation:
//! split on whitespace, lower-case, strip leading/trailing punctuation.

use std::hash::Hasher;

use twox_hash::XxHash64;

/// Fixed seed so word hashes are reproducible across runs.
const WORD_HASH_SEED: u64 = 0;

/// Tokens this short are ignored by both the index and the query.
pub const MIN_INDEX_TOKEN_CHARS: usize = 3;

/// Keywords stored on an episode must be longer than this.
const MIN_KEYWORD_CHARS: usize = 4;

/// Russian and English function words that carry no topic.
const STOP_WORDS: &[&str] = &[
    // RU
    "я", "ты", "он", "она", "мы", "вы", "они", "в", "на", "и", "с", "по", "для", "от", "к",
    "не", "что", "это", "как", "но", "если", "было", "быть", "есть", "этот", "эта", "эти",
    "тоже", "также", "очень", "чтобы", "когда", "который", "которая", "которые", "только",
    "можно", "нужно", "меня", "тебя", "него", "неё", "себя", "свой", "твой", "мной", "тебе",
    "потому", "всего", "через", "после", "перед", "между",
    // EN
    "the", "is", "are", "a", "an", "in", "on", "for", "to", "of", "and", "or", "but", "with",
    "this", "that", "these", "those", "from", "have", "has", "had", "been", "were", "was",
    "what", "when", "where", "which", "while", "about", "into", "your", "yours", "their",
    "there", "they", "them", "then", "than", "will", "would", "could", "should", "just",
    "some", "very", "also",
];

/// Lower-case a raw token and strip punctuation from both ends.
#[must_use]
pub fn normalize_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Normalised tokens of `text` that are long enough to index or query.
pub fn index_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(normalize_token)
        .filter(|t| t.chars().count() >= MIN_INDEX_TOKEN_CHARS)
}

/// Extract up to `limit` topic keywords from `text`, in order of appearance.
///
/// Duplicates are kept, mirroring how often a term was used.
#[must_use]
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_token)
        .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS && !is_stop_word(w))
        .take(limit)
        .collect()
}

/// Whether `word` (already lower-cased) is a stop word.
#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// 64-bit xxHash of a normalised word, used as the inverted-index key.
#[inline]
#[must_use]
pub fn word_hash(word: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(WORD_HASH_SEED);
    hasher.write(word.as_bytes());
    hasher.finish()
}

/// Collapse whitespace runs and trim, so trivially different spellings of
/// the same text address the same cache entry.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 128-bit BLAKE3 digest of the normalised text, as 32 hex characters.
#[must_use]
pub fn content_key(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    let hash = blake3::hash(normalized.as_bytes());
    hash.to_hex().as_str()[..32].to_string()
}

/// First `max_chars` characters of `text` (never splits a code point).
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_skip_short_and_stop_words() {
        let kw = extract_keywords("The weather in Moscow about tomorrow is cold", 10);
        assert_eq!(kw, vec!["weather", "moscow", "tomorrow", "cold"]);
    }

    #[test]
    fn keywords_are_capped() {
        let text = "alpha bravo charlie delta echoes foxtrot golfer hotel india juliet kilos lima";
        assert_eq!(extract_keywords(text, 10).len(), 10);
        assert_eq!(extract_keywords(text, 3), vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn keywords_handle_cyrillic() {
        let kw = extract_keywords("Какая погода будет завтра в Москве?", 10);
        assert_eq!(kw, vec!["какая", "погода", "будет", "завтра", "москве"]);
    }

    #[test]
    fn tokens_strip_punctuation_and_case() {
        let tokens: Vec<_> = index_tokens("Hi, Погода?! (tomorrow) a").collect();
        assert_eq!(tokens, vec!["погода", "tomorrow"]);
    }

    #[test]
    fn word_hash_is_deterministic() {
        assert_eq!(word_hash("погода"), word_hash("погода"));
        assert_ne!(word_hash("погода"), word_hash("завтра"));
    }

    #[test]
    fn content_key_ignores_whitespace_noise() {
        assert_eq!(content_key("hello   world "), content_key(" hello world"));
        assert_ne!(content_key("hello world"), content_key("hello worlds"));
        assert_eq!(content_key("x").len(), 32);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("привет мир", 6), "привет");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
