//! Message tokenization
//!
//! Deterministic text → words transform: URL-like substrings are deleted,
//! the remainder is split on a small delimiter class, tokens are lowercased,
//! and tokens shorter than three bytes are dropped. No Unicode segmentation,
//! no stemming; common words are suppressed downstream by the ranking
//! formula rather than by a blocklist. An optional stopword set can be
//! supplied for deployments that want an early filter anyway.

use std::collections::HashSet;

use regex::Regex;

/// Tokens shorter than this many bytes are dropped.
pub const MIN_WORD_LEN: usize = 3;

/// Scheme-or-host shaped substrings with an optional path/query/fragment
/// tail. Deleted before splitting.
const URL_PATTERN: &str = r"(([A-Za-z]{3,9}:(?://)?(?:[-;:&=+$,\w]+@)?[A-Za-z0-9.-]+|(?:www\.|[-;:&=+$,\w]+@)[A-Za-z0-9.-]+)((?:/[+~%/.\w_-]*)?\??(?:[-+=&;%@.\w_]*)#?(?:[\w]*))?)";

/// Split class: space, double quote, `.` `,` `!` `?` `:`, the CJK comma, and
/// newline.
const DELIMITER_PATTERN: &str = "[ \",.!?:、\n]";

/// Compiled tokenizer. Build once and share; the regexes are not cheap to
/// construct.
#[derive(Debug)]
pub struct Tokenizer {
    urls: Regex,
    delimiters: Regex,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_stopwords(HashSet::new())
    }

    /// Tokenizer with an early stopword filter. Stopwords are matched after
    /// case folding.
    pub fn with_stopwords(stopwords: HashSet<String>) -> Self {
        Self {
            urls: Regex::new(URL_PATTERN).expect("URL pattern compiles"),
            delimiters: Regex::new(DELIMITER_PATTERN).expect("delimiter pattern compiles"),
            stopwords,
        }
    }

    /// Transform one message into its countable words.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let stripped = self.urls.replace_all(text, "");
        self.delimiters
            .split(&stripped)
            .map(str::to_lowercase)
            .filter(|word| self.is_valid(word))
            .collect()
    }

    fn is_valid(&self, word: &str) -> bool {
        word.len() >= MIN_WORD_LEN && !self.stopwords.contains(word)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_lowercases() {
        let tokenizer = Tokenizer::new();
        assert_eq!(
            tokenizer.tokenize("The Quick,Brown!Fox"),
            vec!["the", "quick", "brown", "fox"]
        );
    }

    #[test]
    fn rejects_short_tokens() {
        let tokenizer = Tokenizer::new();
        // two bytes rejected, three accepted
        assert_eq!(tokenizer.tokenize("go fox at the"), vec!["fox", "the"]);
    }

    #[test]
    fn strips_urls_before_splitting() {
        let tokenizer = Tokenizer::new();
        assert_eq!(
            tokenizer.tokenize("check https://example.com/path?q=1 now"),
            vec!["check", "now"]
        );
        assert_eq!(
            tokenizer.tokenize("visit www.example.org please"),
            vec!["visit", "please"]
        );
        assert_eq!(
            tokenizer.tokenize("email me@example.com today"),
            vec!["email", "today"]
        );
    }

    #[test]
    fn splits_on_cjk_comma_and_quotes() {
        let tokenizer = Tokenizer::new();
        assert_eq!(
            tokenizer.tokenize("今日は、いい天気 \"quoted\""),
            vec!["今日は", "いい天気", "quoted"]
        );
    }

    #[test]
    fn keeps_hashtag_tokens() {
        // hashtags are counted; the ranker excludes them from results
        let tokenizer = Tokenizer::new();
        assert_eq!(
            tokenizer.tokenize("#Breaking story"),
            vec!["#breaking", "story"]
        );
    }

    #[test]
    fn idempotent_on_its_own_output() {
        let tokenizer = Tokenizer::new();
        let first = tokenizer.tokenize("Some Headline: words!words again");
        let second = tokenizer.tokenize(&first.join(" "));
        assert_eq!(first, second);
    }

    #[test]
    fn stopword_filter_applies_after_case_folding() {
        let stopwords = ["the".to_string()].into_iter().collect();
        let tokenizer = Tokenizer::with_stopwords(stopwords);
        assert_eq!(tokenizer.tokenize("The THE fox"), vec!["fox"]);
    }
}
