use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;

pub const DEFAULT_TOP_K_UNIGRAMS: usize = 20;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub tokens: Vec<String>,
}

impl NormalizedText {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Debug)]
pub struct TextNormalizer {
    bracketed: Regex,
    non_word: Regex,
    stop_words: HashSet<&'static str>,
    top_k_unigrams: Option<usize>,
}

impl TextNormalizer {
    pub fn new(top_k_unigrams: Option<usize>) -> Result<Self> {
        let bracketed =
            Regex::new(r"\[.*?\]|\(.*?\)").context("failed to compile bracket regex")?;
        let non_word = Regex::new(r"\W+").context("failed to compile non-word regex")?;

        Ok(Self {
            bracketed,
            non_word,
            stop_words: ENGLISH_STOP_WORDS.iter().copied().collect(),
            top_k_unigrams,
        })
    }

    pub fn normalize(&self, fragments: &[String]) -> NormalizedText {
        let joined = fragments.join(" ").trim().to_lowercase();
        let without_brackets = self.bracketed.replace_all(&joined, " ");

        // Apostrophes survive so that contractions still match the stop-word list.
        let words = without_brackets
            .split_whitespace()
            .map(|word| word.trim_matches('\''))
            .filter(|word| !word.is_empty() && !self.stop_words.contains(word))
            .flat_map(|word| self.non_word.split(word).map(str::to_string).collect::<Vec<_>>())
            .filter(|token| !token.is_empty() && !self.stop_words.contains(token.as_str()))
            .collect::<Vec<String>>();

        let text = words.join(" ");
        let tokens = match self.top_k_unigrams {
            Some(limit) => most_common_unigrams(&words, limit),
            None => words,
        };

        NormalizedText { text, tokens }
    }
}

// Ties keep first-occurrence order.
pub fn most_common_unigrams(tokens: &[String], limit: usize) -> Vec<String> {
    let mut counts = HashMap::<&str, (usize, usize)>::new();
    for (index, token) in tokens.iter().enumerate() {
        counts.entry(token.as_str()).or_insert((0, index)).0 += 1;
    }

    let mut ranked = counts.into_iter().collect::<Vec<(&str, (usize, usize))>>();
    ranked.sort_by(|left, right| {
        right
            .1
            .0
            .cmp(&left.1.0)
            .then_with(|| left.1.1.cmp(&right.1.1))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _)| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn normalize_lowercases_and_drops_stop_words() {
        let normalizer = TextNormalizer::new(None).expect("regexes compile");
        let normalized = normalizer.normalize(&fragments(&["Vaccines are safe", "and effective"]));
        assert_eq!(normalized.text, "vaccines safe effective");
        assert_eq!(normalized.tokens, vec!["vaccines", "safe", "effective"]);
    }

    #[test]
    fn normalize_strips_brackets_and_punctuation() {
        let normalizer = TextNormalizer::new(None).expect("regexes compile");
        let normalized =
            normalizer.normalize(&fragments(&["Says [sic] the senator (R-TX) lied: \"taxes!\""]));
        assert_eq!(normalized.tokens, vec!["says", "senator", "lied", "taxes"]);
    }

    #[test]
    fn normalize_drops_contractions_on_the_stop_list() {
        let normalizer = TextNormalizer::new(None).expect("regexes compile");
        let normalized = normalizer.normalize(&fragments(&["It's not what you'd expect"]));
        assert_eq!(normalized.tokens, vec!["expect"]);
    }

    #[test]
    fn normalize_of_empty_fragments_is_empty() {
        let normalizer = TextNormalizer::new(Some(20)).expect("regexes compile");
        assert!(normalizer.normalize(&[]).is_empty());
        assert!(normalizer.normalize(&fragments(&["the and of"])).is_empty());
    }

    #[test]
    fn top_k_keeps_most_frequent_tokens_in_first_seen_order_on_ties() {
        let tokens = fragments(&["tax", "cut", "tax", "jobs", "cut", "tax", "wage"]);
        assert_eq!(most_common_unigrams(&tokens, 3), vec!["tax", "cut", "jobs"]);
        assert_eq!(most_common_unigrams(&tokens, 0), Vec::<String>::new());
    }
}
