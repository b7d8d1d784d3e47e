//! Query Processor - Classifies user queries and derives retrieval weights
//!
//! Provides:
//! - Intent classification (keywords, question, conversational, mixed)
//! - Key term extraction (quoted phrases, compound domain terms, tokens)
//! - Keyword/semantic weighting for hybrid retrieval

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Query processing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryProcessingResult {
    /// Query text handed to retrieval
    pub processed_query: String,

    /// Detected query type
    pub query_type: QueryType,

    /// Extracted key terms, lower-cased, first-seen order, no duplicates
    pub key_terms: Vec<String>,

    /// Weight of lexical scoring (0.0 - 1.0)
    pub keyword_weight: f64,

    /// Weight of vector scoring; always `1.0 - keyword_weight`
    pub semantic_weight: f64,
}

/// Query type classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Bare search terms
    Keywords,
    /// Explicit question
    Question,
    /// Chatty phrasing, greetings, filler
    Conversational,
    /// Several terms joined by connectors
    Mixed,
}

impl QueryType {
    /// (keyword_weight, semantic_weight) for this type
    pub fn weights(self) -> (f64, f64) {
        match self {
            QueryType::Keywords => (0.8, 0.2),
            QueryType::Question => (0.6, 0.4),
            QueryType::Mixed => (0.5, 0.5),
            QueryType::Conversational => (0.3, 0.7),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Keywords => "keywords",
            QueryType::Question => "question",
            QueryType::Conversational => "conversational",
            QueryType::Mixed => "mixed",
        }
    }
}

/// Query classification policy
///
/// Word lists are matched case-insensitively against tokens stripped of
/// surrounding punctuation. The built-in lists cover Polish and English.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryProcessorConfig {
    /// Words never used as key terms
    pub stop_words: Vec<String>,

    /// Words that make a query a question
    pub question_words: Vec<String>,

    /// Words that make a query conversational
    pub greeting_words: Vec<String>,

    /// Conjunctions that, with enough terms, make a query mixed
    pub connector_words: Vec<String>,

    /// Two-word domain phrases kept together as one key term
    pub compound_terms: Vec<String>,

    /// Tokens shorter than this (in characters) are dropped
    pub min_term_length: usize,

    /// Meaningful terms needed before connectors make a query mixed
    pub mixed_min_terms: usize,
}

impl Default for QueryProcessorConfig {
    fn default() -> Self {
        Self {
            stop_words: to_owned(&[
                // Polish
                "a", "aby", "ale", "ani", "być", "bez", "bardzo", "bo", "by", "dla", "do",
                "gdy", "go", "i", "ich", "im", "ja", "jako", "je", "jego", "jej", "jest",
                "już", "lub", "ma", "mi", "może", "na", "nad", "nie", "o", "od", "oraz",
                "po", "pod", "się", "są", "ta", "tak", "te", "to", "tu", "w", "we", "z",
                "za", "że", "mnie", "dzięki", "dziękuję", "proszę", "pomocy", "pomóż",
                "powiedz", "pokaż", "pokarz",
                // English
                "an", "the", "is", "are", "was", "were", "be", "been", "in", "on", "at",
                "for", "of", "with", "by", "from", "and", "or", "but", "not", "this",
                "that", "these", "those", "it", "its", "as", "do", "does", "did", "has",
                "have", "had", "can", "could", "will", "would", "should", "me", "my",
                "please", "thanks", "tell", "show",
            ]),
            question_words: to_owned(&[
                "jak", "co", "gdzie", "kiedy", "dlaczego", "czy", "kto", "ile", "jakie",
                "jaki", "jaka", "która", "które", "który", "what", "who", "where", "when",
                "why", "how", "which", "whom", "whose",
            ]),
            greeting_words: to_owned(&[
                "cześć", "dzień", "dobry", "witaj", "witam", "hej", "hello", "hi", "hey",
            ]),
            connector_words: to_owned(&["i", "oraz", "lub", "albo", "o", "and", "or", "about"]),
            compound_terms: to_owned(&[
                "raport należności",
                "sprawozdanie finansowe",
                "proces logistyczny",
                "zamówienie zakupu",
                "faktura vat",
                "dokument księgowy",
            ]),
            min_term_length: 2,
            mixed_min_terms: 3,
        }
    }
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn quoted_phrase_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([^"]*)""#).ok()).as_ref()
}

/// Token of the normalized query
#[derive(Debug)]
struct Token {
    /// Byte offset in the normalized query
    start: usize,
    /// Lower-cased text without surrounding punctuation
    text: String,
    /// Inside a quoted phrase
    quoted: bool,
}

/// Query processor for classifying user queries
pub struct QueryProcessor {
    stop_words: HashSet<String>,
    question_words: HashSet<String>,
    greeting_words: HashSet<String>,
    connector_words: HashSet<String>,
    compound_terms: Vec<Vec<String>>,
    min_term_length: usize,
    mixed_min_terms: usize,
}

impl Default for QueryProcessor {
    fn default() -> Self {
        Self::new(QueryProcessorConfig::default())
    }
}

impl QueryProcessor {
    /// Create a new query processor from a classification policy
    pub fn new(config: QueryProcessorConfig) -> Self {
        let lower = |words: &[String]| -> HashSet<String> {
            words.iter().map(|w| w.to_lowercase()).collect()
        };

        let question_words = lower(&config.question_words);
        let greeting_words = lower(&config.greeting_words);

        // Question words and greetings never carry retrieval meaning
        let mut stop_words = lower(&config.stop_words);
        stop_words.extend(question_words.iter().cloned());
        stop_words.extend(greeting_words.iter().cloned());

        let compound_terms = config
            .compound_terms
            .iter()
            .map(|term| term.split_whitespace().map(|w| w.to_lowercase()).collect::<Vec<_>>())
            .filter(|words| !words.is_empty())
            .collect();

        Self {
            stop_words,
            question_words,
            greeting_words,
            connector_words: lower(&config.connector_words),
            compound_terms,
            min_term_length: config.min_term_length,
            mixed_min_terms: config.mixed_min_terms,
        }
    }

    /// Classify a query and extract its key terms
    pub fn process_query(&self, query: &str) -> QueryProcessingResult {
        if query.trim().is_empty() {
            let (keyword_weight, semantic_weight) = QueryType::Keywords.weights();
            return QueryProcessingResult {
                processed_query: query.to_string(),
                query_type: QueryType::Keywords,
                key_terms: Vec::new(),
                keyword_weight,
                semantic_weight,
            };
        }

        let normalized = normalize_whitespace(query);
        let tokens = self.tokenize(&normalized);

        let query_type = self.classify(&normalized, &tokens);
        let key_terms = self.extract_key_terms(&normalized, &tokens);
        let processed_query = self.create_processed_query(&normalized, &tokens, &key_terms, query_type);
        let (keyword_weight, semantic_weight) = query_type.weights();

        tracing::debug!(
            original = %query,
            query_type = query_type.as_str(),
            key_terms = %key_terms.join(", "),
            processed = %processed_query,
            "Query processed"
        );

        QueryProcessingResult {
            processed_query,
            query_type,
            key_terms,
            keyword_weight,
            semantic_weight,
        }
    }

    /// Split the normalized query, marking words inside quoted phrases
    fn tokenize(&self, normalized: &str) -> Vec<Token> {
        let quoted_spans: Vec<(usize, usize)> = quoted_phrase_pattern()
            .map(|pattern| {
                pattern
                    .find_iter(normalized)
                    .map(|m| (m.start(), m.end()))
                    .collect()
            })
            .unwrap_or_default();

        let mut tokens = Vec::new();
        let mut offset = 0;
        for word in normalized.split(' ') {
            let start = offset;
            offset += word.len() + 1;

            let text = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if text.is_empty() {
                continue;
            }

            let quoted = quoted_spans
                .iter()
                .any(|&(span_start, span_end)| start >= span_start && start < span_end);

            tokens.push(Token { start, text, quoted });
        }

        tokens
    }

    /// Determine query type; earlier rules win
    fn classify(&self, normalized: &str, tokens: &[Token]) -> QueryType {
        let has_question_word = tokens.iter().any(|t| self.question_words.contains(&t.text));
        if normalized.contains('?') || has_question_word {
            return QueryType::Question;
        }

        let meaningful = tokens.iter().filter(|t| !self.stop_words.contains(&t.text)).count();
        let has_greeting = tokens.iter().any(|t| self.greeting_words.contains(&t.text));
        if has_greeting || tokens.len() > meaningful * 2 {
            return QueryType::Conversational;
        }

        let has_connector = tokens.iter().any(|t| self.connector_words.contains(&t.text));
        if meaningful >= self.mixed_min_terms && has_connector {
            return QueryType::Mixed;
        }

        QueryType::Keywords
    }

    /// Collect quoted phrases, compound terms and meaningful tokens in
    /// order of appearance
    fn extract_key_terms(&self, normalized: &str, tokens: &[Token]) -> Vec<String> {
        // (position, rank, term); phrases sort ahead of a token at the same spot
        let mut found: Vec<(usize, u8, String)> = Vec::new();

        if let Some(pattern) = quoted_phrase_pattern() {
            for captures in pattern.captures_iter(normalized) {
                if let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) {
                    let phrase = inner.as_str().trim().to_lowercase();
                    if !phrase.is_empty() {
                        found.push((whole.start(), 0, phrase));
                    }
                }
            }
        }

        let unquoted: Vec<&Token> = tokens.iter().filter(|t| !t.quoted).collect();
        for words in &self.compound_terms {
            if words.len() > unquoted.len() {
                continue;
            }
            for window in unquoted.windows(words.len()) {
                if window.iter().zip(words).all(|(token, word)| &token.text == word) {
                    found.push((window[0].start, 0, words.join(" ")));
                }
            }
        }

        for token in unquoted {
            if token.text.chars().count() < self.min_term_length
                || self.stop_words.contains(&token.text)
            {
                continue;
            }
            found.push((token.start, 1, token.text.clone()));
        }

        found.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter_map(|(_, _, term)| seen.insert(term.clone()).then_some(term))
            .collect()
    }

    /// Build the text sent to retrieval for the given type
    fn create_processed_query(
        &self,
        normalized: &str,
        tokens: &[Token],
        key_terms: &[String],
        query_type: QueryType,
    ) -> String {
        match query_type {
            QueryType::Keywords => normalized.to_string(),

            QueryType::Conversational => {
                if key_terms.is_empty() {
                    normalized.to_string()
                } else {
                    key_terms.join(" ")
                }
            }

            QueryType::Question => {
                // Keep the question words for context, then the key terms
                let mut seen = HashSet::new();
                let combined: Vec<&str> = tokens
                    .iter()
                    .filter(|t| self.question_words.contains(&t.text))
                    .map(|t| t.text.as_str())
                    .chain(key_terms.iter().map(String::as_str))
                    .filter(|term| seen.insert(*term))
                    .collect();

                if combined.is_empty() {
                    normalized.to_string()
                } else {
                    combined.join(" ")
                }
            }

            QueryType::Mixed => {
                if key_terms.is_empty() {
                    normalized.to_string()
                } else {
                    format!("{} {}", key_terms.join(" "), normalized)
                }
            }
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim
fn normalize_whitespace(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> QueryProcessor {
        QueryProcessor::default()
    }

    #[test]
    fn test_empty_query_is_keywords() {
        let result = processor().process_query("");

        assert_eq!(result.query_type, QueryType::Keywords);
        assert_eq!(result.processed_query, "");
        assert!(result.key_terms.is_empty());
        assert_eq!((result.keyword_weight, result.semantic_weight), (0.8, 0.2));
    }

    #[test]
    fn test_whitespace_query_is_returned_verbatim() {
        let result = processor().process_query("   \t\n  ");

        assert_eq!(result.query_type, QueryType::Keywords);
        assert_eq!(result.processed_query, "   \t\n  ");
    }

    #[test]
    fn test_question_mark_makes_question() {
        let result = processor().process_query("Jak działa system?");

        assert_eq!(result.query_type, QueryType::Question);
        assert_eq!((result.keyword_weight, result.semantic_weight), (0.6, 0.4));
        assert!(result.processed_query.contains("działa"));
        assert!(result.processed_query.contains("system"));
        assert_eq!(result.key_terms, vec!["działa", "system"]);
    }

    #[test]
    fn test_question_word_without_mark() {
        let result = processor().process_query("Co to jest RAG");

        assert_eq!(result.query_type, QueryType::Question);
        assert!(result.key_terms.contains(&"rag".to_string()));
        assert!(!result.key_terms.contains(&"co".to_string()));
    }

    #[test]
    fn test_english_question_word() {
        let result = processor().process_query("what is the invoice approval flow");

        assert_eq!(result.query_type, QueryType::Question);
        assert_eq!(result.key_terms, vec!["invoice", "approval", "flow"]);
    }

    #[test]
    fn test_question_rule_wins_over_greeting() {
        let result = processor().process_query("Cześć, gdzie jest faktura?");

        assert_eq!(result.query_type, QueryType::Question);
    }

    #[test]
    fn test_greeting_makes_conversational() {
        let result = processor().process_query("Cześć pomóż mi proszę bardzo znaleźć dokumenty");

        assert_eq!(result.query_type, QueryType::Conversational);
        assert_eq!((result.keyword_weight, result.semantic_weight), (0.3, 0.7));
        assert_eq!(result.processed_query, "znaleźć dokumenty");
    }

    #[test]
    fn test_filler_heavy_query_is_conversational() {
        // 6 tokens, 2 meaningful
        let result = processor().process_query("proszę bardzo to jest raport kwartalny");

        assert_eq!(result.query_type, QueryType::Conversational);
    }

    #[test]
    fn test_keywords_query() {
        let result = processor().process_query("dokument faktura VAT");

        assert_eq!(result.query_type, QueryType::Keywords);
        assert_eq!((result.keyword_weight, result.semantic_weight), (0.8, 0.2));
        assert_eq!(result.processed_query, "dokument faktura VAT");
        assert!(result.key_terms.contains(&"faktura vat".to_string()));
        assert!(result.key_terms.contains(&"dokument".to_string()));
    }

    #[test]
    fn test_connectors_with_enough_terms_make_mixed() {
        let result = processor().process_query("pokaż proces logistyczny i zamówienie zakupu");

        assert_eq!(result.query_type, QueryType::Mixed);
        assert_eq!((result.keyword_weight, result.semantic_weight), (0.5, 0.5));
        assert!(result.key_terms.contains(&"proces logistyczny".to_string()));
        assert!(result.key_terms.contains(&"zamówienie zakupu".to_string()));
        assert!(result.processed_query.ends_with("pokaż proces logistyczny i zamówienie zakupu"));
    }

    #[test]
    fn test_stop_words_removed() {
        let result = processor().process_query("jak znaleźć dokument o fakturze");

        assert!(!result.key_terms.contains(&"jak".to_string()));
        assert!(!result.key_terms.contains(&"o".to_string()));
        assert_eq!(result.key_terms, vec!["znaleźć", "dokument", "fakturze"]);
    }

    #[test]
    fn test_quoted_phrases_kept_whole() {
        let result = processor().process_query("znajdź \"raport należności\" i \"Sprawozdanie finansowe\"");

        assert_eq!(
            result.key_terms,
            vec!["znajdź", "raport należności", "sprawozdanie finansowe"]
        );
    }

    #[test]
    fn test_duplicates_removed_case_folded() {
        let result = processor().process_query("Faktura faktura FAKTURA");

        assert_eq!(result.key_terms, vec!["faktura"]);
    }

    #[test]
    fn test_short_tokens_dropped() {
        let result = processor().process_query("x raport y");

        assert_eq!(result.key_terms, vec!["raport"]);
    }

    #[test]
    fn test_whitespace_normalized() {
        let result = processor().process_query("dokument    faktura   VAT");

        assert_eq!(result.processed_query, "dokument faktura VAT");
    }

    #[test]
    fn test_weights_always_sum_to_one() {
        let queries = [
            "",
            "?",
            "...",
            "hello",
            "Jak działa system?",
            "dokument faktura VAT",
            "pokaż proces logistyczny i zamówienie zakupu",
            "witam bardzo proszę pomóż mi",
            "\"quoted only\"",
        ];

        for query in queries {
            let result = processor().process_query(query);
            assert!(
                (result.keyword_weight + result.semantic_weight - 1.0).abs() < 1e-12,
                "weights for {query:?} do not sum to 1"
            );
        }
    }

    #[test]
    fn test_processing_is_deterministic() {
        let processor = processor();
        let query = "Witam, czy mogę prosić o \"raport należności\" i fakturę VAT?";

        assert_eq!(processor.process_query(query), processor.process_query(query));
    }

    #[test]
    fn test_custom_policy() {
        let config = QueryProcessorConfig {
            compound_terms: vec!["umowa ramowa".to_string()],
            ..QueryProcessorConfig::default()
        };
        let result = QueryProcessor::new(config).process_query("Umowa ramowa 2024");

        assert_eq!(result.key_terms, vec!["umowa ramowa", "umowa", "ramowa", "2024"]);
    }
}
