//! Lightweight language detection by function-word counts

use crate::config::LocalizationConfig;

/// Words sampled from the start of a text
const SAMPLE_WORDS: usize = 50;

fn function_words(language: &str) -> &'static [&'static str] {
    match language {
        "pl" => &[
            "jest", "nie", "się", "jak", "czy", "dla", "oraz", "który", "która", "które", "jakie",
            "jaki", "gdzie", "kiedy", "dlaczego", "proszę", "może", "jestem", "są", "też", "ale",
            "przez", "tego", "tym", "jeśli", "można",
        ],
        "en" => &[
            "the", "and", "what", "how", "where", "when", "why", "which", "this", "that", "with",
            "for", "are", "you", "can", "please", "from", "have", "does", "about", "there",
        ],
        "ro" => &[
            "este", "sunt", "pentru", "care", "cum", "unde", "când", "există", "acest", "această",
            "din", "sau", "mai", "poate", "vreau", "despre", "aceasta", "unei",
        ],
        "hu" => &[
            "hogy", "van", "nem", "egy", "mit", "hol", "mikor", "miért", "kérem", "vagy", "milyen",
            "melyik", "hogyan", "lehet", "kell", "ami", "amely", "nincs",
        ],
        "nl" => &[
            "het", "een", "van", "niet", "wat", "hoe", "waar", "wanneer", "waarom", "welke", "zijn",
            "voor", "met", "ook", "maar", "kunt", "graag", "deze", "dit",
        ],
        _ => &[],
    }
}

/// Guesses the language of user text among the supported ones
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    default_language: String,
    supported: Vec<String>,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(&LocalizationConfig::default())
    }
}

impl LanguageDetector {
    pub fn new(config: &LocalizationConfig) -> Self {
        Self {
            default_language: config.default_language.to_lowercase(),
            supported: config
                .supported_languages
                .iter()
                .map(|l| l.to_lowercase())
                .collect(),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Best-scoring supported language, or the default when nothing matches
    pub fn detect(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
            .take(SAMPLE_WORDS)
            .collect();

        let mut best: Option<(&str, usize)> = None;
        for language in &self.supported {
            let vocabulary = function_words(language);
            let score = words.iter().filter(|w| vocabulary.contains(*w)).count();
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((language.as_str(), score));
            }
        }

        let detected = best
            .map(|(language, _)| language.to_string())
            .unwrap_or_else(|| self.default_language.clone());

        tracing::debug!(language = %detected, sampled = words.len(), "Detected language");
        detected
    }

    /// Canonical supported code for `code` (`pl-PL` -> `pl`), else the default
    pub fn normalize(&self, code: &str) -> String {
        let base = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if self.supported.contains(&base) {
            base
        } else {
            self.default_language.clone()
        }
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|l| l.eq_ignore_ascii_case(code))
    }
}
