//! Family buckets keep near-duplicates (banana + bananas, two milks) out of one bundle.

use std::sync::OnceLock;

use super::rules::FamilyRules;

static DEFAULT_FAMILY_RULES: OnceLock<FamilyRules> = OnceLock::new();

/// Family bucket under the default rules.
pub fn family_key(name: &str) -> String {
    FamilyClassifier::new(DEFAULT_FAMILY_RULES.get_or_init(FamilyRules::default)).family_key(name)
}

#[derive(Debug, Clone, Copy)]
pub struct FamilyClassifier<'a> {
    rules: &'a FamilyRules,
}

impl<'a> FamilyClassifier<'a> {
    pub fn new(rules: &'a FamilyRules) -> Self {
        Self { rules }
    }

    pub fn family_key(&self, name: &str) -> String {
        let lowered = name.to_lowercase();

        if let Some(bucket) =
            self.rules.buckets.iter().find(|bucket| lowered.contains(bucket.needle.as_str()))
        {
            return bucket.family.clone();
        }

        let without_stop_words = self.strip_stop_words(&lowered);
        let letters_only: String = without_stop_words
            .chars()
            .map(|ch| if ch.is_ascii_lowercase() || ch.is_whitespace() { ch } else { ' ' })
            .collect();

        let key = letters_only
            .split_whitespace()
            .filter(|token| token.len() >= self.rules.min_token_len)
            .collect::<Vec<_>>()
            .join(" ");

        if key.is_empty() {
            return self.rules.fallback_family.clone();
        }

        // Only ASCII letters and spaces survive, so byte and char offsets agree.
        key[..key.len().min(self.rules.max_key_len)].to_owned()
    }

    pub fn same_family(&self, left: &str, right: &str) -> bool {
        self.family_key(left) == self.family_key(right)
    }

    /// Drops whole words found in the stop-list. A word is a maximal run of
    /// alphanumeric or underscore characters; everything between words is kept.
    fn strip_stop_words(&self, lowered: &str) -> String {
        let mut output = String::with_capacity(lowered.len());
        let mut word = String::new();

        for ch in lowered.chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                continue;
            }
            self.flush_word(&mut word, &mut output);
            output.push(ch);
        }
        self.flush_word(&mut word, &mut output);

        output
    }

    fn flush_word(&self, word: &mut String, output: &mut String) {
        if !self.rules.stop_words.iter().any(|stop| stop == word) {
            output.push_str(word);
        }
        word.clear();
    }
}
