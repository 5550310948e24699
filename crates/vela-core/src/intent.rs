//! Intent extraction.
//!
//! Pure keyword/phrase matching against the configured trigger table;
//! no network or model call on the routing path. Every matching trigger
//! set contributes its label to the tool fan-out; the intent label itself
//! is the highest-priority match, tie-broken by longest matched phrase.

use vela_config::schema::{IntentsConfig, TriggerSet};

/// Routing decision derived from one turn. Lives only for that turn's
/// processing.
#[derive(Debug, Clone)]
pub struct Intent {
    pub label: String,
    /// Matched keywords/phrases in order of appearance in the text.
    pub matched: Vec<String>,
    /// False only for the default "converse" fallback.
    pub confident: bool,
    /// Labels of every matching trigger set, highest priority first.
    pub tool_labels: Vec<String>,
}

impl Intent {
    pub fn converse() -> Self {
        Self {
            label: "converse".into(),
            matched: Vec::new(),
            confident: false,
            tool_labels: Vec::new(),
        }
    }

    /// Whether the turn asked for prior-context recall.
    pub fn wants_memory(&self) -> bool {
        self.tool_labels.iter().any(|l| l == "memory")
    }
}

struct SetMatch<'a> {
    set: &'a TriggerSet,
    /// (position in text, matched token)
    hits: Vec<(usize, String)>,
    longest_phrase: usize,
}

pub struct IntentExtractor {
    triggers: Vec<TriggerSet>,
}

impl IntentExtractor {
    pub fn new(config: &IntentsConfig) -> Self {
        Self {
            triggers: config.triggers.clone(),
        }
    }

    /// Extract the intent for a turn. Synchronous and side-effect free.
    pub fn extract(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();

        let mut matches: Vec<SetMatch> = self
            .triggers
            .iter()
            .filter_map(|set| match_set(set, &lower))
            .collect();

        if matches.is_empty() {
            return Intent::converse();
        }

        // Highest priority wins; tie-break on longest matched phrase.
        matches.sort_by(|a, b| {
            b.set
                .priority
                .cmp(&a.set.priority)
                .then(b.longest_phrase.cmp(&a.longest_phrase))
        });

        let mut matched: Vec<(usize, String)> = matches
            .iter()
            .flat_map(|m| m.hits.iter().cloned())
            .collect();
        matched.sort_by_key(|(pos, _)| *pos);
        matched.dedup_by(|a, b| a.1 == b.1);

        let mut tool_labels: Vec<String> = Vec::new();
        for m in &matches {
            if !tool_labels.contains(&m.set.label) {
                tool_labels.push(m.set.label.clone());
            }
        }

        Intent {
            label: matches[0].set.label.clone(),
            matched: matched.into_iter().map(|(_, token)| token).collect(),
            confident: true,
            tool_labels,
        }
    }
}

fn match_set<'a>(set: &'a TriggerSet, lower: &str) -> Option<SetMatch<'a>> {
    let mut hits = Vec::new();
    let mut longest_phrase = 0;

    for phrase in &set.phrases {
        let needle = phrase.to_lowercase();
        if let Some(pos) = lower.find(&needle) {
            longest_phrase = longest_phrase.max(needle.len());
            hits.push((pos, phrase.clone()));
        }
    }
    for keyword in &set.keywords {
        let needle = keyword.to_lowercase();
        if let Some(pos) = find_word(lower, &needle) {
            hits.push((pos, keyword.clone()));
        }
    }

    if hits.is_empty() {
        None
    } else {
        Some(SetMatch {
            set,
            hits,
            longest_phrase,
        })
    }
}

/// Find a keyword on word boundaries; multi-word keywords fall back to
/// substring search.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.contains(' ') {
        return haystack.find(needle);
    }
    let mut start = 0;
    while let Some(offset) = haystack[start..].find(needle) {
        let pos = start + offset;
        let before_ok = pos == 0
            || !haystack[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let end = pos + needle.len();
        let after_ok = end >= haystack.len()
            || !haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(pos);
        }
        start = end;
    }
    None
}
