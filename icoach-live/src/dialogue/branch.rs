//! Engineering branch resolution
//!
//! The classifier provider gets the first say. Only when it fails outright
//! does resolution fall back to the local synonym table; a confident
//! `UNKNOWN` from the provider leaves the branch unresolved.

use crate::providers::{BranchClassifier, BranchGuess, Probe, ProviderError};
use tracing::{debug, warn};

/// Synonym to canonical branch, checked in order, first match wins
///
/// Longer phrases come before the short abbreviations they contain.
const BRANCH_SYNONYMS: [(&str, &str); 14] = [
    ("computer science", "CSE"),
    ("information science", "CSE"),
    ("artificial intelligence", "CSE"),
    ("electronics", "EC"),
    ("electrical", "EEE"),
    ("mechanical", "MECHANICAL"),
    ("civil", "CIVIL"),
    ("cse", "CSE"),
    ("ise", "CSE"),
    ("eee", "EEE"),
    ("mech", "MECHANICAL"),
    ("ece", "EC"),
    ("ec", "EC"),
    ("ai", "CSE"),
];

fn find_known<'a>(branch: &str, known_branches: &'a [String]) -> Option<&'a String> {
    known_branches.iter().find(|known| known.eq_ignore_ascii_case(branch))
}

/// Resolve free text against the synonym table, then against branch ids
///
/// Canonical names missing from a non-empty known set are skipped. Returns
/// the branch as spelled in `known_branches` when it is listed there.
pub fn synonym_lookup(text: &str, known_branches: &[String]) -> Option<String> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    for (synonym, canonical) in BRANCH_SYNONYMS {
        if !normalized.contains(synonym) {
            continue;
        }
        if known_branches.is_empty() {
            return Some(canonical.to_string());
        }
        if let Some(known) = find_known(canonical, known_branches) {
            return Some(known.clone());
        }
    }

    known_branches
        .iter()
        .find(|known| normalized.contains(&known.to_lowercase()))
        .cloned()
}

/// Resolve the candidate's branch, or `None` if it stays unknown
pub fn resolve_branch(
    text: &str,
    known_branches: &[String],
    classifier: &dyn BranchClassifier,
) -> Option<String> {
    let normalized = text.trim();
    if normalized.is_empty() {
        return None;
    }

    match classifier.classify(normalized, known_branches) {
        Ok(guess) if guess.is_unknown() => {
            debug!(classifier = classifier.name(), "Branch not recognized");
            None
        }
        Ok(guess) => {
            let resolved = find_known(&guess.branch, known_branches).cloned();
            if resolved.is_none() {
                debug!(
                    classifier = classifier.name(),
                    branch = %guess.branch,
                    "Classifier returned a branch outside the known set"
                );
            }
            resolved
        }
        Err(e) => {
            warn!(
                classifier = classifier.name(),
                "Branch classification failed, using synonym table: {}", e
            );
            synonym_lookup(normalized, known_branches)
        }
    }
}

/// Classifier backed only by the synonym table
pub struct SynonymBranchClassifier;

impl Probe for SynonymBranchClassifier {
    fn name(&self) -> &'static str {
        "synonym_table"
    }
}

impl BranchClassifier for SynonymBranchClassifier {
    fn classify(&self, text: &str, known_branches: &[String]) -> Result<BranchGuess, ProviderError> {
        Ok(match synonym_lookup(text, known_branches) {
            Some(branch) => BranchGuess {
                branch,
                confidence: 1.0,
            },
            None => BranchGuess::unknown(),
        })
    }
}
