use serde::{Deserialize, Serialize};

/// The language every room starts in before a participant picks another one.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Starter source text a problem ships for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarterSnippet {
    // The language identifier the snippet is written for.
    #[serde(rename = "l")]
    pub language: String,
    // The starter source text.
    #[serde(rename = "c")]
    pub code: String,
}

/// A problem definition as supplied by the client that selected it.
///
/// The broker never fetches problems itself; the full definition travels
/// inside the `problem_change` command and is broadcast onwards as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    // The identifier of the problem.
    #[serde(rename = "i")]
    pub id: String,
    // The display title of the problem.
    #[serde(rename = "t")]
    pub title: String,
    // The full problem statement.
    #[serde(rename = "d")]
    pub description: String,
    // Per-language starter source texts.
    #[serde(rename = "s")]
    pub starter_snippets: Vec<StarterSnippet>,
}

impl Problem {
    /// Starter source text for the given language, if the problem ships one.
    ///
    /// Absence of a match is not an error; callers leave the current room
    /// code untouched in that case. Both the server store and the client side
    /// reducer resolve snippets through this single helper so a language or
    /// problem change computes the same code on every participant.
    pub fn snippet_for(&self, language: &str) -> Option<&str> {
        self.starter_snippets
            .iter()
            .find(|snippet| snippet.language == language)
            .map(|snippet| snippet.code.as_str())
    }
}
