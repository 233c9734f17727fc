//! Ordered model candidates for one connection.

/// The user's selection followed by the built-in fallbacks.
///
/// Consumed strictly left to right; the list only advances when the current
/// model is reported unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttemptList {
    models: Vec<String>,
    index: usize,
}

impl ModelAttemptList {
    /// Build the list with `selected` first. Blank entries and duplicates
    /// (compared case-insensitively) are dropped, keeping first occurrence.
    pub fn new(selected: &str, fallbacks: &[String]) -> Self {
        let mut models: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
        for candidate in std::iter::once(selected).chain(fallbacks.iter().map(String::as_str)) {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                continue;
            }
            if models
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(candidate))
            {
                continue;
            }
            models.push(candidate.to_string());
        }
        Self { models, index: 0 }
    }

    /// Model for the current attempt, if any remain.
    pub fn current(&self) -> Option<&str> {
        self.models.get(self.index).map(String::as_str)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Move to the next candidate. Returns `None` once the list is exhausted.
    pub fn advance(&mut self) -> Option<&str> {
        if self.index < self.models.len() {
            self.index += 1;
        }
        self.current()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}
