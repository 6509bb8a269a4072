/// Controlled text field for the location label.
///
/// The field owns the visible text. Edits come in as whole new contents;
/// the commit key never inserts a line break and does not submit anything on
/// its own. Submission happens through the pipeline's debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInput {
    text: String,
}

impl QueryInput {
    pub fn new(initial: impl Into<String>) -> Self {
        Self { text: initial.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Apply an edit. Returns the new query when the visible text changed and
    /// is not empty; an empty edit leaves the last query in place.
    pub fn edit(&mut self, raw: &str) -> Option<&str> {
        let cleaned: String = raw.chars().filter(|c| !matches!(c, '\r' | '\n')).collect();

        if cleaned.is_empty() || cleaned == self.text {
            return None;
        }

        self.text = cleaned;
        Some(&self.text)
    }

    /// Overwrite the text without going through an edit, e.g. after the
    /// location has been resolved from coordinates.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

impl Default for QueryInput {
    fn default() -> Self {
        Self::new(crate::pipeline::DEFAULT_QUERY)
    }
}
