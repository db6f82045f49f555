use serde::{Deserialize, Serialize};

/// The broad category of a `ContextError`, used by callers which need to react differently
/// to, for example, a missing template and a malformed one.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The template file does not exist or cannot be read.
    MissingTemplate,
    /// The template file is not a PDF or has fewer pages than required.
    MalformedTemplate,
    /// A font file does not exist or cannot be read.
    MissingFont,
    /// A font file could not be parsed.
    MalformedFont,
    /// The configuration file could not be read or parsed.
    Configuration,
    /// Reading or writing a file failed.
    Io,
    /// The PDF document could not be manipulated or serialized.
    #[default]
    Pdf,
}

/// A struct that represents an error with a context and possibly the propagated source error.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextError {
    /// What went wrong, broadly.
    pub kind: ErrorKind,
    /// The message describing the context in which the error occurred.
    pub context: String,
    /// The message of the error which caused this one, if any.
    pub source_error: Option<String>,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_error {
            Some(source_error) => write!(
                formatter,
                "{}: {}",
                self.context,
                minimize_first_letter(source_error.to_string()),
            ),
            None => write!(formatter, "{}", self.context),
        }
    }
}

impl std::error::Error for ContextError {}

impl ContextError {
    /// Create a new `ContextError` with the given context.
    pub fn with_context<S: Into<String>>(context: S) -> ContextError {
        ContextError {
            kind: ErrorKind::default(),
            context: context.into(),
            source_error: None,
        }
    }

    /// Create a new `ContextError` with the given context and source error.
    pub fn with_error<S: Into<String>>(context: S, error: &dyn std::error::Error) -> ContextError {
        ContextError {
            kind: ErrorKind::default(),
            context: context.into(),
            source_error: Some(error.to_string()),
        }
    }

    /// Tag the error with the given kind.
    pub fn of_kind(mut self, kind: ErrorKind) -> ContextError {
        self.kind = kind;
        self
    }
}

/// Minimizes the first letter of a string, it is used for standardizing the error message.
fn minimize_first_letter(string: String) -> String {
    let mut characters = string.chars();
    match characters.next() {
        None => String::new(),
        Some(character) => character.to_lowercase().chain(characters).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_chains_the_source_error() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file");
        let error = ContextError::with_error("Failed to read the template", &source)
            .of_kind(ErrorKind::MissingTemplate);

        assert_eq!(error.to_string(), "Failed to read the template: no such file");
        assert_eq!(error.kind, ErrorKind::MissingTemplate);
    }

    #[test]
    fn errors_default_to_the_pdf_kind() {
        let error = ContextError::with_context("Unable to encode the overlay");

        assert_eq!(error.kind, ErrorKind::Pdf);
        assert_eq!(error.to_string(), "Unable to encode the overlay");
    }
}
