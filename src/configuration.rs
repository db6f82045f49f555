use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ContextError, ErrorKind};
use crate::fonts::FontSources;
use crate::layout::CardLayout;

/// Everything the service needs to know about its assets and surroundings. Every field has a
/// default, so a configuration file only needs to list what differs from them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CardConfiguration {
    /// The PDF template whose second page receives the card details.
    pub template_path: PathBuf,
    /// The heavy and regular font faces of the card.
    pub fonts: FontSources,
    /// The positions, sizes and colors of the card texts.
    pub layout: CardLayout,
    /// The CSV file every submission is appended to.
    pub submission_log_path: PathBuf,
    /// Where the generated cards are written before being sent, the OS temporary directory if unset.
    pub output_directory: Option<PathBuf>,
    /// The `host:port` the web service listens on.
    pub bind_address: String,
}

impl Default for CardConfiguration {
    fn default() -> Self {
        CardConfiguration {
            template_path: "Visiting_Card_New.pdf".into(),
            fonts: FontSources::default(),
            layout: CardLayout::default(),
            submission_log_path: "submissions_log.csv".into(),
            output_directory: None,
            bind_address: "0.0.0.0:5001".into(),
        }
    }
}

impl CardConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to read the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
                .of_kind(ErrorKind::Configuration)
            })?;
        let configuration: CardConfiguration = serde_json::from_str(&configuration_file_contents)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to parse the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
                .of_kind(ErrorKind::Configuration)
            })?;

        Ok(configuration)
    }

    pub fn output_directory(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontSource;
    use std::io::Write as _;

    #[test]
    fn partial_configuration_files_keep_the_defaults() {
        let mut configuration_file = tempfile::NamedTempFile::new().unwrap();
        write!(
            configuration_file,
            r#"{{
                "templatePath": "assets/template.pdf",
                "fonts": {{
                    "heavy": {{ "standard": "Helvetica-Bold" }},
                    "regular": {{ "standard": "Helvetica" }}
                }},
                "layout": {{ "nameWrapWidth": 18 }}
            }}"#
        )
        .unwrap();

        let configuration = CardConfiguration::from_path(configuration_file.path()).unwrap();

        assert_eq!(configuration.template_path, PathBuf::from("assets/template.pdf"));
        assert_eq!(
            configuration.fonts.heavy,
            FontSource::Standard("Helvetica-Bold".into())
        );
        assert_eq!(configuration.layout.name_wrap_width, 18);
        assert_eq!(configuration.layout.address_lines.len(), 3);
        assert_eq!(configuration.bind_address, "0.0.0.0:5001");
        assert_eq!(configuration.output_directory(), std::env::temp_dir());
    }

    #[test]
    fn unreadable_configuration_files_are_reported() {
        let error =
            CardConfiguration::from_path(Path::new("does/not/exist.json")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);

        let mut configuration_file = tempfile::NamedTempFile::new().unwrap();
        write!(configuration_file, r#"{{ "layout": {{ "nameColor": "red" }} }}"#).unwrap();
        let error = CardConfiguration::from_path(configuration_file.path()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }
}
