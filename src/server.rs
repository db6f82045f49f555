use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::card::{CardGenerator, CardRequest};
use crate::configuration::CardConfiguration;
use crate::error::{ContextError, ErrorKind};
use crate::submission_log::SubmissionLog;

/// The HTML form served on `GET /`.
pub const FORM_PAGE: &str = include_str!("../assets/index.html");

/// The fields of the card form, named as in the HTML page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardForm {
    /// The full name, despite the field name of the form.
    pub firstname: String,
    /// The role or title.
    pub role: String,
    /// The email address.
    pub email: String,
    /// The phone number.
    pub contact_number: String,
}

impl From<CardForm> for CardRequest {
    fn from(form: CardForm) -> Self {
        CardRequest {
            name: form.firstname,
            role: form.role,
            email: form.email,
            phone: form.contact_number,
        }
    }
}

/// What every request handler has access to.
#[derive(Debug)]
pub struct AppState {
    /// Draws the cards, with the fonts registered once for all the requests.
    pub generator: CardGenerator,
    /// Where every submission is recorded before its card is generated.
    pub submission_log: SubmissionLog,
    /// Where the cards are written before being sent back.
    pub output_directory: PathBuf,
}

impl AppState {
    pub fn from_configuration(configuration: &CardConfiguration) -> Self {
        AppState {
            generator: CardGenerator::from_configuration(configuration),
            submission_log: SubmissionLog::new(configuration.submission_log_path.clone()),
            output_directory: configuration.output_directory(),
        }
    }
}

/// A generated card waiting on disk to be sent. The file is removed when the artifact is dropped,
/// whether the card was sent or not.
#[derive(Debug)]
pub struct TemporaryArtifact {
    path: PathBuf,
}

impl TemporaryArtifact {
    /// Reserves a uniquely named PDF file inside the given directory.
    pub fn new_in(directory: &Path) -> Self {
        TemporaryArtifact {
            path: directory.join(format!("{}.pdf", uuid::Uuid::new_v4())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TemporaryArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed the temporary card {:?}", self.path),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => log::warn!(
                "Failed to remove the temporary card {:?}: {}",
                self.path,
                error
            ),
        }
    }
}

/// The name under which the card is downloaded: the spaces of the name become underscores and so
/// does anything else that cannot appear in a quoted header value.
pub fn attachment_filename(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|character| match character {
            ' ' | '"' | '\\' => '_',
            character if character.is_ascii_graphic() => character,
            _ => '_',
        })
        .collect();

    format!("{}_visiting_card.pdf", stem)
}

/// The `Content-Disposition` of a card download. Names which do not survive `attachment_filename`
/// unchanged are also sent in full as an RFC 5987 `filename*` parameter.
pub fn content_disposition(name: &str) -> String {
    let filename = attachment_filename(name);
    let utf8_filename = format!("{}_visiting_card.pdf", name.replace(' ', "_"));
    if utf8_filename == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            filename,
            urlencoding::encode(&utf8_filename)
        )
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(show_form).post(create_card))
        .with_state(state)
}

pub async fn show_form() -> Html<&'static str> {
    Html(FORM_PAGE)
}

pub async fn create_card(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CardForm>,
) -> Response {
    let request = CardRequest::from(form);
    let filename = attachment_filename(&request.name);
    let disposition = content_disposition(&request.name);

    let generation = tokio::task::spawn_blocking(move || render_download(&state, &request)).await;
    match generation {
        Ok(Ok(card_bytes)) => {
            log::info!("Sending the card {:?} ({} bytes)", filename, card_bytes.len());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                card_bytes,
            )
                .into_response()
        }
        Ok(Err(error)) => {
            log::error!("Failed to generate the card {:?}: {}", filename, error);
            error_response(&error.to_string())
        }
        Err(error) => {
            log::error!("The card generation task for {:?} failed: {}", filename, error);
            error_response(&error.to_string())
        }
    }
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("An error occurred: {}", message),
    )
        .into_response()
}

/// Logs the submission, generates the card into a temporary file and reads it back. The temporary
/// file is gone by the time this returns, on success and on failure alike.
pub fn render_download(state: &AppState, request: &CardRequest) -> Result<Vec<u8>, ContextError> {
    if let Err(error) = state.submission_log.append(request) {
        log::warn!("The submission could not be logged: {}", error);
    }

    let artifact = TemporaryArtifact::new_in(&state.output_directory);
    state.generator.generate_to_path(request, artifact.path())?;
    std::fs::read(artifact.path()).map_err(|error| {
        ContextError::with_error(
            format!("Failed to read back the card {:?}", artifact.path()),
            &error,
        )
        .of_kind(ErrorKind::Io)
    })
}

/// Checks that the template and the fonts are usable and then serves the form until the process
/// is stopped.
pub async fn serve(configuration: &CardConfiguration) -> Result<(), ContextError> {
    let state = Arc::new(AppState::from_configuration(configuration));
    state.generator.verify()?;
    log::info!(
        "Using the template {:?}, logging the submissions to {:?}",
        state.generator.template_path(),
        state.submission_log.path()
    );

    let listener = tokio::net::TcpListener::bind(&configuration.bind_address)
        .await
        .map_err(|error| {
            ContextError::with_error(
                format!("Failed to bind to {:?}", configuration.bind_address),
                &error,
            )
            .of_kind(ErrorKind::Io)
        })?;
    log::info!("Listening on http://{}", configuration.bind_address);

    axum::serve(listener, router(state))
        .await
        .map_err(|error| {
            ContextError::with_error("The server stopped", &error).of_kind(ErrorKind::Io)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_filenames_replace_spaces() {
        assert_eq!(
            attachment_filename("Harshil Sarariya"),
            "Harshil_Sarariya_visiting_card.pdf"
        );
        assert_eq!(
            attachment_filename("Jo \"JJ\" Doe"),
            "Jo__JJ__Doe_visiting_card.pdf"
        );
        assert_eq!(attachment_filename("Zoë"), "Zo__visiting_card.pdf");
    }

    #[test]
    fn utf8_names_are_kept_in_the_extended_filename() {
        assert_eq!(
            content_disposition("Harshil Sarariya"),
            "attachment; filename=\"Harshil_Sarariya_visiting_card.pdf\""
        );
        assert_eq!(
            content_disposition("Zoë Saldaña"),
            "attachment; filename=\"Zo__Salda_a_visiting_card.pdf\"; \
             filename*=UTF-8''Zo%C3%AB_Salda%C3%B1a_visiting_card.pdf"
        );
        assert_eq!(
            content_disposition("Jo \"JJ\" Doe"),
            "attachment; filename=\"Jo__JJ__Doe_visiting_card.pdf\"; \
             filename*=UTF-8''Jo_%22JJ%22_Doe_visiting_card.pdf"
        );
    }

    #[test]
    fn temporary_artifacts_are_unique_and_removed() {
        let directory = tempfile::tempdir().unwrap();
        let first = TemporaryArtifact::new_in(directory.path());
        let second = TemporaryArtifact::new_in(directory.path());
        assert_ne!(first.path(), second.path());

        std::fs::write(first.path(), b"%PDF").unwrap();
        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());

        // Dropping an artifact which was never written is fine
        drop(second);
    }

    #[test]
    fn form_fields_map_onto_the_request() {
        let form: CardForm = serde_json::from_str(
            r#"{ "firstname": "Ada", "role": "CTO", "email": "a@x.com", "contact_number": "123" }"#,
        )
        .unwrap();
        let request = CardRequest::from(form);

        assert_eq!(request.name, "Ada");
        assert_eq!(request.phone, "123");
    }
}
