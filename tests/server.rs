mod common;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    Form,
};
use cardr::{
    server::{create_card, router, show_form, AppState, CardForm},
    submission_log::SubmissionLog,
};
use common::*;
use std::{path::Path, sync::Arc};
use tower::ServiceExt as _;

fn app_state(directory: &Path, template_path: std::path::PathBuf) -> AppState {
    let output_directory = directory.join("cards");
    std::fs::create_dir(&output_directory).unwrap();

    AppState {
        generator: generator(template_path),
        submission_log: SubmissionLog::new(directory.join("submissions_log.csv")),
        output_directory,
    }
}

fn card_form(name: &str) -> CardForm {
    CardForm {
        firstname: name.into(),
        role: "BDM".into(),
        email: "harshil@example.com".into(),
        contact_number: "+91 98765 43210".into(),
    }
}

fn is_empty(directory: &Path) -> bool {
    std::fs::read_dir(directory).unwrap().next().is_none()
}

#[tokio::test]
async fn submitted_forms_are_answered_with_the_card() {
    let directory = tempfile::tempdir().unwrap();
    let template_path = write_template(directory.path(), 2);
    let state = Arc::new(app_state(directory.path(), template_path));

    let response = create_card(State(state.clone()), Form(card_form("Harshil Sarariya"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap(),
        "attachment; filename=\"Harshil_Sarariya_visiting_card.pdf\""
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.starts_with(b"%PDF"));
    let card = load(&body);
    assert_eq!(card.get_pages().len(), 2);
    assert!(shown_strings(&card, 1).contains(&"Harshil".to_string()));

    assert!(is_empty(&state.output_directory));
    let records = state.submission_log.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].full_name, "Harshil Sarariya");
    assert_eq!(records[0].contact_number, "+91 98765 43210");
}

#[tokio::test]
async fn failures_are_reported_without_leaving_files_behind() {
    let directory = tempfile::tempdir().unwrap();
    let state = Arc::new(app_state(
        directory.path(),
        directory.path().join("missing.pdf"),
    ));

    let response = create_card(State(state.clone()), Form(card_form("Ada Lovelace"))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let message = String::from_utf8(body.to_vec()).unwrap();
    assert!(message.starts_with("An error occurred: "), "{}", message);

    assert!(is_empty(&state.output_directory));
    // The submission is logged before the card is generated
    assert_eq!(state.submission_log.records().unwrap().len(), 1);
}

#[tokio::test]
async fn every_submission_is_logged() {
    let directory = tempfile::tempdir().unwrap();
    let template_path = write_template(directory.path(), 2);
    let state = Arc::new(app_state(directory.path(), template_path));

    for name in ["Ada Lovelace", "Grace Hopper", "Harshil Sarariya"] {
        let response = create_card(State(state.clone()), Form(card_form(name))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let log_contents = std::fs::read_to_string(state.submission_log.path()).unwrap();
    assert_eq!(log_contents.lines().count(), 4);
    let records = state.submission_log.records().unwrap();
    let submission_times: Vec<&str> = records
        .iter()
        .map(|record| record.submission_time.as_str())
        .collect();
    assert!(submission_times.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn the_form_page_posts_every_field() {
    let page = show_form().await.0;

    for field in ["firstname", "role", "email", "contact_number"] {
        assert!(page.contains(&format!("name=\"{}\"", field)), "{}", field);
    }
    assert!(page.contains("method=\"post\"") || page.contains("method=\"POST\""));
}

fn form_request(form_body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body))
        .unwrap()
}

#[tokio::test]
async fn the_router_serves_the_form_and_the_card_on_the_same_path() {
    let directory = tempfile::tempdir().unwrap();
    let template_path = write_template(directory.path(), 2);
    let state = Arc::new(app_state(directory.path(), template_path));

    let form_response = router(state.clone())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(form_response.status(), StatusCode::OK);
    assert!(form_response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let card_response = router(state.clone())
        .oneshot(form_request(
            "firstname=Harshil+Sarariya&role=BDM&email=h%40x.com&contact_number=%2B91+1234567890",
        ))
        .await
        .unwrap();
    assert_eq!(card_response.status(), StatusCode::OK);
    assert_eq!(
        card_response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap(),
        "application/pdf"
    );
    let body = axum::body::to_bytes(card_response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(shown_strings(&load(&body), 1).contains(&"Sarariya".to_string()));

    let records = state.submission_log.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].email, "h@x.com");
    assert_eq!(records[0].contact_number, "+91 1234567890");
}

#[tokio::test]
async fn incomplete_forms_are_rejected_before_logging() {
    let directory = tempfile::tempdir().unwrap();
    let template_path = write_template(directory.path(), 2);
    let state = Arc::new(app_state(directory.path(), template_path));

    let response = router(state.clone())
        .oneshot(form_request(
            "firstname=Harshil+Sarariya&role=BDM&email=h%40x.com",
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error(), "{}", response.status());
    assert!(!state.submission_log.path().exists());
    assert!(is_empty(&state.output_directory));
}
