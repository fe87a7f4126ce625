//! HTTP API tests run through the router without binding a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use super::open_service;
use crate::semantic::extract::tests::build_pdf;
use crate::semantic::EMPTY_INDEX_MESSAGE;
use crate::web::{self, ListResponse, SearchResponse, StatusResponse};

const BOUNDARY: &str = "pdfvec-test-boundary";
const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

fn app(dir: &std::path::Path) -> Router {
    web::router(Arc::new(open_service(dir)), UPLOAD_LIMIT)
}

fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload_pdf")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, file_name, bytes)))
        .unwrap()
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send<T: DeserializeOwned>(app: &Router, req: Request<Body>) -> (StatusCode, T) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_on_empty_index_reports_message() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let (status, list): (_, ListResponse) = send(&app, request(Method::GET, "/list_pdfs")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.pdfs.is_empty());

    let (status, resp): (_, SearchResponse) =
        send(&app, request(Method::GET, "/search?query=anything")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.query, "anything");
    assert!(resp.results.is_empty());
    assert_eq!(resp.message.as_deref(), Some(EMPTY_INDEX_MESSAGE));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_search_delete_reset() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let pdf = build_pdf(&[Some("alpha beta"), Some("gamma delta")]);
    let (status, resp): (_, StatusResponse) =
        send(&app, upload_request("file", "paper.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.status, "success");
    assert_eq!(resp.message, "Uploaded and indexed paper.pdf");

    let notes = build_pdf(&[Some("gamma rays")]);
    let (status, _): (_, StatusResponse) =
        send(&app, upload_request("file", "notes.pdf", &notes)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list): (_, ListResponse) = send(&app, request(Method::GET, "/list_pdfs")).await;
    assert_eq!(list.pdfs, vec!["notes", "paper"]);

    let (status, resp): (_, SearchResponse) = send(
        &app,
        request(Method::GET, "/search?query=gamma+delta&top_k=1&pdf=paper"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(resp.message.is_none());
    assert_eq!(resp.results.len(), 1);
    let hit = &resp.results[0];
    assert_eq!(hit.pdf, "paper");
    assert_eq!(hit.page, 2);
    assert!(hit.text.ends_with("..."));

    let (_, resp): (_, SearchResponse) =
        send(&app, request(Method::GET, "/search?query=gamma&pdf=ghost")).await;
    assert!(resp.results.is_empty());
    assert_eq!(resp.message.as_deref(), Some("ghost is not indexed."));

    let (status, resp): (_, StatusResponse) =
        send(&app, request(Method::DELETE, "/delete_pdf/paper")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.message, "paper deleted from memory and disk.");

    let (status, resp): (_, StatusResponse) =
        send(&app, request(Method::DELETE, "/delete_pdf/paper")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.message, "paper was not indexed; nothing to delete.");

    let (status, resp): (_, StatusResponse) = send(&app, request(Method::POST, "/reset")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.message, "All PDFs and embeddings have been cleared.");

    let (_, list): (_, ListResponse) = send(&app, request(Method::GET, "/list_pdfs")).await;
    assert!(list.pdfs.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_without_file_field_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let pdf = build_pdf(&[Some("text")]);
    let (status, body): (_, serde_json::Value) =
        send(&app, upload_request("document", "paper.pdf", &pdf)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_of_non_pdf_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let (status, body): (_, serde_json::Value) =
        send(&app, upload_request("file", "notes.pdf", b"plain text")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, list): (_, ListResponse) = send(&app, request(Method::GET, "/list_pdfs")).await;
    assert!(list.pdfs.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_hidden_name_is_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let (status, _): (_, serde_json::Value) =
        send(&app, request(Method::DELETE, "/delete_pdf/.hidden")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_search_params_are_json_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let (status, body): (_, serde_json::Value) =
        send(&app, request(Method::GET, "/search?query=x&top_k=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid digit"));

    let (status, body): (_, serde_json::Value) =
        send(&app, request(Method::GET, "/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_that_is_not_multipart_is_json_error() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload_pdf")
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from(build_pdf(&[Some("text")])))
        .unwrap();
    let (status, body): (_, serde_json::Value) = send(&app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
