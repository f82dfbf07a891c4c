use super::*;

const BOUNDARY: &str = "nsfc-test-boundary";

/// Multipart body with optional `project_id` and `file` parts
fn multipart_body(project_id: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(id) = project_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"project_id\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, content)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/reports/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_download_delete_report() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let project = downloader
        .create_project(sample_project("Protein folding"))
        .await
        .unwrap();
    let app = router_for(&downloader);
    let pdf = minimal_pdf();

    let response = app
        .clone()
        .oneshot(upload_request(multipart_body(
            Some(&project.id),
            Some(("closing.pdf", &pdf)),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let report = json_body(response).await;
    assert_eq!(report["project_id"], project.id.as_str());
    assert_eq!(report["filename"], "H0101_Protein folding_81970001.pdf");
    assert_eq!(report["page_count"], 1);
    let report_id = report["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/reports/{}/download", report_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    let disposition = response.headers()["content-disposition"].to_str().unwrap();
    assert_eq!(
        disposition,
        "inline; filename*=UTF-8''H0101_Protein%20folding_81970001.pdf"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), pdf.as_slice());

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/reports/{}", report_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(empty_request("GET", &format!("/reports/{}/download", report_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejects_bad_requests() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let project = downloader
        .create_project(sample_project("Rejections"))
        .await
        .unwrap();
    let app = router_for(&downloader);
    let pdf = minimal_pdf();

    // Missing project id
    let response = app
        .clone()
        .oneshot(upload_request(multipart_body(None, Some(("r.pdf", &pdf)))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing file
    let response = app
        .clone()
        .oneshot(upload_request(multipart_body(Some(&project.id), None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["message"], "no file selected");

    // Not a PDF
    let response = app
        .clone()
        .oneshot(upload_request(multipart_body(
            Some(&project.id),
            Some(("notes.txt", b"plain text")),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown project
    let response = app
        .oneshot(upload_request(multipart_body(
            Some("missing"),
            Some(("r.pdf", &pdf)),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_size_limit() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let project = downloader
        .create_project(sample_project("Too big"))
        .await
        .unwrap();

    let mut config = (*downloader.get_config()).clone();
    config.api.max_upload_bytes = 1024;
    let app = create_router(downloader, Arc::new(config));

    let mut oversized = b"%PDF-1.5\n".to_vec();
    oversized.resize(8 * 1024, b'0');
    let response = app
        .oneshot(upload_request(multipart_body(
            Some(&project.id),
            Some(("big.pdf", &oversized)),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_delete_unknown_report_is_not_found() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let response = app
        .oneshot(empty_request("DELETE", "/reports/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
