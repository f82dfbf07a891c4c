use super::*;

#[tokio::test]
async fn test_upload_names_file_after_project() {
    let (downloader, _temp) = create_test_downloader().await;
    let project = downloader
        .create_project(sample_project("Mass spectrometry"))
        .await
        .unwrap();

    let report = downloader
        .upload_report(&project.id, "whatever.PDF", minimal_pdf())
        .await
        .unwrap();

    assert_eq!(report.filename, "H0101_Mass spectrometry_81970001.pdf");
    assert_eq!(report.page_count, Some(1));
    let on_disk = std::fs::read(&report.file_path).unwrap();
    assert_eq!(on_disk.len() as i64, report.file_size);
    assert!(on_disk.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_upload_collision_falls_back_to_timestamp() {
    let (downloader, _temp) = create_test_downloader().await;
    let project = downloader.create_project(sample_project("Twice")).await.unwrap();

    let first = downloader
        .upload_report(&project.id, "a.pdf", minimal_pdf())
        .await
        .unwrap();
    let second = downloader
        .upload_report(&project.id, "b.pdf", minimal_pdf())
        .await
        .unwrap();

    assert_eq!(first.filename, "H0101_Twice_81970001.pdf");
    assert_ne!(second.filename, first.filename);
    assert!(second.filename.starts_with("H0101_Twice_"));
    let stamp = second
        .filename
        .trim_start_matches("H0101_Twice_")
        .trim_end_matches(".pdf");
    assert!(stamp.parse::<i64>().is_ok(), "{}", second.filename);

    let detail = downloader.get_project(&project.id).await.unwrap();
    assert_eq!(detail.reports.len(), 2);
}

#[tokio::test]
async fn test_upload_sanitizes_and_truncates_title() {
    let (downloader, _temp) = create_test_downloader().await;
    let mut project = sample_project(&format!("A/B: {}", "x".repeat(80)));
    project.application_code = None;
    let project = downloader.create_project(project).await.unwrap();

    let report = downloader
        .upload_report(&project.id, "r.pdf", minimal_pdf())
        .await
        .unwrap();

    let title = format!("A_B_ {}", "x".repeat(45));
    assert_eq!(report.filename, format!("unknown_code_{}_81970001.pdf", title));
}

#[tokio::test]
async fn test_upload_rejects_non_pdf() {
    let (downloader, _temp) = create_test_downloader().await;
    let project = downloader.create_project(sample_project("Strict")).await.unwrap();

    let err = downloader
        .upload_report(&project.id, "notes.txt", minimal_pdf())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = downloader
        .upload_report(&project.id, "fake.pdf", b"GIF89a".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = downloader
        .upload_report(&project.id, "", minimal_pdf())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = downloader
        .upload_report("missing", "r.pdf", minimal_pdf())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_unparsable_pdf_is_stored_without_page_count() {
    let (downloader, _temp) = create_test_downloader().await;
    let project = downloader.create_project(sample_project("Odd")).await.unwrap();

    let report = downloader
        .upload_report(&project.id, "odd.pdf", b"%PDF-1.4 truncated".to_vec())
        .await
        .unwrap();
    assert_eq!(report.page_count, None);
}

#[tokio::test]
async fn test_report_file_and_delete() {
    let (downloader, _temp) = create_test_downloader().await;
    let project = downloader.create_project(sample_project("Kept")).await.unwrap();
    let report = downloader
        .upload_report(&project.id, "r.pdf", minimal_pdf())
        .await
        .unwrap();

    let (found, path) = downloader.report_file(&report.id).await.unwrap();
    assert_eq!(found.id, report.id);
    assert!(path.exists());

    downloader.delete_report(&report.id).await.unwrap();
    assert!(!path.exists());
    assert!(matches!(
        downloader.report_file(&report.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        downloader.delete_report(&report.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_report_file_missing_on_disk_is_not_found() {
    let (downloader, _temp) = create_test_downloader().await;
    let project = downloader.create_project(sample_project("Vanished")).await.unwrap();
    let report = downloader
        .upload_report(&project.id, "r.pdf", minimal_pdf())
        .await
        .unwrap();
    std::fs::remove_file(&report.file_path).unwrap();

    let err = downloader.report_file(&report.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // The record can still be removed
    downloader.delete_report(&report.id).await.unwrap();
}
