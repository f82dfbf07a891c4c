use super::*;

#[tokio::test]
async fn test_search_history_endpoints() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    for i in 0..12 {
        downloader
            .db
            .record_search("unit", &format!("University {}", i), i)
            .await
            .unwrap();
    }
    let app = router_for(&downloader);

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/search/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entries = json_body(response).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 10, "default limit is 10");
    assert_eq!(entries[0]["keyword"], "University 11");
    assert_eq!(entries[0]["search_type"], "unit");

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/search/history?limit=3"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 3);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/search/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["deleted"], 12);

    let response = app
        .oneshot(empty_request("GET", "/search/history"))
        .await
        .unwrap();
    assert!(json_body(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_filtered_listing_lands_in_history() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    app.clone()
        .oneshot(empty_request("GET", "/projects?code=H01"))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("GET", "/search/history"))
        .await
        .unwrap();
    let entries = json_body(response).await;
    assert_eq!(entries[0]["search_type"], "code");
    assert_eq!(entries[0]["keyword"], "H01");
    assert_eq!(entries[0]["results_count"], 0);
}
