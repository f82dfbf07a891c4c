use super::*;

#[tokio::test]
async fn test_database_creation() {
    let (db, _temp) = open_db().await;

    let mut conn = db.pool.acquire().await.unwrap();
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .unwrap();
    drop(conn);

    assert!(tables.contains(&"projects".to_string()));
    assert!(tables.contains(&"reports".to_string()));
    assert!(tables.contains(&"search_history".to_string()));
    assert!(tables.contains(&"schema_version".to_string()));

    db.close().await;
}

#[tokio::test]
async fn test_reopen_does_not_rerun_migrations() {
    let temp_file = NamedTempFile::new().unwrap();

    let db = Database::new(temp_file.path()).await.unwrap();
    db.insert_project(&sample_project("0123456789abcdef0123456789abcdef", "PKU", "H01"))
        .await
        .unwrap();
    db.close().await;

    let db = Database::new(temp_file.path()).await.unwrap();
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(&db.pool)
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);

    let (projects, total) = db.list_projects(&ProjectFilter::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(projects.len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_creates_missing_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("catalog.db");

    let db = Database::new(&path).await.unwrap();
    assert!(path.exists());
    db.close().await;
}
