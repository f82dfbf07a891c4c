use super::*;

#[tokio::test]
async fn test_record_and_list_search_history() {
    let (db, _temp) = open_db().await;

    let first = db.record_search("url", "https://kd.nsfc.cn/finalDetails?id=x", 1).await.unwrap();
    let second = db.record_search("unit", "Peking", 4).await.unwrap();
    assert!(second > first);

    let history = db.list_search_history(10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].search_type, "unit");
    assert_eq!(history[0].keyword, "Peking");
    assert_eq!(history[0].results_count, 4);
    assert_eq!(history[1].id, first);

    let limited = db.list_search_history(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second);

    db.close().await;
}

#[tokio::test]
async fn test_clear_search_history() {
    let (db, _temp) = open_db().await;
    db.record_search("code", "H01", 0).await.unwrap();
    db.record_search("code", "H02", 2).await.unwrap();

    assert_eq!(db.clear_search_history().await.unwrap(), 2);
    assert!(db.list_search_history(10).await.unwrap().is_empty());
    assert_eq!(db.clear_search_history().await.unwrap(), 0);

    db.close().await;
}
