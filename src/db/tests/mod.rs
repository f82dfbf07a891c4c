use crate::db::*;
use tempfile::NamedTempFile;

mod migrations;
mod search;

async fn open_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn sample_project(nsfc_id: &str, unit: &str, code: &str) -> NewProject {
    NewProject {
        nsfc_id: Some(nsfc_id.to_string()),
        title: format!("Project {}", &nsfc_id[..4]),
        approval_number: Some("81970001".to_string()),
        application_code: Some(code.to_string()),
        leader: Some("Zhang San".to_string()),
        unit: Some(unit.to_string()),
        start_date: Some("2020-01-01".to_string()),
        end_date: Some("2023-12-31".to_string()),
        funding: Some(55.0),
        abstract_text: Some("abstract".to_string()),
        conclusion_abstract: None,
        url: Some(format!("https://kd.nsfc.cn/finalDetails?id={}", nsfc_id)),
    }
}
