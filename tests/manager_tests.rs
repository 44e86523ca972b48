mod common;

use common::TestDb;
use crudbase::{
    error::Error,
    models::{Fetched, Filters, Record, RecordId},
    BaseManager,
};
use serde_json::{json, Value};
use uuid::Uuid;

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn filters(pairs: &[(&str, &str)]) -> Filters {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn created_id(created: Option<Record>) -> RecordId {
    let created = created.expect("row should be inserted");
    RecordId::from_value(&created["id"]).expect("id should be a uuid or integer")
}

#[tokio::test]
async fn test_create_filters_unknown_keys() {
    let Some(test_db) = TestDb::try_new("test_create_filters_unknown_keys").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let created = manager
        .create_data(
            &table,
            record(json!({"name": "write docs", "priority": 2, "is_admin": true})),
            None,
        )
        .await
        .unwrap();
    let id = created_id(created);

    let Fetched::One(Some(row)) = manager
        .get_data(&table, filters(&[("id", id.to_string().as_str())]), None)
        .await
        .unwrap()
    else {
        panic!("expected a single record");
    };
    assert_eq!(row["name"], "write docs");
    assert_eq!(row["priority"], 2);
    assert!(!row.contains_key("is_admin"));
    assert!(row["created_at"].is_string());

    assert_eq!(test_db.count_activities(&table, "create").await, 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_create_batch_and_custom_returning() {
    let Some(test_db) = TestDb::try_new("test_create_batch_and_custom_returning").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let created = manager
        .create_data(
            &table,
            vec![
                record(json!({"name": "a", "priority": 1})),
                record(json!({"name": "b"})),
                record(json!({"priority": 3, "done": true})),
            ],
            Some(&["id", "name"][..]),
        )
        .await
        .unwrap()
        .unwrap();

    assert!(created.contains_key("id"));
    assert!(created.contains_key("name"));
    assert_eq!(test_db.count_rows(&table).await, 3);
    // One activity per call, for the first record.
    assert_eq!(test_db.count_activities(&table, "create").await, 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_create_with_nothing_valid_is_rejected() {
    let Some(test_db) = TestDb::try_new("test_create_with_nothing_valid_is_rejected").await else {
        return;
    };
    let table = test_db.tags_table().await;
    let mut ctx = test_db.context();

    let err = BaseManager::new(&mut ctx)
        .create_data(&table, record(json!({"bogus": 1})), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(err.message(), "No valid data to insert.");
    assert_eq!(test_db.count_rows(&table).await, 0);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_create_conflict_returns_none() {
    let Some(test_db) = TestDb::try_new("test_create_conflict_returns_none").await else {
        return;
    };
    let table = test_db.tags_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let first = manager
        .create_data(&table, record(json!({"label": "urgent"})), None)
        .await
        .unwrap();
    assert!(matches!(created_id(first), RecordId::Int(_)));

    let second = manager
        .create_data(&table, record(json!({"label": "urgent"})), None)
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(test_db.count_rows(&table).await, 1);
    assert_eq!(test_db.count_activities(&table, "create").await, 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_create_on_missing_table_is_not_found() {
    let Some(test_db) = TestDb::try_new("test_create_on_missing_table_is_not_found").await else {
        return;
    };
    let mut ctx = test_db.context();

    let err = BaseManager::new(&mut ctx)
        .create_data("no_such_table_here", record(json!({"name": "x"})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_update_missing_record_is_not_found() {
    let Some(test_db) = TestDb::try_new("test_update_missing_record_is_not_found").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    manager
        .create_data(&table, record(json!({"name": "untouched"})), None)
        .await
        .unwrap();

    let err = manager
        .update_data(&table, &RecordId::Uuid(Uuid::now_v7()), record(json!({"name": "x"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.message(), "Record not found");
    assert_eq!(test_db.count_activities(&table, "update").await, 0);

    let rows: Vec<String> = sqlx::query_scalar(&format!("SELECT name FROM {}", table))
        .fetch_all(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(rows, vec!["untouched".to_string()]);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_update_record() {
    let Some(test_db) = TestDb::try_new("test_update_record").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let id = created_id(
        manager
            .create_data(&table, record(json!({"name": "draft", "priority": 1})), None)
            .await
            .unwrap(),
    );

    let updated = manager
        .update_data(
            &table,
            &id,
            record(json!({"name": "final", "done": true, "unknown": 1})),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["id"], id.to_value());

    let Fetched::One(Some(row)) = manager
        .get_data(&table, filters(&[("id", id.to_string().as_str())]), None)
        .await
        .unwrap()
    else {
        panic!("expected a single record");
    };
    assert_eq!(row["name"], "final");
    assert_eq!(row["done"], true);
    assert_eq!(row["priority"], 1);
    assert_eq!(test_db.count_activities(&table, "update").await, 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_update_with_only_unknown_fields_touches_updated_at() {
    let Some(test_db) =
        TestDb::try_new("test_update_with_only_unknown_fields_touches_updated_at").await
    else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let id = created_id(
        manager
            .create_data(
                &table,
                record(json!({"name": "a", "updated_at": "2020-01-01T00:00:00Z"})),
                None,
            )
            .await
            .unwrap(),
    );

    manager
        .update_data(&table, &id, record(json!({"nope": 1})))
        .await
        .unwrap();

    let year: f64 = sqlx::query_scalar(&format!(
        "SELECT EXTRACT(YEAR FROM updated_at)::float8 FROM {}",
        table
    ))
    .fetch_one(&test_db.pool)
    .await
    .unwrap();
    assert!(year > 2020.0);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_delete_records() {
    let Some(test_db) = TestDb::try_new("test_delete_records").await else {
        return;
    };
    let table = test_db.tags_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let mut ids = Vec::new();
    for label in ["a", "b", "c"] {
        ids.push(created_id(
            manager
                .create_data(&table, record(json!({"label": label})), None)
                .await
                .unwrap(),
        ));
    }

    assert!(!manager.delete_data(&table, &[]).await.unwrap());
    assert_eq!(test_db.count_rows(&table).await, 3);

    assert!(manager.delete_data(&table, &ids[..2]).await.unwrap());
    assert_eq!(test_db.count_rows(&table).await, 1);
    assert!(!manager.record_exists(&table, &ids[0], "id").await.unwrap());
    assert!(manager.record_exists(&table, &ids[2], "id").await.unwrap());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_get_data_paginates() {
    let Some(test_db) = TestDb::try_new("test_get_data_paginates").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let batch: Vec<Record> = (0..25)
        .map(|i| record(json!({"name": format!("task {i}"), "priority": i})))
        .collect();
    manager.create_data(&table, batch, None).await.unwrap();

    let Fetched::Page(page) = manager
        .get_data(&table, filters(&[("page_size", "10")]), None)
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(page.meta.total, 25);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.meta.page, 1);
    assert_eq!(page.data.len(), 10);
    // Default sort is priority ascending.
    assert_eq!(page.data[0]["priority"], 0);

    let Fetched::Page(last) = manager
        .get_data(&table, filters(&[("page", "3"), ("page_size", "10")]), None)
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(last.data.len(), 5);
    assert_eq!(last.data[4]["priority"], 24);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_get_data_empty_table() {
    let Some(test_db) = TestDb::try_new("test_get_data_empty_table").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();

    let Fetched::Page(page) = BaseManager::new(&mut ctx)
        .get_data(&table, Filters::new(), None)
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(page.meta.total, 0);
    assert_eq!(page.meta.total_pages, 0);
    assert!(page.data.is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_sort_outside_allow_list_falls_back_to_updated_at_desc() {
    let Some(test_db) =
        TestDb::try_new("test_sort_outside_allow_list_falls_back_to_updated_at_desc").await
    else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    manager
        .create_data(
            &table,
            vec![
                record(json!({"name": "old", "priority": 1, "updated_at": "2021-01-01T00:00:00Z"})),
                record(json!({"name": "new", "priority": 2, "updated_at": "2023-01-01T00:00:00Z"})),
                record(json!({"name": "mid", "priority": 3, "updated_at": "2022-01-01T00:00:00Z"})),
            ],
            None,
        )
        .await
        .unwrap();

    let Fetched::Page(page) = manager
        .get_data(
            &table,
            filters(&[("sort_by", "done"), ("order_by", "asc")]),
            Some(&["name".to_string()][..]),
        )
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };

    let names: Vec<&str> = page.data.iter().filter_map(|r| r["name"].as_str()).collect();
    assert_eq!(names, vec!["new", "mid", "old"]);
    assert!(page.data.iter().all(|r| r.len() == 1));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_get_data_filters() {
    let Some(test_db) = TestDb::try_new("test_get_data_filters").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let project = Uuid::now_v7().to_string();
    manager
        .create_data(
            &table,
            vec![
                record(json!({"name": "a", "project_id": project, "priority": 1})),
                record(json!({"name": "b", "project_id": project, "priority": 2})),
                record(json!({"name": "c", "priority": 2})),
            ],
            None,
        )
        .await
        .unwrap();

    let Fetched::Page(page) = manager
        .get_data(&table, filters(&[("project_id", project.as_str()), ("name", "")]), None)
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(page.meta.total, 2);

    let Fetched::Page(page) = manager
        .get_data(&table, filters(&[("priority", "2"), ("done", "false")]), None)
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(page.meta.total, 2);

    let err = manager
        .get_data(&table, filters(&[("owner", "x")]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_get_missing_record_is_not_found() {
    let Some(test_db) = TestDb::try_new("test_get_missing_record_is_not_found").await else {
        return;
    };
    let table = test_db.tags_table().await;
    let mut ctx = test_db.context();

    let err = BaseManager::new(&mut ctx)
        .get_data(&table, filters(&[("id", "999")]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_id_of_wrong_type_is_not_found() {
    let Some(test_db) = TestDb::try_new("test_id_of_wrong_type_is_not_found").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    let kept = created_id(
        manager
            .create_data(&table, record(json!({"name": "keep me"})), None)
            .await
            .unwrap(),
    );

    for raw in ["42", "not-a-uuid"] {
        let err = manager
            .get_data(&table, filters(&[("id", raw)]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "id={raw}");
    }

    let err = manager
        .update_data(&table, &RecordId::Int(42), record(json!({"name": "nope"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert!(manager
        .delete_data(&table, &[RecordId::Int(42), RecordId::Text("x".into())])
        .await
        .unwrap());
    assert!(manager.delete_data(&table, &[RecordId::Int(7), kept.clone()]).await.unwrap());
    assert_eq!(test_db.count_rows(&table).await, 0);

    let tags = test_db.tags_table().await;
    let uuid = Uuid::now_v7().to_string();
    let err = manager
        .get_data(&tags, filters(&[("id", uuid.as_str())]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_get_data_with_huge_paging_values() {
    let Some(test_db) = TestDb::try_new("test_get_data_with_huge_paging_values").await else {
        return;
    };
    let table = test_db.tags_table().await;
    let mut ctx = test_db.context();
    let mut manager = BaseManager::new(&mut ctx);

    manager
        .create_data(&table, vec![record(json!({"label": "a"})), record(json!({"label": "b"}))], None)
        .await
        .unwrap();

    let max = i64::MAX.to_string();
    let Fetched::Page(page) = manager
        .get_data(&table, filters(&[("page_size", max.as_str())]), None)
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.meta.total, 2);
    assert_eq!(page.meta.total_pages, 1);

    let err = manager
        .get_data(&table, filters(&[("page", max.as_str())]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_manager_writes_join_open_transaction() {
    let Some(test_db) = TestDb::try_new("test_manager_writes_join_open_transaction").await else {
        return;
    };
    let table = test_db.tasks_table().await;
    let mut ctx = test_db.context();

    let target = table.clone();
    let result: crudbase::Result<()> = ctx
        .transaction(move |ctx| {
            Box::pin(async move {
                BaseManager::new(ctx)
                    .create_data(&target, record(json!({"name": "rolled back"})), None)
                    .await?;
                Err(Error::Validation("abort".to_string()))
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(test_db.count_rows(&table).await, 0);
    assert_eq!(test_db.count_activities(&table, "create").await, 0);

    test_db.cleanup().await;
}
