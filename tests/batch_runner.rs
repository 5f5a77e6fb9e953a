//! End-to-end runs: chunking, persistence, sinks and the audit log.

mod support;

use batch_fetch::audit::CsvAuditLog;
use batch_fetch::batch::NoopSink;
use batch_fetch::types::{FailureKind, Item, Payload};
use batch_fetch::{Batch, BatchRunner, ResultRecord};
use mockito::Matcher;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use support::{closed_port_url, id_items, MockServerFixture};

fn runner(fixture: &MockServerFixture, chunk_size: usize, out: &Path) -> BatchRunner {
    BatchRunner::builder()
        .url_template(fixture.url("/item/{id}"))
        .rate_limit(0)
        .chunk_size(chunk_size)
        .output_dir(out)
        .build()
        .unwrap()
}

fn read_records(path: &Path) -> Vec<Value> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

async fn mock_items(fixture: &mut MockServerFixture) {
    fixture
        .server
        .mock("GET", Matcher::Regex(r"^/item/\d+$".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": true}"#)
        .create_async()
        .await;
}

#[tokio::test]
async fn test_files_follow_chunk_boundaries() {
    let mut fixture = MockServerFixture::new().await;
    mock_items(&mut fixture).await;
    let dir = tempfile::tempdir().unwrap();

    let summary = runner(&fixture, 10, dir.path())
        .run(id_items(25), &mut NoopSink)
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.records, 25);
    assert_eq!(summary.succeeded, 25);
    assert_eq!(summary.failed, 0);

    let sizes: Vec<usize> = (0..3)
        .map(|i| read_records(&dir.path().join(format!("results_batch-{}.json", i))).len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert!(!dir.path().join("results_batch-3.json").exists());
    assert_eq!(summary.files.len(), 3);
}

#[tokio::test]
async fn test_every_item_gets_exactly_one_record_in_order() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .server
        .mock("GET", Matcher::Regex(r"^/item/\d*[02468]$".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": true}"#)
        .create_async()
        .await;
    fixture
        .server
        .mock("GET", Matcher::Regex(r"^/item/\d*[13579]$".into()))
        .with_status(500)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut items = id_items(6);
    items.insert(3, Item::new().with("name", "no id"));

    let mut batches: Vec<Batch> = Vec::new();
    let summary = runner(&fixture, 4, dir.path())
        .run(items, &mut batches)
        .await
        .unwrap();

    assert_eq!(summary.records, 7);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 4);
    assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![4, 3]);

    let records: Vec<&ResultRecord> = batches.iter().flat_map(|b| b.records.iter()).collect();
    assert_eq!(records[0].url, fixture.url("/item/0"));
    assert_eq!(records[0].response, Payload::Json(json!({"ok": true})));
    assert_eq!(records[1].status(), Some(500));
    assert_eq!(records[3].failure_kind(), Some(FailureKind::Template));
    assert_eq!(records[3].url, fixture.url("/item/{id}"));
    assert_eq!(records[6].url, fixture.url("/item/5"));

    // what the sink saw is what landed on disk
    let on_disk = read_records(&summary.files[1]);
    assert_eq!(serde_json::to_value(&batches[1].records).unwrap(), Value::Array(on_disk.clone()));
    assert_eq!(on_disk[0], json!({"url": fixture.url("/item/3"), "response": 500}));
}

#[tokio::test]
async fn test_transport_failures_stay_inside_their_chunk() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/item/\d+$".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": true}"#)
        .expect(3)
        .create_async()
        .await;
    let dead = closed_port_url();
    let dir = tempfile::tempdir().unwrap();

    // odd items point at a port nothing listens on
    let items: Vec<Item> = (0..6)
        .map(|i| {
            let base = if i % 2 == 0 { fixture.base_url.clone() } else { dead.clone() };
            Item::new().with("base", base).with("id", i)
        })
        .collect();
    let runner = BatchRunner::builder()
        .url_template("{base}/item/{id}")
        .rate_limit(0)
        .chunk_size(3)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut run = runner.start(items);
    let mut chunk_lens = Vec::new();
    while let Some(batch) = run.next_batch().await.unwrap() {
        chunk_lens.push(batch.len());
        for (offset, record) in batch.records.iter().enumerate() {
            let i = batch.index * 3 + offset;
            if i % 2 == 0 {
                assert_eq!(record.url, fixture.url(&format!("/item/{}", i)));
                assert!(record.is_success(), "item {}: {:?}", i, record);
            } else {
                assert_eq!(record.url, format!("{}/item/{}", dead, i));
                assert_eq!(record.failure_kind(), Some(FailureKind::Transport));
            }
        }
    }

    mock.assert_async().await;
    assert_eq!(chunk_lens, vec![3, 3]);
    assert_eq!(run.summary().succeeded, 3);
    assert_eq!(run.summary().failed, 3);
}

#[tokio::test]
async fn test_full_size_run_writes_three_files() {
    let mut fixture = MockServerFixture::new().await;
    mock_items(&mut fixture).await;
    let dir = tempfile::tempdir().unwrap();

    // paced so the local mock server never sees a whole chunk of connections at once
    let runner = BatchRunner::builder()
        .url_template(fixture.url("/item/{id}"))
        .rate_limit(200)
        .limiter_window(Duration::from_millis(20))
        .chunk_size(1000)
        .output_dir(dir.path())
        .build()
        .unwrap();
    let summary = runner.run(id_items(2500), &mut NoopSink).await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.succeeded, 2500);
    let sizes: Vec<usize> = summary.files.iter().map(|f| read_records(f).len()).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);

    let last = read_records(&dir.path().join("results_batch-2.json"));
    assert_eq!(last[499]["url"], fixture.url("/item/2499"));
}

#[tokio::test]
async fn test_rerun_produces_identical_files() {
    let mut fixture = MockServerFixture::new().await;
    mock_items(&mut fixture).await;
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    runner(&fixture, 3, first.path())
        .run(id_items(7), &mut NoopSink)
        .await
        .unwrap();
    runner(&fixture, 3, second.path())
        .run(id_items(7), &mut NoopSink)
        .await
        .unwrap();

    for i in 0..3 {
        let name = format!("results_batch-{}.json", i);
        assert_eq!(
            std::fs::read(first.path().join(&name)).unwrap(),
            std::fs::read(second.path().join(&name)).unwrap(),
            "{} differs between runs",
            name
        );
    }
}

#[tokio::test]
async fn test_empty_item_list_writes_nothing() {
    let fixture = MockServerFixture::new().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results");

    let summary = runner(&fixture, 10, &out)
        .run(Vec::new(), &mut NoopSink)
        .await
        .unwrap();

    assert_eq!(summary.batches, 0);
    assert!(!out.exists());
}

#[tokio::test]
async fn test_next_batch_persists_before_returning() {
    let mut fixture = MockServerFixture::new().await;
    mock_items(&mut fixture).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&fixture, 2, dir.path());

    let mut run = runner.start(id_items(5));
    assert_eq!(run.total_batches(), 3);

    let mut seen = Vec::new();
    while let Some(batch) = run.next_batch().await.unwrap() {
        let file = dir.path().join(format!("results_batch-{}.json", batch.index));
        assert!(file.exists());
        assert!(!dir
            .path()
            .join(format!("results_batch-{}.json", batch.index + 1))
            .exists());
        seen.push(batch.index);
    }

    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(run.remaining_batches(), 0);
    assert!(run.next_batch().await.unwrap().is_none());
    assert_eq!(run.summary().records, 5);
}

#[tokio::test]
async fn test_audit_log_gets_one_row_per_batch() {
    let mut fixture = MockServerFixture::new().await;
    mock_items(&mut fixture).await;
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("batch_log.csv");

    let mut audit = CsvAuditLog::new(&log_path, "sandbox");
    runner(&fixture, 4, &dir.path().join("out"))
        .run(id_items(9), &mut audit)
        .await
        .unwrap();

    let mut reader = csv::Reader::from_path(&log_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().map(|r| r[1].to_string()).collect::<Vec<_>>(),
        vec!["4", "4", "1"]
    );
    assert!(rows.iter().all(|r| &r[2] == "0" && &r[3] == "sandbox"));
}

#[test]
fn test_run_blocking_on_explicit_runtime() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", Matcher::Regex(r"^/item/\d+$".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(3)
        .create();
    let dir = tempfile::tempdir().unwrap();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let runner = BatchRunner::builder()
        .url_template(format!("{}/item/{{id}}", server.url()))
        .chunk_size(2)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut batches: Vec<Batch> = Vec::new();
    let summary = runner
        .run_blocking(&runtime, id_items(3), &mut batches)
        .unwrap();

    mock.assert();
    assert_eq!(summary.batches, 2);
    // a JSON array is a decoded body but not an object
    assert_eq!(summary.succeeded, 0);
    assert_eq!(batches[0].records[0].response, Payload::Json(json!([])));
}
