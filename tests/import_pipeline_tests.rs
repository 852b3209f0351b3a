//! End-to-end pipeline tests over in-memory collaborators.
//!
//! Each test builds the full facade, starts a run and drives the recorded
//! work-queue tasks by hand, which executes the chunk steps exactly the
//! way an external queue consumer would.

use std::sync::Arc;

use serde_json::Value;
use sheetpress::application::events::{ImportEvent, MissingState};
use sheetpress::domain::job::RowStatus;
use sheetpress::domain::repositories::PageStore;
use sheetpress::infrastructure::config::{BlockConfig, FieldConfig, ImportConfig};
use sheetpress::test_utils::{
    InMemoryKv, InMemoryMediaStore, InMemoryPageStore, InMemoryWorkQueue, StaticSheetSource,
};
use sheetpress::ImportUseCases;

struct Harness {
    use_cases: ImportUseCases,
    pages: Arc<InMemoryPageStore>,
    queue: Arc<InMemoryWorkQueue>,
}

fn harness(rows: Vec<Vec<String>>, config: ImportConfig) -> Harness {
    harness_with_queue(rows, config, Arc::new(InMemoryWorkQueue::default()))
}

fn harness_with_queue(
    rows: Vec<Vec<String>>,
    config: ImportConfig,
    queue: Arc<InMemoryWorkQueue>,
) -> Harness {
    let pages = Arc::new(InMemoryPageStore::default());
    let media = Arc::new(InMemoryMediaStore::default());
    let kv = Arc::new(InMemoryKv::default());
    let use_cases = ImportUseCases::new(
        Arc::new(config),
        Arc::new(StaticSheetSource::new(rows)),
        pages.clone(),
        media,
        queue.clone(),
        kv,
    );
    Harness {
        use_cases,
        pages,
        queue,
    }
}

fn base_config() -> ImportConfig {
    ImportConfig {
        spreadsheet_id: "sheet-1".to_string(),
        ..Default::default()
    }
}

fn header() -> Vec<String> {
    ["ref", "seo title", "keywords", "description", "role", "title"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn data_row(title: &str) -> Vec<String> {
    vec![
        title.to_string(),
        format!("{title} SEO"),
        "keyword".to_string(),
        format!("About {title}"),
        "Editor".to_string(),
        title.to_string(),
    ]
}

/// Pop and execute queued chunk tasks until the queue is empty.
async fn drive(h: &Harness) {
    while let Some(task) = h.queue.pop_task().await {
        assert_eq!(task.task, "sheetpress.process_chunk");
        let job_id = task.args["job_id"].as_str().unwrap().to_string();
        let chunk_index = task.args["chunk_index"].as_u64().unwrap() as u32;
        h.use_cases.run_chunk(&job_id, chunk_index).await.unwrap();
    }
}

#[tokio::test]
async fn forty_five_rows_run_in_three_chunks_to_completion() {
    let mut rows = vec![header()];
    for i in 1..=45 {
        rows.push(data_row(&format!("Page {i}")));
    }
    let h = harness(rows, base_config());
    let mut events = h.use_cases.subscribe();

    let receipt = h.use_cases.start_import(false).await.unwrap();
    assert_eq!(receipt.total_rows, 45);
    assert_eq!(receipt.total_batches, 3);

    drive(&h).await;

    let job = h
        .use_cases
        .get_results(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(job.completed);
    assert_eq!(job.created, 45);
    assert_eq!(job.created + job.updated + job.skipped + job.errors, job.total);
    assert_eq!(job.details.len(), 45);
    // Data starts at spreadsheet row 2, header excluded.
    assert_eq!(job.details[0].row_number, 2);
    assert_eq!(job.details[44].row_number, 46);
    assert_eq!(h.pages.page_count().await, 45);

    let progress = h
        .use_cases
        .get_progress(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(progress.is_complete);
    assert_eq!(progress.percentage, 100);
    assert_eq!(progress.processed_batches, 3);
    assert_eq!(progress.total_batches, 3);

    let mut chunk_events = 0;
    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ImportEvent::Started { total_rows, .. } => assert_eq!(total_rows, 45),
            ImportEvent::ChunkCompleted { .. } => chunk_events += 1,
            ImportEvent::Completed { job, .. } => {
                saw_completed = true;
                assert_eq!(job.created, 45);
            }
            ImportEvent::StateMissing { .. } => panic!("no state should go missing"),
        }
    }
    assert_eq!(chunk_events, 3);
    assert!(saw_completed);
}

#[tokio::test]
async fn progress_is_partial_after_the_first_chunk() {
    let mut rows = vec![header()];
    for i in 1..=45 {
        rows.push(data_row(&format!("Page {i}")));
    }
    let h = harness(rows, base_config());
    let receipt = h.use_cases.start_import(false).await.unwrap();

    // Run only chunk 0; the successor stays queued.
    let task = h.queue.pop_task().await.unwrap();
    let job_id = task.args["job_id"].as_str().unwrap().to_string();
    h.use_cases.run_chunk(&job_id, 0).await.unwrap();
    assert_eq!(h.queue.pending_count().await, 1);

    let progress = h
        .use_cases
        .get_progress(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!progress.is_complete);
    assert_eq!(progress.processed_batches, 1);
    assert_eq!(progress.total_batches, 3);
    assert_eq!(progress.percentage, 20 * 100 / 45);
}

#[tokio::test]
async fn created_page_gets_block_content_meta_and_taxonomy() {
    let mut config = base_config();
    config.blocks = vec![BlockConfig {
        block_id: 7,
        enabled: true,
        order: 1,
        fields: vec![FieldConfig {
            field_id: "heading".to_string(),
            column_index: 6,
            is_image: false,
            is_repeater: false,
        }],
    }];

    let mut row = data_row("Launch Page");
    row.push("Welcome aboard".to_string());
    let h = harness(vec![header(), row], config);
    h.pages
        .add_block_template(7, r#"{"name":"acf/hero","data":{"heading":""}}"#)
        .await;

    let receipt = h.use_cases.start_import(false).await.unwrap();
    drive(&h).await;

    let job = h
        .use_cases
        .get_results(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.created, 1);
    let page_id = job.details[0].page_id.unwrap();

    let body = h.pages.page_body(page_id).await.unwrap();
    assert!(body.contains(r#""heading":"Welcome aboard""#));
    assert_eq!(
        h.pages.meta(page_id, "_yoast_wpseo_title").await.as_deref(),
        Some("Launch Page SEO")
    );
    assert_eq!(
        h.pages.meta(page_id, "_yoast_wpseo_focuskw").await.as_deref(),
        Some("keyword")
    );
    assert_eq!(
        h.pages
            .meta(page_id, "_yoast_wpseo_metadesc")
            .await
            .as_deref(),
        Some("About Launch Page")
    );
    assert_eq!(h.pages.term(page_id, "roles").await.as_deref(), Some("Editor"));
    assert_eq!(
        h.pages.page_title(page_id).await.as_deref(),
        Some("Launch Page")
    );
}

#[tokio::test]
async fn queue_refusal_at_start_surfaces_a_scheduling_error() {
    let h = harness_with_queue(
        vec![header(), data_row("Page")],
        base_config(),
        Arc::new(InMemoryWorkQueue::refusing()),
    );

    let err = h.use_cases.start_import(false).await.unwrap_err();
    assert!(err.to_string().contains("rejected scheduling"));
    assert_eq!(h.pages.page_count().await, 0);
}

#[tokio::test]
async fn mid_run_queue_refusal_stops_the_run_but_keeps_outcomes() {
    let mut rows = vec![header()];
    for i in 1..=25 {
        rows.push(data_row(&format!("Page {i}")));
    }
    let queue = Arc::new(InMemoryWorkQueue::default());
    let h = harness_with_queue(rows, base_config(), queue.clone());
    let receipt = h.use_cases.start_import(false).await.unwrap();
    assert_eq!(receipt.total_batches, 2);

    // The queue goes down after accepting chunk 0.
    let task = queue.pop_task().await.unwrap();
    queue.set_refusing(true);
    let job_id = task.args["job_id"].as_str().unwrap().to_string();
    let err = h.use_cases.run_chunk(&job_id, 0).await.unwrap_err();
    assert!(err.to_string().contains("rejected scheduling"));

    // Chunk 0 outcomes survive the refusal; the run just never finishes.
    let job = h
        .use_cases
        .get_results(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!job.completed);
    assert_eq!(job.details.len(), 20);
    assert_eq!(job.created, 20);
    assert_eq!(h.pages.page_count().await, 20);
    assert_eq!(queue.pending_count().await, 0);
}

#[tokio::test]
async fn existing_pages_are_skipped_unless_update_is_requested() {
    let rows = vec![header(), data_row("Existing Page")];
    let h = harness(rows.clone(), base_config());
    let existing_id = h.pages.create("Existing Page", "old body").await.unwrap();

    let receipt = h.use_cases.start_import(false).await.unwrap();
    drive(&h).await;

    let job = h
        .use_cases
        .get_results(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.skipped, 1);
    assert_eq!(job.details[0].status, RowStatus::Skipped);
    assert_eq!(job.details[0].message, "Page already exists");
    assert_eq!(
        h.pages.page_body(existing_id).await.as_deref(),
        Some("old body")
    );

    // Same rows with the update flag rewrite the page instead.
    let h2 = harness(rows, base_config());
    let existing_id = h2.pages.create("Existing Page", "old body").await.unwrap();
    let receipt = h2.use_cases.start_import(true).await.unwrap();
    drive(&h2).await;

    let job = h2
        .use_cases
        .get_results(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.updated, 1);
    assert_ne!(
        h2.pages.page_body(existing_id).await.as_deref(),
        Some("old body")
    );
}

#[tokio::test]
async fn rows_without_titles_are_counted_as_skipped() {
    let rows = vec![
        header(),
        data_row("Good Page"),
        vec![
            "bad".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            "   ".to_string(),
        ],
        // Short row, padded before processing.
        vec!["tiny".to_string()],
    ];
    let h = harness(rows, base_config());
    let receipt = h.use_cases.start_import(false).await.unwrap();
    drive(&h).await;

    let job = h
        .use_cases
        .get_results(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.created, 1);
    assert_eq!(job.skipped, 2);
    assert_eq!(job.errors, 0);
    assert_eq!(job.details[1].message, "Empty title");
    assert_eq!(job.details[2].message, "Empty title");
}

#[tokio::test]
async fn chunk_step_for_unknown_job_aborts_with_a_diagnostic_event() {
    let h = harness(vec![header(), data_row("Page")], base_config());
    let mut events = h.use_cases.subscribe();

    // Simulates a stale queue entry after the job state expired.
    h.use_cases.run_chunk("import-gone", 1).await.unwrap();

    match events.try_recv().unwrap() {
        ImportEvent::StateMissing {
            job_id,
            chunk_index,
            what,
        } => {
            assert_eq!(job_id, "import-gone");
            assert_eq!(chunk_index, 1);
            assert_eq!(what, MissingState::JobRecord);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(h.pages.page_count().await, 0);
}

#[tokio::test]
async fn start_rejects_missing_configuration_and_empty_sheets() {
    let h = harness(vec![header(), data_row("Page")], ImportConfig::default());
    let err = h.use_cases.start_import(false).await.unwrap_err();
    assert!(err.to_string().contains("spreadsheet id"));

    let h = harness(vec![], base_config());
    let err = h.use_cases.start_import(false).await.unwrap_err();
    assert!(err.to_string().contains("no data found"));

    let h = harness(vec![header()], base_config());
    let err = h.use_cases.start_import(false).await.unwrap_err();
    assert!(err.to_string().contains("header"));
}

#[tokio::test]
async fn run_settings_are_cleaned_up_after_completion() {
    let h = harness(vec![header(), data_row("Page")], base_config());
    let receipt = h.use_cases.start_import(false).await.unwrap();
    drive(&h).await;

    // Progress blob survives for reporting; a replayed chunk task now
    // finds no chunk data and abandons the step.
    let mut events = h.use_cases.subscribe();
    h.use_cases.run_chunk(&receipt.job_id, 0).await.unwrap();
    match events.try_recv().unwrap() {
        ImportEvent::StateMissing { what, .. } => assert_eq!(what, MissingState::ChunkData),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(h.pages.page_count().await, 1);

    let task_args: Option<Value> = h.queue.pop_task().await.map(|t| t.args);
    assert!(task_args.is_none());
}
