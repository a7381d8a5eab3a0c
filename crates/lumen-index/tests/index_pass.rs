use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lumen_core::events::IndexProgress;
use lumen_core::{AppContext, LumenConfig};
use lumen_index::{BuildOutcome, IndexBuilder, IndexScheduler};
use lumen_service::{LaunchError, LaunchedService, RetrievalClient, ServiceLauncher, ServiceManager};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Never manages to start a service; the tests rely on a healthy mock.
struct NoLauncher;

#[async_trait]
impl ServiceLauncher for NoLauncher {
    async fn launch(&self, _port: u16) -> Result<LaunchedService, LaunchError> {
        Err(LaunchError::Exited)
    }
}

struct Harness {
    _storage: tempfile::TempDir,
    project: tempfile::TempDir,
    ctx: Arc<AppContext>,
    builder: IndexBuilder,
}

impl Harness {
    fn new(server: Option<&MockServer>, local_rag: bool) -> Self {
        let storage = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let mut config = LumenConfig::default();
        config.storage.dir = Some(storage.path().to_path_buf());
        config.recall.local_rag = local_rag;
        let ctx = Arc::new(AppContext::new(config).unwrap());
        if let Some(server) = server {
            ctx.state().set_rag_port(server.address().port()).unwrap();
        }
        let manager = ServiceManager::with_launcher(ctx.clone(), Arc::new(NoLauncher));
        let client = RetrievalClient::new(Arc::new(manager));
        let builder = IndexBuilder::new(ctx.clone(), client);
        Self {
            _storage: storage,
            project,
            ctx,
            builder,
        }
    }

    fn root(&self) -> &Path {
        self.project.path()
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn manifest_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(self.builder.manifest_path(self.root()).unwrap()).ok()
    }
}

async fn service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "version": "1.1.0"})))
        .mount(&server)
        .await;
    for endpoint in ["/submitChunks", "/deleteChunks", "/reset-index"] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }
    server
}

async fn posted(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == endpoint)
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

fn completed(outcome: BuildOutcome) -> lumen_index::BuildReport {
    match outcome {
        BuildOutcome::Completed(report) => report,
        other => panic!("pass did not complete: {other:?}"),
    }
}

#[tokio::test]
async fn single_function_project_submits_one_chunk() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    let source = "function add(a,b){return a+b}";
    h.write("a.ts", source);

    let report = completed(h.builder.build(h.root(), true).await.unwrap());
    assert_eq!(report.indexed_files, 1);
    assert_eq!(report.submitted_chunks, 1);
    assert_eq!(report.failed_submissions, 0);

    let submissions = posted(&server, "/submitChunks").await;
    assert_eq!(submissions.len(), 2);
    let records = submissions[0]["changedRecords"]["a.ts"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["code"], source);
    assert_eq!(submissions[0]["submitEnd"], false);
    assert_eq!(submissions[1]["submitEnd"], true);
    assert!(submissions[1].get("changedRecords").is_none());

    let manifest = h
        .builder
        .store()
        .read(&h.builder.manifest_path(h.root()).unwrap())
        .unwrap();
    assert_eq!(manifest.indexed_files.len(), 1);
    assert_eq!(manifest.indexed_files[0].file_path, "a.ts");
    assert_eq!(
        manifest.indexed_files[0].file_hash,
        format!("{:x}", Sha256::digest(source.as_bytes()))
    );
    assert!(posted(&server, "/deleteChunks").await.is_empty());
}

#[tokio::test]
async fn deleted_file_is_reported_once() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("src/keep.ts", "export function keep() {}\n");
    h.write("src/gone.ts", "export function gone() {}\n");
    completed(h.builder.build(h.root(), true).await.unwrap());

    std::fs::remove_file(h.root().join("src/gone.ts")).unwrap();
    let report = completed(h.builder.build(h.root(), true).await.unwrap());
    assert_eq!(report.deleted_files, 1);

    let deletions = posted(&server, "/deleteChunks").await;
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0]["deletedFiles"], json!(["src/gone.ts"]));

    let manifest = h
        .builder
        .store()
        .read(&h.builder.manifest_path(h.root()).unwrap())
        .unwrap();
    let paths: Vec<_> = manifest.indexed_files.iter().map(|f| f.file_path.as_str()).collect();
    assert_eq!(paths, vec!["src/keep.ts"]);
}

#[tokio::test]
async fn unchanged_tree_yields_identical_manifest() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("src/a.ts", "export const a = () => 1;\nfunction b() { return 2 }\n");
    h.write("src/c.js", "class C { m() {} }\n");
    h.write("lib/d.tsx", "export function D() { return null }\n");

    completed(h.builder.build(h.root(), true).await.unwrap());
    let first = h.manifest_bytes().unwrap();
    completed(h.builder.build(h.root(), true).await.unwrap());
    assert_eq!(h.manifest_bytes().unwrap(), first);
    assert!(posted(&server, "/deleteChunks").await.is_empty());
}

#[tokio::test]
async fn batches_flush_every_ten_files_without_dropping() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    for i in 0..12 {
        h.write(&format!("src/f{i:02}.ts"), &format!("export function f{i}() {{ return {i} }}\n"));
    }
    h.write("src/types.ts", "export interface Shape { w: number }\n");

    let report = completed(h.builder.build(h.root(), true).await.unwrap());
    assert_eq!(report.indexed_files, 13);
    assert_eq!(report.submitted_chunks, 12);

    let submissions = posted(&server, "/submitChunks").await;
    assert_eq!(submissions.len(), 3);
    let files_in = |i: usize| submissions[i]["changedRecords"].as_object().unwrap().len();
    assert_eq!(files_in(0), 10);
    assert_eq!(files_in(1), 2);
    assert_eq!(submissions[2]["submitEnd"], true);

    let mut seen: Vec<String> = submissions[..2]
        .iter()
        .flat_map(|s| s["changedRecords"].as_object().unwrap().keys().cloned().collect::<Vec<_>>())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 12);
    assert!(!seen.iter().any(|p| p == "src/types.ts"));
}

#[tokio::test]
async fn skipped_files_do_not_stop_the_pass() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("dist-like/app.js", "//# sourceMappingURL=app.js.map\nfunction x() {}\n");
    h.write("src/ok.ts", "function ok() {}\n");

    let report = completed(h.builder.build(h.root(), true).await.unwrap());
    assert_eq!(report.indexed_files, 1);
    assert_eq!(report.skipped_files, 1);
}

#[tokio::test]
async fn offline_service_writes_nothing() {
    let h = Harness::new(None, true);
    h.write("a.ts", "function add(a,b){return a+b}");

    let outcome = h.builder.build(h.root(), true).await.unwrap();
    assert_eq!(outcome, BuildOutcome::ServiceOffline);
    assert!(h.manifest_bytes().is_none());
}

#[tokio::test]
async fn progress_is_published() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("a.ts", "function add(a,b){return a+b}");
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = log.clone();
    h.ctx
        .events()
        .index_progress
        .subscribe(move |p: &IndexProgress| sink.lock().unwrap().push(p.message.clone()));

    completed(h.builder.build(h.root(), true).await.unwrap());
    let name = h.root().canonicalize().unwrap().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            format!("initializing {name}"),
            "generating a.ts".to_string(),
            format!("done {name}"),
        ]
    );
}

#[tokio::test]
async fn reset_removes_the_manifest() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("a.ts", "function add(a,b){return a+b}");
    completed(h.builder.build(h.root(), true).await.unwrap());
    assert!(h.manifest_bytes().is_some());

    h.builder.reset(h.root()).await.unwrap();
    assert!(h.manifest_bytes().is_none());
    assert_eq!(posted(&server, "/reset-index").await.len(), 1);
}

async fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn scheduler_follows_the_local_rag_toggle() {
    let server = service().await;
    let h = Harness::new(Some(&server), false);
    h.write("a.ts", "function add(a,b){return a+b}");
    let scheduler = IndexScheduler::with_timing(
        h.builder.clone(),
        h.root(),
        Duration::from_secs(600),
        Duration::from_millis(20),
    );

    scheduler.start();
    assert!(!scheduler.is_armed());

    h.ctx.set_local_rag(true);
    assert!(scheduler.is_armed());
    assert!(wait_for(|| h.manifest_bytes().is_some()).await);

    h.ctx.set_local_rag(false);
    assert!(!scheduler.is_armed());
}

#[tokio::test]
async fn scheduler_starts_armed_and_disarms() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("a.ts", "function add(a,b){return a+b}");
    let scheduler = IndexScheduler::with_timing(
        h.builder.clone(),
        h.root(),
        Duration::from_secs(600),
        Duration::from_millis(20),
    );

    scheduler.start();
    assert!(scheduler.is_armed());
    scheduler.dispose();
    assert!(!scheduler.is_armed());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.manifest_bytes().is_none());
}

#[tokio::test]
async fn scheduler_repeats_on_its_interval() {
    let server = service().await;
    let h = Harness::new(Some(&server), true);
    h.write("a.ts", "function add(a,b){return a+b}");
    let scheduler = IndexScheduler::with_timing(
        h.builder.clone(),
        h.root(),
        Duration::from_millis(30),
        Duration::from_millis(30),
    );

    scheduler.arm(Duration::from_millis(10));
    let mut passes = 0;
    for _ in 0..200 {
        passes = posted(&server, "/submitChunks")
            .await
            .iter()
            .filter(|s| s["submitEnd"] == true)
            .count();
        if passes >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(passes >= 2);
    scheduler.stop();
}
