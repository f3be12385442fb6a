//! Integration tests for the render pipeline against the fixture views.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing_subscriber::fmt::MakeWriter;
use vista_core::{
    RequestMeta, ResponseMeta, ViewConfig, ViewEngine, ViewRequest, ViewResponse,
    MISSING_PARTIAL_PREFIX,
};

fn views_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("views")
}

fn config(root: impl Into<PathBuf>) -> ViewConfig {
    ViewConfig::new(root)
        .layout("layout.html")
        .helper("sitename", "connect-render demo site")
        .helper("overwrite", "default")
        .helper_fn("requestURL", |req, _res| json!(req.url))
}

fn engine(cache: bool) -> ViewEngine {
    ViewEngine::new(config(views_path()).cache(cache))
}

async fn get(engine: &ViewEngine, url: &str, request: ViewRequest) -> ViewResponse {
    engine
        .respond(&request, &RequestMeta::new("GET", url), &ResponseMeta::new())
        .await
}

/// Collects formatted log output so tests can inspect diagnostics.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_render_with_layout_and_helpers() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/",
        ViewRequest::from_locals("index.html", json!({"name": "fengmk2"})),
    )
    .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.content_type, "text/html; charset=utf-8");
    assert_eq!(
        res.body,
        "<html><head><title>connect-render demo site</title></head>\
         <body><p>Hello fengmk2, you asked for /</p></body></html>"
    );
}

#[tokio::test]
async fn test_cache_is_populated_and_reused() {
    let engine = engine(true);
    let index = views_path().join("index.html");
    let layout = views_path().join("layout.html");
    assert!(!engine.cache().contains(&index));
    assert!(!engine.cache().contains(&layout));

    let request = ViewRequest::from_locals("index.html", json!({"name": "fengmk2"}));
    let first = get(&engine, "/", request.clone()).await;
    assert!(engine.cache().contains(&index));
    assert!(engine.cache().contains(&layout));

    let cached = engine.cache().get(&index).unwrap();
    let second = get(&engine, "/", request).await;
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&cached, &engine.cache().get(&index).unwrap()));
    assert_eq!(engine.cache().len(), 2);
}

#[tokio::test]
async fn test_cached_view_survives_file_removal() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("page.html"), "cached <%= name %>").unwrap();
    let engine = ViewEngine::new(ViewConfig::new(temp.path()).no_layout());
    let request = ViewRequest::new("page").local("name", "once");

    assert_eq!(get(&engine, "/", request.clone()).await.body, "cached once");

    std::fs::remove_file(temp.path().join("page.html")).unwrap();
    let res = get(&engine, "/", request).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "cached once");
}

#[tokio::test]
async fn test_disabled_cache_recompiles_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let page = temp.path().join("page.html");
    std::fs::write(&page, "v1").unwrap();
    let engine = ViewEngine::new(ViewConfig::new(temp.path()).no_layout().cache(false));

    assert_eq!(get(&engine, "/", ViewRequest::new("page.html")).await.body, "v1");
    std::fs::write(&page, "v2").unwrap();
    assert_eq!(get(&engine, "/", ViewRequest::new("page.html")).await.body, "v2");
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_explicit_content_type_is_kept() {
    let engine = engine(true);
    let res = engine
        .respond(
            &ViewRequest::from_locals("xml.html", json!({"layout": false})),
            &RequestMeta::new("GET", "/xml"),
            &ResponseMeta::new().content_type("text/xml"),
        )
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.content_type, "text/xml; charset=utf-8");
    assert_eq!(
        res.body,
        "<?xml version=\"1.0\"?><site>connect-render demo site</site>"
    );
}

#[tokio::test]
async fn test_missing_view_is_500_with_enoent() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/viewerror",
        ViewRequest::from_locals("noexists.html", json!({"name": "fengmk2"})),
    )
    .await;

    assert_eq!(res.status, 500);
    assert!(res.body.contains("ENOENT"));
    assert!(res.body.contains("noexists.html"));
}

#[tokio::test]
async fn test_layout_false_renders_inner_view_only() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/nolayout",
        ViewRequest::from_locals("nolayout.html", json!({"layout": false})),
    )
    .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, "nolayout");
    assert!(!engine.cache().contains(&views_path().join("layout.html")));
}

#[tokio::test]
async fn test_template_error_is_500_reference_error() {
    let engine = engine(true);
    let res = get(&engine, "/error", ViewRequest::new("error.html")).await;

    assert_eq!(res.status, 500);
    assert!(res.body.contains("ReferenceError: "));
    assert!(res.body.contains("error_var is not defined"));
    assert!(res.body.contains("error.html:2"));
}

#[tokio::test]
async fn test_layout_error_is_500() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/layout_error",
        ViewRequest::from_locals("index.html", json!({"layout": "error.html", "name": "fengmk2"})),
    )
    .await;

    assert_eq!(res.status, 500);
    assert!(res.body.contains("error_var is not defined"));
    // the inner view rendered fine, so only the layout was compiled after it
    assert!(engine.cache().contains(&views_path().join("index.html")));
    assert!(engine.cache().contains(&views_path().join("error.html")));
}

#[tokio::test]
async fn test_filters() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/filters",
        ViewRequest::from_locals("filters.html", json!({"layout": false})),
    )
    .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, "你… | /filters\n");
}

#[tokio::test]
async fn test_local_overrides_helper_for_one_call() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/overwrite",
        ViewRequest::from_locals("overwrite.html", json!({"layout": false, "overwrite": "success"})),
    )
    .await;
    assert_eq!(res.body, "success");

    let res = get(
        &engine,
        "/nooverwrite",
        ViewRequest::from_locals("overwrite.html", json!({"layout": false})),
    )
    .await;
    assert_eq!(res.body, "default");
}

#[tokio::test]
async fn test_partial_in_partial_resolves_from_parent() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/partial_in_partial",
        ViewRequest::from_locals("./partial_in_partial.html", json!({"layout": false})),
    )
    .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, "partialpartial");
    assert!(engine
        .cache()
        .contains(&views_path().join("partials").join("b.html")));
}

#[tokio::test]
async fn test_missing_partial_is_logged_once_and_page_renders() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let engine = engine(true);
    let res = get(
        &engine,
        "/partial_not_exists",
        ViewRequest::from_locals("partial_not_exists.html", json!({"layout": false})),
    )
    .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, "partial_not_exists");

    let output = logs.contents();
    assert_eq!(output.matches(MISSING_PARTIAL_PREFIX).count(), 1);
    assert!(output.contains("Error: cannot load view partial"));
    assert!(output.contains("no such file or directory"));
    assert!(output.contains("Error: ENOENT, no such file or directory"));
    assert!(output.contains("not_exists.html"));
}

#[tokio::test]
async fn test_missing_partial_is_logged_per_inclusion_reached() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("page.html"),
        "x<% include gone.html %>y<% include gone.html %><% if false %><% include other.html %><% end %>",
    )
    .unwrap();
    let engine = ViewEngine::new(ViewConfig::new(temp.path()).no_layout());
    let res = get(&engine, "/", ViewRequest::new("page.html")).await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, "xy");
    let output = logs.contents();
    assert_eq!(output.matches(MISSING_PARTIAL_PREFIX).count(), 2);
    assert_eq!(output.matches("gone.html").count(), 4);
    assert!(!output.contains("other.html"));
}

#[tokio::test]
async fn test_partial_in_untaken_branch_is_not_rendered() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("page.html"),
        "hi<% if user %><% include card.html %><% end %>",
    )
    .unwrap();
    std::fs::write(temp.path().join("card.html"), "<%= user.name %>").unwrap();
    let engine = ViewEngine::new(ViewConfig::new(temp.path()).no_layout());

    let res = get(
        &engine,
        "/",
        ViewRequest::new("page.html").local("user", serde_json::Value::Null),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "hi");

    let res = get(
        &engine,
        "/",
        ViewRequest::new("page.html").local("user", json!({"name": "ada"})),
    )
    .await;
    assert_eq!(res.body, "hiada");
}

#[tokio::test]
async fn test_broken_partial_in_untaken_branch_does_not_fail_page() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("page.html"),
        "ok<% if false %><% include broken.html %><% end %>",
    )
    .unwrap();
    std::fs::write(temp.path().join("broken.html"), "<% if x %>").unwrap();
    let engine = ViewEngine::new(ViewConfig::new(temp.path()).no_layout());

    let res = get(&engine, "/", ViewRequest::new("page.html")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "ok");
}

#[tokio::test]
async fn test_partial_sees_loop_variable() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("list.html"),
        "<% for item in items %><% include row.html %><% end %>",
    )
    .unwrap();
    std::fs::write(temp.path().join("row.html"), "<li><%= item %></li>").unwrap();
    let engine = ViewEngine::new(ViewConfig::new(temp.path()).no_layout());

    let res = get(
        &engine,
        "/",
        ViewRequest::new("list.html").local("items", json!(["a", "b"])),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "<li>a</li><li>b</li>");
}

#[tokio::test]
async fn test_include() {
    let engine = engine(true);
    let res = get(
        &engine,
        "/include",
        ViewRequest::from_locals(
            "include.html",
            json!({"layout": false, "name": "fengmk2", "index": "index"}),
        ),
    )
    .await;

    assert_eq!(res.status, 200);
    assert_eq!(
        res.body,
        "Hi, I will include \"be_included\".\nI should be included\n\n"
    );
}

#[tokio::test]
async fn test_loop_with_filters() {
    let engine = engine(false);
    let res = get(
        &engine,
        "/list",
        ViewRequest::new("list")
            .local("users", json!([{"name": "alice"}, {"name": "bob"}]))
            .no_layout(),
    )
    .await;

    assert_eq!(res.body, "<li>Alice</li><li>Bob</li>");
}

#[tokio::test]
async fn test_traversal_outside_root_is_rejected() {
    let engine = engine(true);
    let res = get(&engine, "/", ViewRequest::new("../../Cargo.toml").no_layout()).await;

    assert_eq!(res.status, 500);
    assert!(res.body.contains("outside of the views root"));
}

#[tokio::test]
async fn test_concurrent_renders_share_the_cache() {
    let engine = Arc::new(engine(true));
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let request = ViewRequest::from_locals("index.html", json!({"name": format!("user{}", i)}));
            get(&engine, "/", request).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let res = handle.await.unwrap();
        assert_eq!(res.status, 200);
        assert!(res.body.contains(&format!("Hello user{}", i)));
    }
    assert_eq!(engine.cache().len(), 2);
}

#[tokio::test]
async fn test_check_all_reports_syntax_errors() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("good.html"), "<%= ok %>").unwrap();
    std::fs::create_dir(temp.path().join("nested")).unwrap();
    std::fs::write(temp.path().join("nested").join("bad.html"), "<% if x %>").unwrap();
    std::fs::write(temp.path().join("notes.txt"), "<% ignored").unwrap();

    let engine = ViewEngine::new(ViewConfig::new(temp.path()));
    assert_eq!(engine.template_files().len(), 2);

    let failures = engine.check_all().await;
    assert_eq!(failures.len(), 1);
    assert!(failures[0].0.ends_with("nested/bad.html"));
    assert_eq!(failures[0].1.class_name(), "SyntaxError");
    assert!(engine.cache().is_empty());
}
