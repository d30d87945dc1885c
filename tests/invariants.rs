//! Contract Invariant Tests
//!
//! These tests drive the whole pipeline against an in-memory store.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use asciiart_core::{
    config::StorageConfig, render::CELL_HEIGHT, render::CELL_WIDTH, AsciiRenderer, BlobStore,
    Config, Dimensions, ErrorKind, InvocationRequest, MemoryStore, Pipeline, RenderFailure,
    RenderOptions, Renderer, S3Pipeline, StagingArea, StorageError,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use tempfile::TempDir;

/// Memory store that logs every call and can be told to fail.
#[derive(Default)]
struct ScriptedStore {
    inner: MemoryStore,
    fail_get: bool,
    fail_put: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStore {
    fn with_source(key: &str, body: &[u8]) -> Self {
        let store = Self::default();
        store.inner.insert(key, body.to_vec());
        store
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn puts(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("put ")).count()
    }
}

impl BlobStore for ScriptedStore {
    fn get_to_writer(&self, key: &str, sink: &mut (dyn Write + Send)) -> Result<u64, StorageError> {
        self.calls.lock().unwrap().push(format!("get {}", key));
        if self.fail_get {
            return Err(StorageError::Backend("connection reset".into()));
        }
        self.inner.get_to_writer(key, sink)
    }

    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(format!("put {}", key));
        if self.fail_put {
            return Err(StorageError::Backend("access denied".into()));
        }
        self.inner.put(key, body, content_type)
    }
}

/// Copies the source to the output, or fails, and remembers the options.
#[derive(Default)]
struct ScriptedRenderer {
    fail: bool,
    seen: Mutex<Vec<RenderOptions>>,
}

impl Renderer for ScriptedRenderer {
    fn render(
        &self,
        source: &Path,
        options: &RenderOptions,
        output: &Path,
    ) -> Result<(), RenderFailure> {
        self.seen.lock().unwrap().push(options.clone());
        if self.fail {
            return Err(RenderFailure::Other("unsupported format".into()));
        }
        fs::copy(source, output)
            .map(|_| ())
            .map_err(|e| RenderFailure::Other(e.to_string()))
    }
}

fn request(value: serde_json::Value) -> InvocationRequest {
    serde_json::from_value(value).unwrap()
}

fn staged_files(dir: &TempDir) -> usize {
    fs::read_dir(dir.path()).unwrap().count()
}

fn sample_jpeg() -> Vec<u8> {
    let img = RgbImage::from_fn(40, 20, |x, y| {
        let v = ((x + y) * 4) as u8;
        Rgb([v, v / 2, 255 - v])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .unwrap();
    bytes.into_inner()
}

#[test]
fn invariant_success_publishes_derived_key() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::with_source("abc123.jpeg", b"source");
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let result = pipeline.handle(&request(json!({"media_id": "abc123"})));

    assert_eq!(result.body, "abc123-ascii-art.png");
    assert_eq!(
        store.calls(),
        vec!["get abc123.jpeg", "put abc123-ascii-art.png"]
    );
    let published = store.inner.object("abc123-ascii-art.png").unwrap();
    assert_eq!(published.body, b"source");
}

#[test]
fn invariant_missing_media_id_does_no_io() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::default();
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    for bad in [json!({}), json!({"media_id": 7}), json!({"width": 50, "height": 80})] {
        let outcome = pipeline.handle_detailed(&request(bad));
        assert!(!outcome.ok);
        assert_eq!(outcome.error_kind, Some(ErrorKind::MissingSubject));
        assert_eq!(outcome.body, "Error getting media_id");
    }
    assert!(store.calls().is_empty());
    assert!(renderer.seen.lock().unwrap().is_empty());
}

#[test]
fn invariant_resolved_dimensions_reach_renderer() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::with_source("abc123.jpeg", b"source");
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    pipeline.handle(&request(json!({"media_id": "abc123", "width": 50})));
    pipeline.handle(&request(json!({"media_id": "abc123", "width": 50, "height": 80})));
    pipeline.handle(&request(json!({"media_id": "abc123", "width": "wide", "flip_y": true})));

    let seen = renderer.seen.lock().unwrap();
    assert_eq!(seen[0].dimensions, Dimensions::Width { width: 100 });
    assert_eq!(
        seen[1].dimensions,
        Dimensions::Fixed {
            width: 100,
            height: 80
        }
    );
    assert_eq!(seen[2].dimensions, Dimensions::Default);
    assert!(seen[2].flip_y);
    assert!(seen.iter().all(|o| o.save_only && o.output_dir == dir.path()));
}

#[test]
fn invariant_rerun_overwrites_same_key() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::with_source("abc123.jpeg", b"source");
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let input = request(json!({"media_id": "abc123", "complex": true}));
    let first = pipeline.handle(&input);
    let second = pipeline.handle(&input);

    assert_eq!(first, second);
    assert_eq!(
        store.inner.keys(),
        vec!["abc123-ascii-art.png".to_string(), "abc123.jpeg".to_string()]
    );
    assert_eq!(store.puts(), 2);
}

#[test]
fn invariant_get_failure_skips_render_and_publish() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore {
        fail_get: true,
        ..ScriptedStore::with_source("abc123.jpeg", b"source")
    };
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "abc123"})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::StorageRead));
    assert!(outcome.body.starts_with("Error getting object"));
    assert!(outcome.body.contains("connection reset"));
    assert_eq!(store.puts(), 0);
    assert!(renderer.seen.lock().unwrap().is_empty());
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_missing_source_reported() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::default();
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "ghost"})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::ObjectNotFound));
    assert!(outcome.body.contains("ghost.jpeg"));
    assert_eq!(store.puts(), 0);
}

#[test]
fn invariant_render_failure_skips_publish() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::with_source("abc123.jpeg", b"source");
    let renderer = ScriptedRenderer {
        fail: true,
        ..ScriptedRenderer::default()
    };
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "abc123"})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::Render));
    assert_eq!(outcome.body, "Error converting image: unsupported format");
    assert_eq!(store.calls(), vec!["get abc123.jpeg"]);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_publish_failure_leaves_source_untouched() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore {
        fail_put: true,
        ..ScriptedStore::with_source("abc123.jpeg", b"source")
    };
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "abc123"})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::StorageWrite));
    assert!(outcome.body.starts_with("Error uploading file"));
    assert!(outcome.body.contains("access denied"));
    assert_eq!(store.inner.keys(), vec!["abc123.jpeg".to_string()]);
    assert_eq!(store.inner.object("abc123.jpeg").unwrap().body, b"source");
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_staging_empty_after_success() {
    let dir = TempDir::new().unwrap();
    let store = ScriptedStore::with_source("abc123.jpeg", b"source");
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(&store, &renderer, StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "abc123"})));

    assert!(outcome.ok);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_real_renderer_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.insert("photo42.jpeg", sample_jpeg());
    let pipeline = Pipeline::new(&store, AsciiRenderer::new(), StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({
        "media_id": "photo42",
        "width": 12,
        "height": 6,
        "complex": true,
        "negative": true
    })));

    assert!(outcome.ok, "{}", outcome.body);
    assert_eq!(outcome.body, "photo42-ascii-art.png");

    let published = store.object("photo42-ascii-art.png").unwrap();
    assert_eq!(published.content_type.as_deref(), Some("image/png"));
    let png = image::load_from_memory_with_format(&published.body, ImageFormat::Png).unwrap();
    assert_eq!(png.width(), 24 * CELL_WIDTH);
    assert_eq!(png.height(), 6 * CELL_HEIGHT);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_undecodable_source_is_render_error() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.insert("broken.jpeg", b"definitely not a jpeg".to_vec());
    let pipeline = Pipeline::new(&store, AsciiRenderer::new(), StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "broken"})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::Render));
    assert!(outcome.body.starts_with("Error converting image"));
    assert_eq!(store.keys(), vec!["broken.jpeg".to_string()]);
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_zero_width_is_render_error() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.insert("photo42.jpeg", sample_jpeg());
    let pipeline = Pipeline::new(&store, AsciiRenderer::new(), StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "photo42", "width": 0})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::Render));
    assert!(outcome.body.contains("empty dimensions"));
}

#[test]
fn invariant_missing_credentials_is_connect_error() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage = StorageConfig {
        bucket: Some("media".into()),
        ..StorageConfig::default()
    };
    config.staging.dir = dir.path().to_path_buf();
    let pipeline = S3Pipeline::from_config(&config);

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "abc123"})));

    assert_eq!(outcome.error_kind, Some(ErrorKind::StorageConnect));
    assert!(outcome.body.starts_with("Error creating session"));
    assert_eq!(staged_files(&dir), 0);
}

#[test]
fn invariant_default_sizing_fits_tall_images() {
    let dir = TempDir::new().unwrap();
    let tall = RgbImage::from_fn(20, 2000, |_, y| {
        let v = (y % 256) as u8;
        Rgb([v, v, v])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(tall)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .unwrap();
    let store = MemoryStore::new();
    store.insert("tall.jpeg", bytes.into_inner());
    let pipeline = Pipeline::new(&store, AsciiRenderer::new(), StagingArea::new(dir.path()));

    let outcome = pipeline.handle_detailed(&request(json!({"media_id": "tall"})));

    assert!(outcome.ok, "{}", outcome.body);
    assert_eq!(outcome.body, "tall-ascii-art.png");
    let published = store.object("tall-ascii-art.png").unwrap();
    let png = image::load_from_memory_with_format(&published.body, ImageFormat::Png).unwrap();
    let cells = u64::from(png.width() / CELL_WIDTH) * u64::from(png.height() / CELL_HEIGHT);
    assert!(cells <= asciiart_core::render::MAX_CELLS);
    assert_eq!(staged_files(&dir), 0);
}
