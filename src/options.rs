//! Option Resolver - Untyped Request to Typed Options
//!
//! `media_id` is the only field that can fail resolution.
//! Every other field is optional: absence or a wrong type produces a notice
//! and falls back to the default. Notices are logged, never returned as errors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Loosely typed parameter bag supplied by the invoking harness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationRequest(Map<String, Value>);

impl InvocationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for harnesses and tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for InvocationRequest {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Target grid size handed to the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Dimensions {
    /// Renderer picks the size.
    #[default]
    Default,
    /// Columns fixed, rows inferred from the image aspect ratio.
    Width { width: u32 },
    /// Rows fixed, columns inferred from the image aspect ratio.
    Height { height: u32 },
    /// Both fixed; no inference.
    Fixed { width: u32, height: u32 },
}

/// Fully defaulted rendering configuration. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub dimensions: Dimensions,
    pub complex: bool,
    pub negative: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub output_dir: PathBuf,
    pub save_only: bool,
}

impl RenderOptions {
    /// Defaults with output written to `dir`.
    pub fn staged_in(dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::Default,
            complex: false,
            negative: false,
            flip_x: false,
            flip_y: false,
            output_dir: std::env::temp_dir(),
            save_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    /// Field absent; default used.
    Info,
    /// Field present but unusable; default used.
    Warning,
}

/// A recoverable resolution condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionNotice {
    pub field: String,
    pub severity: NoticeSeverity,
    pub message: String,
}

impl OptionNotice {
    fn absent(field: &str) -> Self {
        Self {
            field: field.to_string(),
            severity: NoticeSeverity::Info,
            message: format!("No {} provided", field),
        }
    }

    fn malformed(field: &str, actual: &Value, expected: &str) -> Self {
        Self {
            field: field.to_string(),
            severity: NoticeSeverity::Warning,
            message: format!("Ignoring {}: expected {}, got {}", field, expected, actual),
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub subject_id: String,
    pub options: RenderOptions,
    pub notices: Vec<OptionNotice>,
}

/// Resolve against the stock defaults.
pub fn resolve(request: &InvocationRequest) -> Result<ResolvedRequest, PipelineError> {
    resolve_with(request, &RenderOptions::default())
}

/// Overlay the fields present in `request` on `defaults`.
pub fn resolve_with(
    request: &InvocationRequest,
    defaults: &RenderOptions,
) -> Result<ResolvedRequest, PipelineError> {
    let subject_id = match request.get("media_id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(PipelineError::MissingSubject),
    };

    let mut notices = vec![];

    // Character cells are about twice as tall as wide, so width is doubled.
    let width = read_dimension(request, "width", 2, &mut notices);
    let height = read_dimension(request, "height", 1, &mut notices);
    let dimensions = match (width, height) {
        (Some(width), Some(height)) => Dimensions::Fixed { width, height },
        (Some(width), None) => Dimensions::Width { width },
        (None, Some(height)) => Dimensions::Height { height },
        (None, None) => defaults.dimensions,
    };

    let options = RenderOptions {
        dimensions,
        complex: read_flag(request, "complex", defaults.complex, &mut notices),
        negative: read_flag(request, "negative", defaults.negative, &mut notices),
        flip_x: read_flag(request, "flip_x", defaults.flip_x, &mut notices),
        flip_y: read_flag(request, "flip_y", defaults.flip_y, &mut notices),
        output_dir: defaults.output_dir.clone(),
        save_only: true,
    };

    for notice in &notices {
        match notice.severity {
            NoticeSeverity::Info => debug!(field = %notice.field, "{}", notice.message),
            NoticeSeverity::Warning => warn!(field = %notice.field, "{}", notice.message),
        }
    }
    debug!(media_id = %subject_id, ?options, "resolved render options");

    Ok(ResolvedRequest {
        subject_id,
        options,
        notices,
    })
}

fn read_dimension(
    request: &InvocationRequest,
    field: &str,
    scale: u32,
    notices: &mut Vec<OptionNotice>,
) -> Option<u32> {
    let value = match request.get(field) {
        Some(value) => value,
        None => {
            notices.push(OptionNotice::absent(field));
            return None;
        }
    };

    let scaled = value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.trunc() * f64::from(scale))
        .filter(|n| *n <= f64::from(u32::MAX));

    match scaled {
        Some(n) => Some(n as u32),
        None => {
            notices.push(OptionNotice::malformed(field, value, "a non-negative number"));
            None
        }
    }
}

fn read_flag(
    request: &InvocationRequest,
    field: &str,
    default: bool,
    notices: &mut Vec<OptionNotice>,
) -> bool {
    match request.get(field) {
        Some(Value::Bool(flag)) => *flag,
        Some(other) => {
            notices.push(OptionNotice::malformed(field, other, "a boolean"));
            default
        }
        None => {
            notices.push(OptionNotice::absent(field));
            default
        }
    }
}
