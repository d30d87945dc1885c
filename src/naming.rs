//! Blob Naming - Fixed Key Derivation
//!
//! Fetch, render and publish all derive names from here. No other module
//! spells out the literals.

/// Extension of the uploaded source image in storage.
pub const SOURCE_EXTENSION: &str = ".jpeg";

/// Suffix of the published rendering in storage.
pub const OUTPUT_SUFFIX: &str = "-ascii-art.png";

/// Content type attached to published renderings.
pub const OUTPUT_CONTENT_TYPE: &str = "image/png";

/// Storage key (and staged file name) of the source image.
pub fn source_key(subject_id: &str) -> String {
    format!("{}{}", subject_id, SOURCE_EXTENSION)
}

/// Storage key of the published rendering.
pub fn output_key(subject_id: &str) -> String {
    format!("{}{}", subject_id, OUTPUT_SUFFIX)
}

/// Name the renderer gives its artifact for a given source file name.
pub fn rendered_file_name(source_file_name: &str) -> String {
    let stem = source_file_name
        .strip_suffix(SOURCE_EXTENSION)
        .unwrap_or(source_file_name);
    format!("{}{}", stem, OUTPUT_SUFFIX)
}
