//! Job hashing.
//!
//! Re-running the same subject with the same options yields the same job
//! hash, which makes idempotent overwrites easy to spot in the logs and in
//! detailed outcomes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::options::{Dimensions, RenderOptions};

/// SHA-256 of bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Everything that decides the published bytes. The host-specific staging
/// directory is left out.
#[derive(Serialize)]
struct JobKey<'a> {
    subject_id: &'a str,
    dimensions: Dimensions,
    complex: bool,
    negative: bool,
    flip_x: bool,
    flip_y: bool,
}

/// job_hash = sha256(JSON of subject and the output-affecting options)
pub fn compute_job_hash(
    subject_id: &str,
    options: &RenderOptions,
) -> Result<String, serde_json::Error> {
    let key = JobKey {
        subject_id,
        dimensions: options.dimensions,
        complex: options.complex,
        negative: options.negative,
        flip_x: options.flip_x,
        flip_y: options.flip_y,
    };
    Ok(sha256_hex(&serde_json::to_vec(&key)?))
}
