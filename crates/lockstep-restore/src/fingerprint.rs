//! Fingerprint of everything that decides a restore's outcome

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lockstep_package::ProjectSpec;
use serde::Serialize;
use sha2::{Digest, Sha512};
use std::path::PathBuf;

/// Version of this crate, part of every fingerprint
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolution inputs, hashed in field order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintInputs<'a> {
    pub tool_version: &'a str,
    pub project: &'a ProjectSpec,
    /// Specs of the other projects taking part, sorted by name
    pub external_projects: Vec<&'a ProjectSpec>,
    pub sources: Vec<&'a str>,
    /// Provider locations, local ones first
    pub providers: Vec<&'a str>,
    pub global_packages_folder: &'a PathBuf,
    pub fallback_folders: &'a [PathBuf],
    pub restore_with_lock_file: Option<bool>,
    pub locked_mode: bool,
    pub lock_file_version: u32,
}

impl FingerprintInputs<'_> {
    /// Base64 SHA-512 of the canonical JSON rendering
    pub fn compute(&self) -> serde_json::Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(Sha512::digest(&canonical)))
    }
}
