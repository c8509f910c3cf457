use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use dfaligner_rs::DurationReport;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub input_path: String,
    pub extraction_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam_width: Option<usize>,
    pub prob_floor: f32,
    pub item_count: usize,
    pub fallback_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub schema_version: u32,
    pub meta: Meta,
    pub items: Vec<DurationReport>,
    pub failures: Vec<ItemFailure>,
}

pub fn write_output(path: &Path, output: &Output) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    let mut file = File::create(path)
        .map_err(|err| format!("Failed to create output file '{}': {err}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, output).map_err(|err| {
        format!(
            "Failed to serialize durations JSON '{}': {err}",
            path.display()
        )
    })?;
    file.write_all(b"\n")
        .map_err(|err| format!("Failed to finalize output file '{}': {err}", path.display()))?;
    Ok(())
}
