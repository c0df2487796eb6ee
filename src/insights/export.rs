use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use super::BuildReport;
use crate::error::Result;

/// Write `value` as indented UTF-8 JSON, creating missing parent directories.
pub fn export_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    info!("Exported to: {}", path.display());
    Ok(())
}

/// Read reports previously written by `export_json`.
pub fn read_reports(path: &Path) -> Result<Vec<BuildReport>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
