// File writers and console previews.
use crate::docx::DocxPackage;
use crate::error::Result;
use crate::util::timestamped_path;
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::warn;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)?;
    Ok(())
}

/// Serialize the package and write it to `preferred`, creating its parent
/// directory as needed. If that fails, write it once more to a timestamped
/// name inside `fallback_dir`.
///
/// Returns the path actually written.
pub fn write_document_in(pkg: &DocxPackage, preferred: &Path, fallback_dir: &Path) -> Result<PathBuf> {
    let bytes = pkg.to_bytes()?;
    let written = match preferred.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => fs::create_dir_all(dir).and_then(|()| fs::write(preferred, &bytes)),
        None => fs::write(preferred, &bytes),
    };
    match written {
        Ok(()) => Ok(preferred.to_path_buf()),
        Err(e) => {
            let fallback = timestamped_path(preferred, fallback_dir, Local::now());
            warn!(
                preferred = %preferred.display(),
                fallback = %fallback.display(),
                error = %e,
                "output path not writable; using fallback"
            );
            fs::write(&fallback, &bytes)?;
            Ok(fallback)
        }
    }
}

/// [`write_document_in`] with the current directory as fallback location.
pub fn write_document(pkg: &DocxPackage, preferred: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    write_document_in(pkg, preferred, &cwd)
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
