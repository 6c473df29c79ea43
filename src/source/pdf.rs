use std::fs;
use std::process::Command;
use tempfile::tempdir;

use crate::error::{Error, Result};

/// Rasterizes every page of a native PDF to PNG bytes, in page order,
/// through whichever of mutool or pdftoppm is installed. At 72 dpi the
/// rasters carry the page's point dimensions exactly.
pub(crate) fn rasterize_pdf_pages(pdf_bytes: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>> {
    let dir = tempdir()?;
    let input_path = dir.path().join("input.pdf");
    fs::write(&input_path, pdf_bytes)?;

    if command_exists("mutool") {
        let output = Command::new("mutool")
            .arg("draw")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-o")
            .arg(dir.path().join("page-%03d.png"))
            .arg(&input_path)
            .output()
            .map_err(|err| Error::SourceUnreadable(format!("failed to run mutool: {}", err)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::SourceUnreadable(format!(
                "mutool failed: {}",
                stderr.trim()
            )));
        }
    } else if command_exists("pdftoppm") {
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(&input_path)
            .arg(dir.path().join("page"))
            .output()
            .map_err(|err| Error::SourceUnreadable(format!("failed to run pdftoppm: {}", err)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::SourceUnreadable(format!(
                "pdftoppm failed: {}",
                stderr.trim()
            )));
        }
    } else {
        return Err(Error::SourceUnreadable(
            "pdf rasterization requires mutool or pdftoppm (install mupdf or poppler)".to_string(),
        ));
    }

    let mut entries: Vec<_> = fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.path());

    let mut pages = Vec::new();
    for entry in entries {
        let path = entry.path();
        let is_page = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("page"))
            .unwrap_or(false)
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false);
        if is_page {
            pages.push(fs::read(&path)?);
        }
    }

    if pages.is_empty() {
        return Err(Error::SourceUnreadable(
            "no pages found in pdf".to_string(),
        ));
    }
    Ok(pages)
}

fn command_exists(cmd: &str) -> bool {
    match Command::new(cmd).arg("-h").output() {
        Ok(_) => true,
        Err(err) => err.kind() != std::io::ErrorKind::NotFound,
    }
}
