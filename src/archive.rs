//! Zip archive of the new bridges with a QR code per line.
//!
//! Layout inside the archive:
//! - `<transport>/bridges.txt`: one line per bridge
//! - `<transport>/<n>.svg`: QR code of the n-th line (1-based)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::bridges::{total_lines, BridgeLine, FetchedBridges, TransportClass};

/// Errors that can occur while writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Cannot encode QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

/// Archive file name for a given time.
pub fn archive_file_name(now: DateTime<Utc>) -> String {
    format!("bridges-{}.zip", now.format("%Y%m%dT%H%M%SZ"))
}

/// Render one bridge line as an SVG QR code.
pub fn qr_svg(line: &BridgeLine) -> Result<String, ArchiveError> {
    let code = QrCode::new(line.as_str().as_bytes())?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build())
}

/// Write the archive for this run's new lines into `dir`.
///
/// Returns `None` when there is nothing to archive.
pub fn write_archive(
    dir: &Path,
    new_by_class: &FetchedBridges,
    now: DateTime<Utc>,
) -> Result<Option<PathBuf>, ArchiveError> {
    if total_lines(new_by_class) == 0 {
        return Ok(None);
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(archive_file_name(now));
    let mut zip = ZipWriter::new(File::create(&path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for class in TransportClass::ALL {
        let lines = match new_by_class.get(&class) {
            Some(lines) if !lines.is_empty() => lines,
            _ => continue,
        };

        zip.start_file(format!("{}/bridges.txt", class.as_str()), options)?;
        for line in lines {
            writeln!(zip, "{}", line)?;
        }

        for (idx, line) in lines.iter().enumerate() {
            zip.start_file(format!("{}/{}.svg", class.as_str(), idx + 1), options)?;
            zip.write_all(qr_svg(line)?.as_bytes())?;
        }
    }

    zip.finish()?;
    info!("Wrote archive {}", path.display());
    Ok(Some(path))
}
