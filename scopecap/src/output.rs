//! Writing the captured image to disk

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::ImageFormat;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Extension used when the payload cannot be decoded and is written as-is
pub const RAW_EXTENSION: &str = "bmp";

/// Where an image ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,

    /// Bytes written
    pub size: u64,

    /// Width and height, when the payload decoded
    pub dimensions: Option<(u32, u32)>,
}

impl SavedImage {
    /// The payload was not a decodable image and went out verbatim
    pub fn is_raw(&self) -> bool {
        self.dimensions.is_none()
    }
}

/// Insert `_YYYYmmdd_HHMMSS` before the extension of `base`
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use chrono::{Local, TimeZone};
/// use scopecap::output::timestamped_path;
///
/// let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// let path = timestamped_path(Path::new("captures/scope.png"), now);
/// assert_eq!(path, Path::new("captures/scope_20240309_140507.png"));
/// ```
pub fn timestamped_path(base: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "screenshot".to_string());
    let stamp = now.format("%Y%m%d_%H%M%S");

    let name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    };
    base.with_file_name(name)
}

/// Format implied by the output extension (PNG unless it says BMP)
fn output_format(path: &Path) -> (ImageFormat, PathBuf) {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Bmp) => (ImageFormat::Bmp, path.to_path_buf()),
        Ok(ImageFormat::Png) => (ImageFormat::Png, path.to_path_buf()),
        _ => (ImageFormat::Png, path.with_extension("png")),
    }
}

/// Decode `data` and save it at `path`, or write it raw as `.bmp`
///
/// Parent directories are created. Each file is written to a `.part`
/// sibling and renamed into place, so a failed write leaves nothing behind
/// under the final name. Blocking; call from `spawn_blocking`.
pub fn save_image(data: &[u8], path: &Path) -> Result<SavedImage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match image::load_from_memory(data) {
        Ok(img) => {
            let (format, path) = output_format(path);
            let dimensions = (img.width(), img.height());
            debug!("Decoded {}x{} image, saving as {:?}", dimensions.0, dimensions.1, format);

            let part = part_path(&path);
            if let Err(e) = img.save_with_format(&part, format) {
                let _ = fs::remove_file(&part);
                return Err(e.into());
            }
            fs::rename(&part, &path)?;

            let size = fs::metadata(&path)?.len();
            info!("Saved {} ({}x{}, {} bytes)", path.display(), dimensions.0, dimensions.1, size);
            Ok(SavedImage {
                path,
                size,
                dimensions: Some(dimensions),
            })
        }
        Err(e) => {
            let path = path.with_extension(RAW_EXTENSION);
            warn!("Could not decode image ({}), writing raw bytes to {}", e, path.display());

            write_atomic(&path, data)?;
            Ok(SavedImage {
                path,
                size: data.len() as u64,
                dimensions: None,
            })
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let part = part_path(path);
    if let Err(e) = fs::write(&part, data) {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }
    fs::rename(&part, path)?;
    Ok(())
}
