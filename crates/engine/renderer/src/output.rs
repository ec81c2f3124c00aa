//! Saving and displaying finished figures

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{ImageFormat, RgbImage};

use crate::error::Result;

/// Write `image` as PNG to `<dir>/<file_name>`, creating `dir` if needed
pub fn export_png(image: &RgbImage, dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    image.save_with_format(&path, ImageFormat::Png)?;
    tracing::info!("Saved map to {}", path.display());
    Ok(path)
}

/// Show `image` in the platform image viewer
///
/// The figure goes to a preview file in the temp directory first. Any failure
/// is logged as a warning; the returned path is the preview when one was
/// handed to a viewer.
pub fn show_image(image: &RgbImage, file_name: &str) -> Option<PathBuf> {
    let preview = std::env::temp_dir().join(format!("station-map-preview-{}", file_name));
    if let Err(e) = image.save_with_format(&preview, ImageFormat::Png) {
        tracing::warn!("Failed to write preview {}: {}", preview.display(), e);
        return None;
    }

    match open_in_viewer(&preview) {
        Ok(()) => {
            tracing::info!("Opened {} in the image viewer", preview.display());
            Some(preview)
        }
        Err(e) => {
            tracing::warn!("Could not launch an image viewer for {}: {}", preview.display(), e);
            None
        }
    }
}

fn viewer_command(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    viewer_command(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_export_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("figures").join("spe");
        let image = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));

        let path = export_png(&image, &target, "SPE_station_map.png").unwrap();
        assert_eq!(path, target.join("SPE_station_map.png"));

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_export_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let image = RgbImage::new(2, 2);
        assert!(export_png(&image, &blocker, "map.png").is_err());
    }

    #[test]
    fn test_viewer_command_targets_file() {
        let cmd = viewer_command(Path::new("/tmp/map.png"));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args.last().and_then(|a| a.to_str()), Some("/tmp/map.png"));
    }
}
