//! Scan orchestration
//!
//! Single images fail fast: any pipeline error propagates to the caller.
//! Videos are best-effort: each frame is scored and written independently
//! and a failing frame is reported, not raised.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::config::Config;
use crate::engine::ensemble::Ensemble;
use crate::error::ScanError;
use crate::video::{process_frames, FrameErrorPolicy, FrameReport, FrameSource};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

/// What kind of input a path points at, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Video,
}

pub fn classify(path: &Path) -> Result<InputKind, ScanError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(InputKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(InputKind::Video)
    } else {
        Err(ScanError::UnsupportedFormat(ext))
    }
}

/// Score a single image file.
pub fn scan_image(ensemble: &mut Ensemble, input: &Path) -> Result<f32, ScanError> {
    let bytes = fs::read(input)?;
    let start = Instant::now();
    let probability = ensemble.probability_from_bytes(&bytes)?;
    info!("scored {} in {:?}", input.display(), start.elapsed());
    Ok(probability)
}

/// Score every frame of a video, writing one JPEG per frame to
/// `<dir>/<stem>/frames/<index>_<percent>.jpg`.
///
/// The frames directory must be empty before processing starts.
pub fn scan_video(
    ensemble: &mut Ensemble,
    config: &Config,
    input: &Path,
) -> Result<FrameReport, ScanError> {
    let out_dir = frames_dir(input);
    ensure_empty(&out_dir)?;

    let frames = FrameSource::open(&config.video.ffmpeg, input)?;
    let report = process_frames(frames, FrameErrorPolicy::SkipAndReport, |index, bytes| {
        let probability = ensemble.probability_from_bytes(bytes)?;
        let percent = (probability * 100.0).round() as u32;
        fs::write(out_dir.join(format!("{index}_{percent}.jpg")), bytes)?;
        info!(frame = index, probability, "frame scored");
        Ok(())
    })?;

    info!(
        "video done: {} frame(s) written, {} skipped",
        report.processed, report.skipped
    );
    Ok(report)
}

/// Frame output directory for a video input path.
fn frames_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(stem)
        .join("frames")
}

/// Create the directory if needed and require it to be empty.
fn ensure_empty(dir: &Path) -> Result<(), ScanError> {
    fs::create_dir_all(dir)?;
    if fs::read_dir(dir)?.next().is_some() {
        return Err(ScanError::DestinationNotEmpty(dir.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(classify(Path::new("a/b/photo.jpg")).unwrap(), InputKind::Image);
        assert_eq!(classify(Path::new("photo.PNG")).unwrap(), InputKind::Image);
        assert_eq!(classify(Path::new("clip.MP4")).unwrap(), InputKind::Video);
        assert_eq!(classify(Path::new("clip.webm")).unwrap(), InputKind::Video);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert!(matches!(
            classify(Path::new("notes.txt")),
            Err(ScanError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            classify(Path::new("no_extension")),
            Err(ScanError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn frames_dir_sits_next_to_the_input() {
        let dir = frames_dir(Path::new("/videos/holiday.mp4"));
        assert_eq!(dir, PathBuf::from("/videos/holiday/frames"));
    }

    #[test]
    fn ensure_empty_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out/frames");
        ensure_empty(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn ensure_empty_rejects_populated_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("frames");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("1_50.jpg"), b"old").unwrap();

        assert!(matches!(
            ensure_empty(&dir),
            Err(ScanError::DestinationNotEmpty(_))
        ));
    }
}
