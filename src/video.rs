//! Video frame extraction
//!
//! Frames are pulled from an external `ffmpeg` process as one concatenated
//! MJPEG stream and split into per-frame JPEG buffers on SOI/EOI markers.
//! The detection pipeline never touches the container format; it only ever
//! sees encoded image bytes, one frame at a time.

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::warn;

use crate::error::ScanError;

/// What the frame loop does when processing one frame fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErrorPolicy {
    /// Propagate the error, aborting the whole run.
    Abort,
    /// Log the error, skip the frame, keep going.
    SkipAndReport,
}

/// Outcome counts of a frame-processing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub processed: u32,
    pub skipped: u32,
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Incremental splitter for a concatenated MJPEG byte stream.
///
/// JPEG frames start with `FF D8` and end with `FF D9`; bytes between frames
/// are dropped. Partial frames (and a trailing lone `FF`) are carried over
/// to the next push.
#[derive(Default)]
pub struct JpegStreamSplitter {
    buffer: Vec<u8>,
}

impl JpegStreamSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes; returns any frames completed by this chunk.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();
        loop {
            let Some(start) = find_marker(&self.buffer, SOI) else {
                // no frame start in sight; keep a trailing 0xFF in case the
                // marker is split across chunks
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                self.buffer.drain(..self.buffer.len() - keep);
                break;
            };
            let Some(end) = find_marker(&self.buffer[start + 2..], EOI) else {
                self.buffer.drain(..start);
                break;
            };
            let end = start + 2 + end + 2;
            frames.push(self.buffer[start..end].to_vec());
            self.buffer.drain(..end);
        }
        frames
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Iterator over JPEG-encoded frames produced by an ffmpeg child process.
pub struct FrameSource {
    child: Child,
    splitter: JpegStreamSplitter,
    pending: VecDeque<Vec<u8>>,
    chunk: Vec<u8>,
    done: bool,
}

impl FrameSource {
    /// Spawn ffmpeg decoding `input` into an MJPEG pipe, one image per frame.
    pub fn open(ffmpeg: &Path, input: &Path) -> Result<Self, ScanError> {
        let child = Command::new(ffmpeg)
            .arg("-i")
            .arg(input)
            .args([
                "-f",
                "image2pipe",
                "-c:v",
                "mjpeg",
                "-fps_mode",
                "passthrough",
                "-q:v",
                "1",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ScanError::FrameStream(format!("failed to spawn {}: {e}", ffmpeg.display()))
            })?;

        Ok(Self {
            child,
            splitter: JpegStreamSplitter::new(),
            pending: VecDeque::new(),
            chunk: vec![0u8; 64 * 1024],
            done: false,
        })
    }
}

impl Iterator for FrameSource {
    type Item = Result<Vec<u8>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            if self.done {
                return None;
            }
            let stdout = self.child.stdout.as_mut()?;
            match stdout.read(&mut self.chunk) {
                Ok(0) => {
                    self.done = true;
                    match self.child.wait() {
                        Ok(status) if status.success() => {}
                        Ok(status) => {
                            return Some(Err(ScanError::FrameStream(format!(
                                "ffmpeg exited with {status}"
                            ))))
                        }
                        Err(e) => return Some(Err(ScanError::Io(e))),
                    }
                }
                Ok(n) => {
                    let frames = self.splitter.push(&self.chunk[..n]);
                    self.pending.extend(frames);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ScanError::Io(e)));
                }
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Drive `handle` over a stream of encoded frames.
///
/// Frame indices are 1-based and advance even when a frame fails, so the
/// surviving frames keep their true positions. Failures are isolated or
/// fatal according to `policy`.
pub fn process_frames<I, F>(
    frames: I,
    policy: FrameErrorPolicy,
    mut handle: F,
) -> Result<FrameReport, ScanError>
where
    I: IntoIterator<Item = Result<Vec<u8>, ScanError>>,
    F: FnMut(u32, &[u8]) -> Result<(), ScanError>,
{
    let mut report = FrameReport::default();
    let mut index = 0u32;
    for frame in frames {
        index += 1;
        let result = frame.and_then(|bytes| handle(index, &bytes));
        match result {
            Ok(()) => report.processed += 1,
            Err(e) => match policy {
                FrameErrorPolicy::Abort => return Err(e),
                FrameErrorPolicy::SkipAndReport => {
                    warn!(frame = index, error = %e, "frame skipped");
                    report.skipped += 1;
                }
            },
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut frame = SOI.to_vec();
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&EOI);
        frame
    }

    #[test]
    fn splits_two_concatenated_frames() {
        let mut splitter = JpegStreamSplitter::new();
        let mut stream = jpeg(b"first");
        stream.extend(jpeg(b"second"));

        let frames = splitter.push(&stream);
        assert_eq!(frames, vec![jpeg(b"first"), jpeg(b"second")]);
    }

    #[test]
    fn carries_partial_frame_across_pushes() {
        let mut splitter = JpegStreamSplitter::new();
        let frame = jpeg(b"payload");
        let (head, tail) = frame.split_at(4);

        assert!(splitter.push(head).is_empty());
        assert_eq!(splitter.push(tail), vec![frame]);
    }

    #[test]
    fn handles_marker_split_across_chunk_boundary() {
        let mut splitter = JpegStreamSplitter::new();
        let frame = jpeg(b"x");

        // feed one byte at a time; only the final byte completes the frame
        let mut collected = Vec::new();
        for byte in &frame {
            collected.extend(splitter.push(&[*byte]));
        }
        assert_eq!(collected, vec![frame]);
    }

    #[test]
    fn drops_garbage_between_frames() {
        let mut splitter = JpegStreamSplitter::new();
        let mut stream = b"junk".to_vec();
        stream.extend(jpeg(b"real"));

        assert_eq!(splitter.push(&stream), vec![jpeg(b"real")]);
    }

    #[test]
    fn skip_and_report_isolates_failing_frame() {
        let frames: Vec<Result<Vec<u8>, ScanError>> =
            vec![Ok(b"one".to_vec()), Ok(b"two".to_vec()), Ok(b"three".to_vec())];
        let mut handled = Vec::new();

        let report = process_frames(frames, FrameErrorPolicy::SkipAndReport, |index, bytes| {
            if index == 2 {
                return Err(ScanError::FrameStream("boom".into()));
            }
            handled.push((index, bytes.to_vec()));
            Ok(())
        })
        .unwrap();

        assert_eq!(report, FrameReport { processed: 2, skipped: 1 });
        assert_eq!(
            handled,
            vec![(1, b"one".to_vec()), (3, b"three".to_vec())]
        );
    }

    #[test]
    fn abort_policy_propagates_first_error() {
        let frames: Vec<Result<Vec<u8>, ScanError>> =
            vec![Ok(b"one".to_vec()), Ok(b"two".to_vec())];

        let result = process_frames(frames, FrameErrorPolicy::Abort, |index, _| {
            if index == 2 {
                Err(ScanError::FrameStream("boom".into()))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(ScanError::FrameStream(_))));
    }

    #[test]
    fn stream_errors_are_subject_to_policy_too() {
        let frames: Vec<Result<Vec<u8>, ScanError>> = vec![
            Ok(b"one".to_vec()),
            Err(ScanError::FrameStream("decode glitch".into())),
            Ok(b"three".to_vec()),
        ];

        let report =
            process_frames(frames, FrameErrorPolicy::SkipAndReport, |_, _| Ok(())).unwrap();
        assert_eq!(report, FrameReport { processed: 2, skipped: 1 });
    }
}
