//! Sequence frame resolution and frame-number path templating.
//!
//! A volume sequence is one file per frame. Scene time maps onto a frame of
//! the sequence through a mode that governs out-of-range behavior, and the
//! concrete file path for a frame is produced by substituting the frame
//! number into the digit run of the configured path.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// How scene frames outside the sequence range map onto sequence frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SequenceMode {
    /// Out-of-range frames resolve to nothing.
    #[default]
    Clip,
    /// Out-of-range frames clamp to the first/last frame.
    Extend,
    /// Frames wrap around the sequence duration.
    Repeat,
    /// Frames bounce back and forth through the sequence.
    PingPong,
}

/// Frame-mapping parameters of a volume sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSpec {
    /// Out-of-range mapping mode.
    pub mode: SequenceMode,
    /// Scene frame at which the sequence starts.
    pub start: i32,
    /// Offset added to the resolved frame, after range folding.
    pub offset: i32,
    /// Number of frames in the sequence.
    pub duration: i32,
}

impl SequenceSpec {
    /// Create a sequence spec.
    #[inline]
    pub const fn new(mode: SequenceMode, start: i32, offset: i32, duration: i32) -> Self {
        Self {
            mode,
            start,
            offset,
            duration,
        }
    }

    /// Resolve the sequence frame shown at `scene_frame`.
    ///
    /// Returns `None` when there is nothing to show: zero duration, or a
    /// scene frame outside the range in `Clip` mode.
    ///
    /// The offset is applied after range folding on purpose: it shifts an
    /// already-bounded cycle, so a sequence can loop over frames 100..110
    /// while its files are numbered 1..10.
    pub fn frame_at(&self, scene_frame: i32) -> Option<i32> {
        if self.duration <= 0 {
            return None;
        }
        let duration = self.duration;
        let mut frame = scene_frame - self.start + 1;

        match self.mode {
            SequenceMode::Clip => {
                if frame < 1 || frame > duration {
                    return None;
                }
            }
            SequenceMode::Extend => {
                frame = frame.clamp(1, duration);
            }
            SequenceMode::Repeat => {
                frame %= duration;
                if frame < 0 {
                    frame += duration;
                }
                if frame == 0 {
                    frame = duration;
                }
            }
            SequenceMode::PingPong => {
                // A one-frame sequence has a degenerate bounce period.
                let period = (duration * 2 - 2).max(1);
                frame %= period;
                if frame < 0 {
                    frame += period;
                }
                if frame == 0 {
                    frame = period;
                }
                if frame > duration {
                    frame = duration * 2 - frame;
                }
            }
        }

        Some(frame + self.offset)
    }
}

/// Substitute `frame` into the trailing digit run of the file stem.
///
/// The last run of ASCII digits in the stem is replaced by the frame number,
/// zero-padded to the run's width; the extension is preserved. A path whose
/// stem contains no digits is returned unchanged, as are paths without a
/// UTF-8 file name.
///
/// ```
/// use std::path::Path;
/// use vgb_core::sequence::frame_path;
///
/// let path = frame_path(Path::new("/vol/smoke_0001.vgb"), 42);
/// assert_eq!(path, Path::new("/vol/smoke_0042.vgb").to_path_buf());
/// ```
pub fn frame_path(path: &Path, frame: i32) -> PathBuf {
    let (Some(stem), ext) = (
        path.file_stem().and_then(OsStr::to_str),
        path.extension().and_then(OsStr::to_str),
    ) else {
        return path.to_path_buf();
    };

    let Some(run) = trailing_digit_run(stem) else {
        return path.to_path_buf();
    };

    let width = run.end - run.start;
    let mut name = String::with_capacity(stem.len() + 8);
    name.push_str(&stem[..run.start]);
    name.push_str(&format!("{frame:0width$}"));
    name.push_str(&stem[run.end..]);
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    path.with_file_name(name)
}

/// Byte range of the last run of ASCII digits in `stem`, if any.
fn trailing_digit_run(stem: &str) -> Option<core::ops::Range<usize>> {
    let bytes = stem.as_bytes();
    let mut end = bytes.len();
    while end > 0 && !bytes[end - 1].is_ascii_digit() {
        end -= 1;
    }
    if end == 0 {
        return None;
    }
    let mut start = end;
    while start > 0 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }
    Some(start..end)
}
