//! Internal utility functions.
//!
//! Pixel packing and timestamp arithmetic for the FFmpeg backend.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Pack the RGB24 plane of `video_frame` into `width * 3` bytes per row,
/// dropping any line padding FFmpeg added after each row.
pub fn frame_to_rgb_buffer(video_frame: &VideoFrame) -> Vec<u8> {
    let row_bytes = video_frame.width() as usize * 3;
    let rows = video_frame.height() as usize;
    let line_size = video_frame.stride(0);
    let plane = video_frame.data(0);

    if line_size == row_bytes {
        return plane[..row_bytes * rows].to_vec();
    }
    plane
        .chunks(line_size)
        .take(rows)
        .flat_map(|line| &line[..row_bytes])
        .copied()
        .collect()
}

/// Convert a frame number to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `Input::seek` (via `avformat_seek_file` with `stream_index = -1`) expects
/// container-level timestamps, not stream time base units.
pub fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a frame number.
///
/// Rounds to the nearest frame so that timestamps a tick short of a frame
/// boundary do not land on the previous frame.
pub fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts_to_seconds(pts, time_base);
    (seconds * frames_per_second).round().max(0.0) as u64
}
