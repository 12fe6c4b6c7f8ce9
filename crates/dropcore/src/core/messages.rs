//! User-facing texts

use std::time::Duration;

pub const START: &str = "Send me a YouTube link and I'll download the video and send it here.";

pub const HELP: &str = "Paste a link like https://youtu.be/<id> or https://youtube.com/shorts/<id>.\n\
Videos larger than the upload limit can't be sent.";

pub const INVALID_LINK: &str = "Send a valid YouTube link.";

pub const DOWNLOADING: &str = "Downloading...";

pub const PROCESSING_FAILED: &str = "Failed to process the video.";

pub const UPLOAD_FAILED: &str = "Failed to upload the video to Telegram.";

/// Status text while the fetch is still running
pub fn downloading_for(elapsed: Duration) -> String {
    format!("{} {}s", DOWNLOADING, elapsed.as_secs())
}

pub fn too_large(size: u64, limit: u64) -> String {
    format!(
        "The video is too large to send ({} MB, limit {} MB).",
        to_megabytes(size),
        to_megabytes(limit)
    )
}

fn to_megabytes(bytes: u64) -> u64 {
    bytes.div_ceil(1024 * 1024)
}
