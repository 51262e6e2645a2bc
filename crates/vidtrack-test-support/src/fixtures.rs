//! Tool probes, sample media, and output inspection.

use std::path::Path;

use anyhow::{Context, bail};
use tokio::process::Command;

/// Returns `true` if `program` can be found on `PATH` (or exists as a path).
#[must_use]
pub fn tool_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Write a one-second synthetic clip to `path` using ffmpeg's test source.
///
/// # Errors
///
/// Returns an error if ffmpeg cannot be started or exits unsuccessfully.
pub async fn write_sample_video(path: &Path) -> anyhow::Result<()> {
    let output = Command::new("ffmpeg")
        .args([
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=1:size=64x64:rate=5",
            "-c:v",
            "mpeg4",
        ])
        .arg(path)
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg failed to write sample video: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Codec and pixel format of the first video stream, as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStreamInfo {
    /// Codec short name, e.g. `h264`.
    pub codec_name: String,
    /// Pixel format, e.g. `yuv420p`.
    pub pix_fmt: String,
}

/// Read the first video stream's codec and pixel format with ffprobe.
///
/// # Errors
///
/// Returns an error if ffprobe fails or reports no video stream.
pub async fn inspect_video_stream(path: &Path) -> anyhow::Result<VideoStreamInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name,pix_fmt",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .await?;
    if !output.status.success() {
        bail!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let mut codec_name = None;
    let mut pix_fmt = None;
    for (key, value) in text.lines().filter_map(|line| line.split_once('=')) {
        match key.trim() {
            "codec_name" => codec_name = Some(value.trim().to_string()),
            "pix_fmt" => pix_fmt = Some(value.trim().to_string()),
            _ => {}
        }
    }
    Ok(VideoStreamInfo {
        codec_name: codec_name.context("ffprobe reported no codec_name")?,
        pix_fmt: pix_fmt.context("ffprobe reported no pix_fmt")?,
    })
}

/// Four-character types of the top-level boxes of an MP4 file, in file order.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a box header is malformed.
pub fn mp4_top_level_boxes(path: &Path) -> anyhow::Result<Vec<String>> {
    let data = std::fs::read(path)?;
    let mut boxes = Vec::new();
    let mut offset = 0_usize;
    while offset + 8 <= data.len() {
        let size32 = u32::from_be_bytes(data[offset..offset + 4].try_into()?);
        let kind = String::from_utf8_lossy(&data[offset + 4..offset + 8]).into_owned();
        let size = match size32 {
            0 => data.len() - offset,
            1 => {
                let large = data
                    .get(offset + 8..offset + 16)
                    .with_context(|| format!("truncated 64-bit size for box {kind}"))?;
                usize::try_from(u64::from_be_bytes(large.try_into()?))?
            }
            n => usize::try_from(n)?,
        };
        if size < 8 {
            bail!("box {kind} at offset {offset} has invalid size {size}");
        }
        boxes.push(kind.clone());
        offset = offset
            .checked_add(size)
            .with_context(|| format!("box {kind} overflows the file offset"))?;
    }
    Ok(boxes)
}

/// Check that `path` is an MP4 a browser can stream: the `moov` index precedes
/// `mdat` and, when ffprobe is installed, the video is H.264 in `yuv420p`.
///
/// # Errors
///
/// Returns an error describing the first property that does not hold.
pub async fn assert_browser_playable(path: &Path) -> anyhow::Result<()> {
    let boxes = mp4_top_level_boxes(path)?;
    let moov = boxes.iter().position(|kind| kind == "moov");
    let mdat = boxes.iter().position(|kind| kind == "mdat");
    match (moov, mdat) {
        (Some(moov), Some(mdat)) if moov < mdat => {}
        _ => bail!("moov must precede mdat, found boxes {boxes:?}"),
    }

    if tool_available("ffprobe") {
        let stream = inspect_video_stream(path).await?;
        if stream.codec_name != "h264" || stream.pix_fmt != "yuv420p" {
            bail!("expected h264/yuv420p, found {stream:?}");
        }
    } else {
        eprintln!("ffprobe not found on PATH; codec check skipped");
    }
    Ok(())
}
