use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use super::{FrameData, FrameSource, VideoInfo};
use crate::config::Config;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// "30000/1001" -> 29.97; "0/0" and garbage -> 0.
fn parse_rate(rate: &str) -> f64 {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => rate.trim().parse().unwrap_or(0.0),
    };
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Interprets `ffprobe -of json` output for the first video stream.
pub fn parse_probe_json(json: &str) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_str(json).context("Invalid ffprobe output")?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .context("No video stream found")?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => bail!("Video stream reports no frame size"),
    };

    let mut fps = stream.r_frame_rate.as_deref().map(parse_rate).unwrap_or(0.0);
    if fps == 0.0 {
        fps = stream.avg_frame_rate.as_deref().map(parse_rate).unwrap_or(0.0);
    }

    let frame_count = match stream.nb_frames.and_then(|n| n.trim().parse::<u64>().ok()) {
        Some(n) => n,
        None => {
            let duration: f64 = probe
                .format
                .and_then(|f| f.duration)
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(0.0);
            (duration * fps).round().max(0.0) as u64
        }
    };

    Ok(VideoInfo {
        fps,
        frame_count,
        width,
        height,
    })
}

pub fn probe(config: &Config, path: &Path) -> Result<VideoInfo> {
    let out = Command::new(&config.ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames:format=duration")
        .arg("-of")
        .arg("json")
        .arg(path)
        .output()
        .with_context(|| format!("failed to run {}", config.ffprobe_bin))?;
    if !out.status.success() {
        bail!(
            "Failed to open video file {}: {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    parse_probe_json(&String::from_utf8_lossy(&out.stdout))
}

/// Fills `buf` unless the stream ends first; returns the byte count read.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Arguments for the raw RGB24 decode. Frames are passed through as stored:
/// rotation metadata is ignored so the output matches the probed size.
fn decode_args(config: &Config, path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        config.ffmpeg_loglevel.as_str(),
        "-noautorotate",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"].map(OsString::from));
    args
}

/// Decodes through an `ffmpeg` child writing raw RGB24 frames to its stdout.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    info: VideoInfo,
}

impl FfmpegSource {
    pub fn open(config: &Config, path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("Failed to open video file: {}", path.display());
        }
        let info = probe(config, path)?;
        tracing::debug!(?info, video = %path.display(), "ffprobe");

        let mut child = Command::new(&config.ffmpeg_bin)
            .args(decode_args(config, path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn ffmpeg decode {}", path.display()))?;
        let stdout = child.stdout.take().context("ffmpeg stdout missing")?;

        Ok(Self {
            child,
            stdout,
            info,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Option<FrameData> {
        let frame_bytes = self.info.width as usize * self.info.height as usize * 3;
        let mut buffer = vec![0u8; frame_bytes];
        match read_exact_or_eof(&mut self.stdout, &mut buffer) {
            Ok(n) if n == frame_bytes => {
                Some(FrameData::new(buffer, self.info.width, self.info.height))
            }
            Ok(n) => {
                if n > 0 {
                    tracing::debug!(bytes = n, "truncated trailing frame dropped");
                }
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "frame read failed, treating as end of stream");
                None
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // The reader may stop early; don't leave ffmpeg blocked on a full pipe.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_rates() {
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("30/1"), 30.0);
        assert_eq!(parse_rate("0/0"), 0.0);
        assert_eq!(parse_rate("25"), 25.0);
        assert_eq!(parse_rate("abc"), 0.0);
    }

    #[test]
    fn probe_json_with_frame_count() {
        let json = r#"{
            "programs": [],
            "streams": [{"width": 3840, "height": 1920, "r_frame_rate": "30/1",
                         "avg_frame_rate": "30/1", "nb_frames": "145"}],
            "format": {"duration": "4.833333"}
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(
            info,
            VideoInfo {
                fps: 30.0,
                frame_count: 145,
                width: 3840,
                height: 1920
            }
        );
    }

    #[test]
    fn probe_json_falls_back_to_duration() {
        let json = r#"{
            "streams": [{"width": 64, "height": 32, "r_frame_rate": "0/0",
                         "avg_frame_rate": "24/1"}],
            "format": {"duration": "2.0"}
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(info.fps, 24.0);
        assert_eq!(info.frame_count, 48);
    }

    #[test]
    fn probe_json_without_video_stream_fails() {
        assert!(parse_probe_json(r#"{"streams": []}"#).is_err());
        assert!(parse_probe_json("not json").is_err());
    }

    #[test]
    fn decode_keeps_stored_orientation() {
        let config = Config::default();
        let args = decode_args(&config, Path::new("in/clip.mp4"));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], "in/clip.mp4");
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn short_reads_report_partial_length() {
        let data = vec![7u8; 10];
        let mut reader = std::io::Cursor::new(data);
        let mut buf = [0u8; 16];
        assert_eq!(read_exact_or_eof(&mut reader, &mut buf).unwrap(), 10);
        assert_eq!(read_exact_or_eof(&mut reader, &mut buf).unwrap(), 0);
    }
}
