use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionNameError {
    #[error("session folder name is empty")]
    Empty,
    #[error("session folder name contains a forbidden sequence ({0:?})")]
    ForbiddenSequence(&'static str),
    #[error("session folder name may only contain letters, digits, '.', '_' and '-' (found {0:?})")]
    InvalidCharacter(char),
}

const FORBIDDEN: [&str; 4] = ["/", "\\", ":", ".."];

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Name of a directory directly under the output root. Only ever built from
/// strings that passed [`SessionName::parse`], so joining it onto the output
/// root cannot escape it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionName(String);

impl SessionName {
    pub fn parse(raw: &str) -> Result<Self, SessionNameError> {
        if raw.trim().is_empty() {
            return Err(SessionNameError::Empty);
        }
        if let Some(seq) = FORBIDDEN.iter().find(|seq| raw.contains(*seq)) {
            return Err(SessionNameError::ForbiddenSequence(*seq));
        }
        if let Some(bad) = raw.chars().find(|c| !is_allowed(*c)) {
            return Err(SessionNameError::InvalidCharacter(bad));
        }
        Ok(Self(raw.to_string()))
    }

    /// Accepts what users tend to paste from a shell: `output/<name>`.
    pub fn parse_user_input(raw: &str) -> Result<Self, SessionNameError> {
        let trimmed = raw
            .strip_prefix("output/")
            .or_else(|| raw.strip_prefix("output\\"))
            .unwrap_or(raw);
        Self::parse(trimmed)
    }

    /// `<stem>_<N>frames_<M>min<S>sec_<YYYYmmdd_HHMMSS>`, or with
    /// `_interval<K>` after the frame count when frames are sampled.
    pub fn for_video(
        stem: &str,
        frame_count: u64,
        interval: u64,
        duration: (u64, u64),
        timestamp: DateTime<Local>,
    ) -> Self {
        let stem: String = stem
            .chars()
            .map(|c| if is_allowed(c) { c } else { '_' })
            .collect();
        // ".." inside a stem would fail parse(); collapse it.
        let mut stem = stem.replace("..", "_");
        if stem.is_empty() {
            stem.push_str("video");
        }

        let (minutes, seconds) = duration;
        let interval_part = if interval > 1 {
            format!("_interval{interval}")
        } else {
            String::new()
        };
        Self(format!(
            "{stem}_{frame_count}frames{interval_part}_{minutes}min{seconds}sec_{}",
            timestamp.format("%Y%m%d_%H%M%S")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole minutes and leftover seconds of `frame_count / fps`; zero when the
/// container reports no frame rate.
pub fn format_duration(frame_count: u64, fps: f64) -> (u64, u64) {
    if !(fps > 0.0) {
        return (0, 0);
    }
    let total = (frame_count as f64 / fps) as u64;
    (total / 60, total % 60)
}

/// On-disk layout of one session: `<output_root>/<session>/temp/frames`.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    pub root: PathBuf,
}

impl SessionLayout {
    pub fn new(output_root: &Path, session: &SessionName) -> Self {
        Self {
            root: output_root.join(session.as_str()),
        }
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("temp").join("frames")
    }
}
