use std::path::PathBuf;

/// Container format offered in the format dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp4,
    Webm,
    Mp3,
}

impl MediaFormat {
    pub const ALL: [Self; 3] = [Self::Mp4, Self::Webm, Self::Mp3];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
        }
    }
}

/// Upper bound on the video resolution to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCeiling {
    Best,
    P1080,
    P720,
    P480,
    P360,
}

impl QualityCeiling {
    pub const ALL: [Self; 5] = [Self::Best, Self::P1080, Self::P720, Self::P480, Self::P360];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
        }
    }

    /// Pixel height for the yt-dlp selector, `None` for unbounded.
    pub const fn height(self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
        }
    }
}

/// Immutable snapshot of the form at the moment a download starts.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub format: MediaFormat,
    pub quality: QualityCeiling,
    pub audio_only: bool,
}

impl DownloadRequest {
    /// Audio-only downloads always come out as mp3; the selected
    /// container only applies to video downloads.
    pub fn effective_format(&self) -> MediaFormat {
        if self.audio_only {
            MediaFormat::Mp3
        } else {
            self.format
        }
    }

    /// The yt-dlp `-f` format selector. The quality ceiling is
    /// meaningless for audio-only requests and is ignored there.
    pub fn format_selector(&self) -> String {
        if self.audio_only {
            return "bestaudio/best".to_string();
        }
        match self.quality.height() {
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best"),
            None => "bestvideo+bestaudio/best".to_string(),
        }
    }

    /// Output template placing `<title>.<ext>` into the destination directory.
    pub fn output_template(&self) -> String {
        format!("{}/%(title)s.%(ext)s", self.destination.display())
    }
}

/// Phase of a download as reported by the fetch tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    PostProcessing,
}

/// Normalized progress applied to the presentation layer.
/// Only the most recent value matters.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub phase: Phase,
    /// Percent complete in `[0, 100]`.
    pub percent: f32,
    /// Human-readable transfer rate, when the tool reported one.
    pub rate: Option<String>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            phase: Phase::Downloading,
            percent: 0.0,
            rate: None,
        }
    }
}

/// Video metadata produced by an info fetch. Read-only once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: String,
    pub uploader: String,
    pub duration_display: String,
    pub view_count: Option<u64>,
    pub thumbnail_url: Option<String>,
}

impl VideoInfo {
    /// View count with thousands separators, `N/A` when unknown.
    pub fn view_display(&self) -> String {
        match self.view_count {
            Some(n) => group_digits(n),
            None => "N/A".to_string(),
        }
    }
}

fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// What a successfully finished worker produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    Info(VideoInfo),
    Download,
}

/// Terminal result of a session. Exactly one outcome is applied per session.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(TaskPayload),
    Failure(String),
    Cancelled,
}
