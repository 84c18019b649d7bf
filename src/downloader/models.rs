// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::ConfigError;

/// Container format requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentFormat {
    #[serde(rename = "mp4")]
    Mp4,
    #[serde(rename = "webm")]
    Webm,
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 2] = [Self::Mp4, Self::Webm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }
}

/// Target video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoResolution {
    #[serde(rename = "144p")]
    P144,
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "4320p")]
    P4320,
}

impl VideoResolution {
    pub const ALL: [VideoResolution; 9] = [
        Self::P144,
        Self::P240,
        Self::P360,
        Self::P480,
        Self::P720,
        Self::P1080,
        Self::P1440,
        Self::P2160,
        Self::P4320,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P144 => "144p",
            Self::P240 => "240p",
            Self::P360 => "360p",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1440 => "1440p",
            Self::P2160 => "2160p",
            Self::P4320 => "4320p",
        }
    }
}

/// Audio bitrate choices offered for mp4 (AAC) audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mp4AudioBitrate {
    #[serde(rename = "48kbps")]
    Kbps48,
    #[serde(rename = "128kbps")]
    Kbps128,
    #[serde(rename = "192kbps")]
    Kbps192,
    #[serde(rename = "256kbps")]
    Kbps256,
    #[serde(rename = "384kbps")]
    Kbps384,
}

impl Mp4AudioBitrate {
    pub const ALL: [Mp4AudioBitrate; 5] = [
        Self::Kbps48,
        Self::Kbps128,
        Self::Kbps192,
        Self::Kbps256,
        Self::Kbps384,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kbps48 => "48kbps",
            Self::Kbps128 => "128kbps",
            Self::Kbps192 => "192kbps",
            Self::Kbps256 => "256kbps",
            Self::Kbps384 => "384kbps",
        }
    }
}

/// Audio bitrate choices offered for webm (Opus) audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebmAudioBitrate {
    #[serde(rename = "50kbps")]
    Kbps50,
    #[serde(rename = "70kbps")]
    Kbps70,
    #[serde(rename = "128kbps")]
    Kbps128,
    #[serde(rename = "160kbps")]
    Kbps160,
    #[serde(rename = "256kbps")]
    Kbps256,
}

impl WebmAudioBitrate {
    pub const ALL: [WebmAudioBitrate; 5] = [
        Self::Kbps50,
        Self::Kbps70,
        Self::Kbps128,
        Self::Kbps160,
        Self::Kbps256,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kbps50 => "50kbps",
            Self::Kbps70 => "70kbps",
            Self::Kbps128 => "128kbps",
            Self::Kbps160 => "160kbps",
            Self::Kbps256 => "256kbps",
        }
    }
}

/// Which tracks a job fetches. Both-disabled is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSelection {
    VideoAndAudio,
    Video,
    Audio,
}

impl TrackSelection {
    pub const ALL: [TrackSelection; 3] = [Self::VideoAndAudio, Self::Video, Self::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoAndAudio => "Video & Audio",
            Self::Video => "Video",
            Self::Audio => "Audio",
        }
    }

    /// Build from the persisted pair of flags
    pub fn from_flags(video: bool, audio: bool) -> Option<Self> {
        match (video, audio) {
            (true, true) => Some(Self::VideoAndAudio),
            (true, false) => Some(Self::Video),
            (false, true) => Some(Self::Audio),
            (false, false) => None,
        }
    }

    pub fn video(&self) -> bool {
        matches!(self, Self::VideoAndAudio | Self::Video)
    }

    pub fn audio(&self) -> bool {
        matches!(self, Self::VideoAndAudio | Self::Audio)
    }
}

macro_rules! impl_label {
    ($ty:ty, $field:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .copied()
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_label!(ContentFormat, "content_format");
impl_label!(VideoResolution, "video_resolution");
impl_label!(Mp4AudioBitrate, "mp4_audio_bitrate");
impl_label!(WebmAudioBitrate, "webm_audio_bitrate");
impl_label!(TrackSelection, "streams");

/// Track kind of a stream variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable rendition of a video or audio track, as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Provider-specific identifier (e.g., yt-dlp format id "137")
    pub format_id: String,
    pub kind: StreamKind,
    /// Container subtype (mp4, webm)
    pub subtype: String,
    /// Resolution label for video ("720p"), bitrate label for audio ("128kbps")
    pub label: String,
    /// Size in bytes, 0 when the provider does not know it
    pub filesize: u64,
    /// Separate track (video-only or audio-only) rather than a combined file
    pub adaptive: bool,
}

impl StreamDescriptor {
    /// Adaptive video-only variant
    pub fn video(format_id: &str, subtype: &str, label: &str, filesize: u64) -> Self {
        Self {
            format_id: format_id.to_string(),
            kind: StreamKind::Video,
            subtype: subtype.to_string(),
            label: label.to_string(),
            filesize,
            adaptive: true,
        }
    }

    /// Audio-only variant
    pub fn audio(format_id: &str, subtype: &str, label: &str, filesize: u64) -> Self {
        Self {
            format_id: format_id.to_string(),
            kind: StreamKind::Audio,
            subtype: subtype.to_string(),
            label: label.to_string(),
            filesize,
            adaptive: true,
        }
    }

    /// Combined audio+video variant
    pub fn progressive(format_id: &str, subtype: &str, label: &str, filesize: u64) -> Self {
        Self {
            adaptive: false,
            ..Self::video(format_id, subtype, label, filesize)
        }
    }
}

/// Lifecycle of a download job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Resolving,
    Selecting,
    Downloading,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Resolving)
                | (Self::Resolving, Self::Selecting)
                | (Self::Resolving, Self::Failed)
                | (Self::Selecting, Self::Downloading)
                | (Self::Selecting, Self::Failed)
                | (Self::Downloading, Self::Completed)
                | (Self::Downloading, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Resolving => "resolving",
            Self::Selecting => "selecting",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identifier of one submitted URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Identifier of one UI unit; each holds at most one job at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Network configuration for backends
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}
