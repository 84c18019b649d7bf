// Error types for the download engine

use std::path::PathBuf;

use thiserror::Error;

use super::models::{ContentFormat, JobState, SlotId, StreamKind};

/// Failure kinds raised by a metadata provider. Closed set; anything
/// the provider cannot name lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("maximum number of retries exceeded")]
    MaxRetriesExceeded,

    #[error("response could not be parsed: {0}")]
    ParseFailure(String),

    #[error("video not found: {0}")]
    NotFound(String),

    #[error("video is age-restricted")]
    AgeRestricted,

    #[error("video is a live stream")]
    LiveStream,

    #[error("video is private")]
    VideoPrivate,

    #[error("live stream recording is not available")]
    RecordingUnavailable,

    #[error("video is for channel members only")]
    MembersOnly,

    #[error("video is blocked in this region")]
    RegionBlocked,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Map provider diagnostics text (e.g. yt-dlp stderr) to a failure kind.
    /// Patterns are checked from most to least specific.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("members only")
            || lower.contains("members-only")
            || lower.contains("join this channel")
            || lower.contains("available to members")
        {
            return Self::MembersOnly;
        }

        if lower.contains("age-restricted")
            || lower.contains("sign in to confirm your age")
            || lower.contains("age_verification")
        {
            return Self::AgeRestricted;
        }

        if lower.contains("private video") || lower.contains("video is private") {
            return Self::VideoPrivate;
        }

        // Finished live streams without a recording must win over "live"
        if lower.contains("recording is not available")
            || lower.contains("recording unavailable")
            || lower.contains("no recording")
        {
            return Self::RecordingUnavailable;
        }

        if lower.contains("live event will begin")
            || lower.contains("is a live stream")
            || lower.contains("is live")
            || lower.contains("premieres in")
        {
            return Self::LiveStream;
        }

        if lower.contains("available in your country")
            || lower.contains("blocked in your country")
            || lower.contains("from your location")
            || lower.contains("geo restriction")
            || lower.contains("geo restricted")
            || lower.contains("geo-restricted")
        {
            return Self::RegionBlocked;
        }

        if lower.contains("unsupported url")
            || lower.contains("is not a valid url")
            || lower.contains("video unavailable")
            || lower.contains("incomplete youtube id")
            || lower.contains("http error 404")
        {
            return Self::NotFound(message.trim().to_string());
        }

        if lower.contains("unable to extract")
            || lower.contains("invalid json")
            || lower.contains("failed to parse")
        {
            return Self::ParseFailure(message.trim().to_string());
        }

        if lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("giving up after")
            || lower.contains("connection refused")
            || lower.contains("network is unreachable")
            || lower.contains("max retries")
        {
            return Self::MaxRetriesExceeded;
        }

        Self::Other(message.trim().to_string())
    }
}

/// User-facing failure categories, one message each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Connectivity,
    Unparsable,
    NotFound,
    AgeRestricted,
    LiveStream,
    Private,
    NoRecording,
    MembersOnly,
    RegionBlocked,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 10] = [
        Self::Connectivity,
        Self::Unparsable,
        Self::NotFound,
        Self::AgeRestricted,
        Self::LiveStream,
        Self::Private,
        Self::NoRecording,
        Self::MembersOnly,
        Self::RegionBlocked,
        Self::Unknown,
    ];

    pub fn message(&self) -> &'static str {
        match self {
            Self::Connectivity => {
                "Maximum number of retries exceeded. Please check your Internet connection and try again."
            }
            Self::Unparsable => "The video page could not be parsed. Please try again later.",
            Self::NotFound => "Could not find the video. Please check whether this URL is correct.",
            Self::AgeRestricted => {
                "The video is age-restricted and cannot be accessed without logging in."
            }
            Self::LiveStream => "The video is being streamed live and cannot be loaded.",
            Self::Private => "The video is private.",
            Self::NoRecording => "The video does not have a live stream recording available.",
            Self::MembersOnly => "The video is available only for channel members.",
            Self::RegionBlocked => "The video is not available in your region.",
            Self::Unknown => {
                "Sorry, something went wrong. Please check your Internet connection and try again."
            }
        }
    }
}

/// Total mapping from provider failure kind to user-facing category
pub fn classify(error: &ProviderError) -> ErrorCategory {
    match error {
        ProviderError::MaxRetriesExceeded => ErrorCategory::Connectivity,
        ProviderError::ParseFailure(_) => ErrorCategory::Unparsable,
        ProviderError::NotFound(_) => ErrorCategory::NotFound,
        ProviderError::AgeRestricted => ErrorCategory::AgeRestricted,
        ProviderError::LiveStream => ErrorCategory::LiveStream,
        ProviderError::VideoPrivate => ErrorCategory::Private,
        ProviderError::RecordingUnavailable => ErrorCategory::NoRecording,
        ProviderError::MembersOnly => ErrorCategory::MembersOnly,
        ProviderError::RegionBlocked => ErrorCategory::RegionBlocked,
        ProviderError::Other(_) => ErrorCategory::Unknown,
    }
}

/// Persisted settings could not be used
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings are malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings must be a JSON object")]
    NotARecord,

    #[error("output directory must not be empty")]
    EmptyOutputDirectory,

    #[error("at least one of video or audio must be downloaded")]
    NoTracksEnabled,

    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: &'static str, value: String },
}

/// The catalog has nothing usable for the request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No {kind} stream is available in {} format for this video.", format.as_str())]
    NoMatchingStream {
        kind: StreamKind,
        format: ContentFormat,
    },

    #[error("invalid quality label: {0:?}")]
    InvalidLabel(String),
}

/// Job-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("resolution failed: {0}")]
    Resolution(ProviderError),

    #[error("{0}")]
    Selection(#[from] SelectionError),

    #[error("transfer failed: {0}")]
    Transfer(ProviderError),

    #[error("illegal job transition {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("unknown download slot: {0}")]
    UnknownSlot(SlotId),

    #[error("provider unavailable: {0}")]
    Provider(String),
}

impl DownloadError {
    /// Classified category for provider failures
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Resolution(e) | Self::Transfer(e) => Some(classify(e)),
            _ => None,
        }
    }

    /// Text shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self.category() {
            Some(category) => category.message().to_string(),
            None => self.to_string(),
        }
    }
}
