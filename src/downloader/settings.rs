// Persisted user preferences: validation, defaults, typed accessors

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::errors::ConfigError;
use super::models::{
    ContentFormat, Mp4AudioBitrate, TrackSelection, VideoResolution, WebmAudioBitrate,
};

/// Source of the default output directory
pub trait DownloadsDirProvider {
    fn downloads_dir(&self) -> PathBuf;
}

/// Fixed directory, mostly useful for tests and explicit overrides
impl DownloadsDirProvider for PathBuf {
    fn downloads_dir(&self) -> PathBuf {
        self.clone()
    }
}

/// Host platform convention: `<home>/Downloads`, or the shared storage
/// download folder on Android.
pub struct PlatformDirs;

const ANDROID_STORAGE: &str = "/storage/emulated/0/";

impl DownloadsDirProvider for PlatformDirs {
    fn downloads_dir(&self) -> PathBuf {
        if cfg!(target_os = "linux") || cfg!(target_os = "android") {
            let storage = Path::new(ANDROID_STORAGE);
            if storage.exists() {
                return storage.join("Download");
            }
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Downloads")
    }
}

/// User settings. All seven fields are required on disk; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    output_directory: String,
    download_video: bool,
    download_audio: bool,
    content_format: ContentFormat,
    video_resolution: VideoResolution,
    mp4_audio_bitrate: Mp4AudioBitrate,
    webm_audio_bitrate: WebmAudioBitrate,
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults(&PlatformDirs)
    }
}

impl Settings {
    /// Default settings with the output directory taken from `dirs`
    pub fn defaults(dirs: &dyn DownloadsDirProvider) -> Self {
        Self {
            output_directory: dirs.downloads_dir().to_string_lossy().into_owned(),
            download_video: true,
            download_audio: true,
            content_format: ContentFormat::Mp4,
            video_resolution: VideoResolution::P720,
            mp4_audio_bitrate: Mp4AudioBitrate::Kbps128,
            webm_audio_bitrate: WebmAudioBitrate::Kbps128,
        }
    }

    /// Load settings from `path`. Anything unusable (missing file, bad JSON,
    /// missing or mistyped field, value outside its set) is replaced wholesale
    /// by defaults, which are written back immediately.
    pub fn load(path: &Path, dirs: &dyn DownloadsDirProvider) -> Self {
        match Self::try_load(path) {
            Ok(settings) => {
                debug!(path = %path.display(), "Loaded settings");
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Settings unusable, regenerating defaults");
                let defaults = Self::defaults(dirs);
                if let Err(e) = defaults.save(path) {
                    warn!(path = %path.display(), error = %e, "Failed to persist default settings");
                }
                defaults
            }
        }
    }

    /// Strict load without the default fallback
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // a positional array would also satisfy the derived Deserialize
        let value: serde_json::Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(ConfigError::NotARecord);
        }
        let settings: Settings = serde_json::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize and overwrite `path`
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_directory.trim().is_empty() {
            return Err(ConfigError::EmptyOutputDirectory);
        }
        if !self.download_video && !self.download_audio {
            return Err(ConfigError::NoTracksEnabled);
        }
        Ok(())
    }

    pub fn output_directory(&self) -> &Path {
        Path::new(&self.output_directory)
    }

    pub fn download_video(&self) -> bool {
        self.download_video
    }

    pub fn download_audio(&self) -> bool {
        self.download_audio
    }

    pub fn tracks(&self) -> TrackSelection {
        // validate() guarantees at least one flag is set
        TrackSelection::from_flags(self.download_video, self.download_audio)
            .unwrap_or(TrackSelection::VideoAndAudio)
    }

    pub fn content_format(&self) -> ContentFormat {
        self.content_format
    }

    pub fn video_resolution(&self) -> VideoResolution {
        self.video_resolution
    }

    pub fn mp4_audio_bitrate(&self) -> Mp4AudioBitrate {
        self.mp4_audio_bitrate
    }

    pub fn webm_audio_bitrate(&self) -> WebmAudioBitrate {
        self.webm_audio_bitrate
    }

    /// Bitrate label for the active container format
    pub fn audio_bitrate_label(&self) -> &'static str {
        match self.content_format {
            ContentFormat::Mp4 => self.mp4_audio_bitrate.as_str(),
            ContentFormat::Webm => self.webm_audio_bitrate.as_str(),
        }
    }

    /// Bitrate labels offered for the active container format
    pub fn bitrate_options(&self) -> Vec<&'static str> {
        match self.content_format {
            ContentFormat::Mp4 => Mp4AudioBitrate::ALL.iter().map(|b| b.as_str()).collect(),
            ContentFormat::Webm => WebmAudioBitrate::ALL.iter().map(|b| b.as_str()).collect(),
        }
    }

    pub fn set_output_directory(&mut self, dir: impl Into<String>) -> Result<(), ConfigError> {
        let dir = dir.into();
        if dir.trim().is_empty() {
            return Err(ConfigError::EmptyOutputDirectory);
        }
        self.output_directory = dir;
        Ok(())
    }

    pub fn set_tracks(&mut self, tracks: TrackSelection) {
        self.download_video = tracks.video();
        self.download_audio = tracks.audio();
    }

    pub fn set_content_format(&mut self, format: ContentFormat) {
        self.content_format = format;
    }

    pub fn set_video_resolution(&mut self, resolution: VideoResolution) {
        self.video_resolution = resolution;
    }

    pub fn set_mp4_audio_bitrate(&mut self, bitrate: Mp4AudioBitrate) {
        self.mp4_audio_bitrate = bitrate;
    }

    pub fn set_webm_audio_bitrate(&mut self, bitrate: WebmAudioBitrate) {
        self.webm_audio_bitrate = bitrate;
    }

    /// Set the bitrate of the active format from its label
    pub fn set_audio_bitrate(&mut self, label: &str) -> Result<(), ConfigError> {
        match self.content_format {
            ContentFormat::Mp4 => self.mp4_audio_bitrate = label.parse()?,
            ContentFormat::Webm => self.webm_audio_bitrate = label.parse()?,
        }
        Ok(())
    }
}
