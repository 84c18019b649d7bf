use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::console::ConsolePresenter;
use crate::downloader::orchestrator::split_submission;
use crate::downloader::{
    ContentFormat, Downloader, JobState, NetworkConfig, PlatformDirs, Presenter, Settings, TrackSelection,
    VideoResolution, YtDlpProvider,
};

#[derive(Parser, Debug)]
#[command(
    name = "tube-fetch",
    about = "Download video and audio streams with live progress",
    version
)]
pub struct Args {
    /// Video URLs; each one becomes its own download
    pub urls: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file path
    #[arg(long, default_value = "settings.json")]
    pub settings: PathBuf,

    /// Container format: mp4 or webm
    #[arg(long)]
    pub format: Option<ContentFormat>,

    /// Preferred video resolution, e.g. 720p
    #[arg(long)]
    pub resolution: Option<VideoResolution>,

    /// Which tracks to fetch: "Video & Audio", "Video" or "Audio"
    #[arg(long)]
    pub streams: Option<TrackSelection>,

    /// Preferred audio bitrate for the active format, e.g. 128kbps
    #[arg(long)]
    pub bitrate: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Persist the settings after applying the overrides above
    #[arg(long)]
    pub save_settings: bool,

    /// Proxy URL (supports http, https, socks5)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Network timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u32,
}

fn apply_overrides(settings: &mut Settings, args: &Args) -> anyhow::Result<()> {
    // format first so --bitrate lands on the right value set
    if let Some(format) = args.format {
        settings.set_content_format(format);
    }
    if let Some(bitrate) = args.bitrate.as_deref() {
        settings.set_audio_bitrate(bitrate)?;
    }
    if let Some(resolution) = args.resolution {
        settings.set_video_resolution(resolution);
    }
    if let Some(tracks) = args.streams {
        settings.set_tracks(tracks);
    }
    if let Some(output) = args.output.as_deref() {
        settings.set_output_directory(output)?;
    }
    Ok(())
}

/// Positional arguments tokenized the same way the downloader splits a submission
fn submitted_urls(args: &Args) -> Vec<String> {
    split_submission(&args.urls.join(" "))
}

pub async fn execute(args: Args) -> anyhow::Result<()> {
    let mut settings = Settings::load(&args.settings, &PlatformDirs);
    apply_overrides(&mut settings, &args)?;
    if args.save_settings {
        settings.save(&args.settings)?;
    }

    let urls = submitted_urls(&args);
    if urls.is_empty() {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let provider = YtDlpProvider::new(NetworkConfig {
        proxy: args.proxy.clone(),
        timeout: Some(args.timeout),
    })?;
    let mut downloader = Downloader::new(Arc::new(provider));
    let mut presenter = ConsolePresenter::new();

    let slot = downloader.add_slot(presenter.add_view(&urls[0]));
    downloader
        .submit(slot, &urls.join(" "), &settings, &mut presenter)
        .await?;

    let interrupted = tokio::select! {
        _ = downloader.run_until_idle() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        warn!("Interrupted, abandoning running downloads");
        downloader.remove_all();
        anyhow::bail!("interrupted");
    }

    let statuses = downloader.statuses();
    let failed = statuses
        .iter()
        .filter(|(_, s)| s.state == JobState::Failed)
        .count();
    info!(total = statuses.len(), failed, "All downloads finished");
    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, statuses.len());
    }
    Ok(())
}
