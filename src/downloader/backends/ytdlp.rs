// yt-dlp backed provider
//
// Resolution shells out to `yt-dlp --dump-json`; the chosen formats are then
// fetched directly over HTTP so byte-level progress can be reported.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::downloader::errors::{DownloadError, ProviderError};
use crate::downloader::models::{NetworkConfig, StreamDescriptor, StreamKind};
use crate::downloader::tools::ToolManager;
use crate::downloader::traits::{MetadataProvider, TransferObserver, VideoHandle};
use crate::downloader::utils::{get_proxy_args, get_timeout_args, run_output_with_timeout, sanitize_filename};

const RESOLVE_TIMEOUT_SECS: u64 = 120;

/// Where one format's bytes are served from
#[derive(Debug, Clone)]
struct FormatSource {
    url: String,
    headers: Vec<(String, String)>,
}

pub struct YtDlpProvider {
    ytdlp_path: String,
    network: NetworkConfig,
    client: reqwest::Client,
}

impl YtDlpProvider {
    pub fn new(network: NetworkConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = network.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| DownloadError::Provider(format!("Invalid proxy URL {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        if let Some(secs) = network.timeout {
            builder = builder.connect_timeout(Duration::from_secs(secs as u64));
        }
        let client = builder
            .build()
            .map_err(|e| DownloadError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        let tool = ToolManager::new().ytdlp_info();
        if tool.is_available {
            debug!(tool = %tool.name, path = ?tool.path, version = ?tool.version, "Found tool");
        } else {
            warn!(tool = %tool.name, "Tool not found or not runnable, resolving will fail");
        }
        // bare name lets the OS search PATH at spawn time
        let ytdlp_path = tool.path.unwrap_or_else(|| "yt-dlp".to_string());

        Ok(Self {
            ytdlp_path,
            network,
            client,
        })
    }

    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(get_timeout_args(&self.network));
        args.extend(get_proxy_args(&self.network));
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MetadataProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &str) -> Result<Box<dyn VideoHandle>, ProviderError> {
        let output = run_output_with_timeout(&self.ytdlp_path, self.build_args(url), RESOLVE_TIMEOUT_SECS).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url = %url, stderr = %stderr.trim(), "yt-dlp failed");
            return Err(ProviderError::from_message(&stderr));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::ParseFailure(format!("Invalid JSON: {}", e)))?;
        let video = parse_video(&json, self.client.clone())?;
        info!(url = %url, title = %video.title, streams = video.streams.len(), "Resolved");
        Ok(Box::new(video))
    }
}

pub struct YtDlpVideo {
    title: String,
    streams: Vec<StreamDescriptor>,
    sources: HashMap<String, FormatSource>,
    client: reqwest::Client,
}

fn parse_video(json: &serde_json::Value, client: reqwest::Client) -> Result<YtDlpVideo, ProviderError> {
    let formats = json["formats"]
        .as_array()
        .ok_or_else(|| ProviderError::ParseFailure("No formats array in JSON".to_string()))?;

    let mut streams = Vec::new();
    let mut sources = HashMap::new();
    for f in formats {
        if let Some((stream, source)) = parse_format(f) {
            sources.insert(stream.format_id.clone(), source);
            streams.push(stream);
        }
    }

    Ok(YtDlpVideo {
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        streams,
        sources,
        client,
    })
}

/// One yt-dlp format entry, or `None` when it cannot be fetched as a plain file
fn parse_format(f: &serde_json::Value) -> Option<(StreamDescriptor, FormatSource)> {
    let protocol = f["protocol"].as_str().unwrap_or("https");
    if protocol != "https" && protocol != "http" {
        return None;
    }
    let url = f["url"].as_str()?;
    let format_id = f["format_id"].as_str()?;
    let ext = f["ext"].as_str()?;

    let has_video = f["vcodec"].as_str().map_or(false, |v| v != "none");
    let has_audio = f["acodec"].as_str().map_or(false, |a| a != "none");

    let (kind, label, adaptive) = match (has_video, has_audio) {
        (true, _) => {
            let height = f["height"].as_u64()?;
            (StreamKind::Video, format!("{}p", height), !has_audio)
        }
        (false, true) => {
            let abr = f["abr"].as_f64().filter(|a| *a > 0.0)?;
            (StreamKind::Audio, format!("{}kbps", abr.round() as u64), true)
        }
        (false, false) => return None,
    };

    // audio-only mp4 is reported with its file extension
    let subtype = if ext == "m4a" { "mp4" } else { ext };

    let filesize = f["filesize"]
        .as_u64()
        .or_else(|| f["filesize_approx"].as_u64())
        .unwrap_or(0);

    let headers = f["http_headers"]
        .as_object()
        .map(|h| {
            h.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some((
        StreamDescriptor {
            format_id: format_id.to_string(),
            kind,
            subtype: subtype.to_string(),
            label,
            filesize,
            adaptive,
        },
        FormatSource {
            url: url.to_string(),
            headers,
        },
    ))
}

fn map_http_error(e: reqwest::Error, url: &str) -> ProviderError {
    if e.is_timeout() || e.is_connect() {
        return ProviderError::MaxRetriesExceeded;
    }
    match e.status() {
        Some(reqwest::StatusCode::NOT_FOUND) => ProviderError::NotFound(url.to_string()),
        _ => ProviderError::Other(e.to_string()),
    }
}

fn io_error(path: &Path, e: std::io::Error) -> ProviderError {
    ProviderError::Other(format!("Failed to write {}: {}", path.display(), e))
}

/// Create `output_dir` if needed and return `<output_dir>/<prefix><title>.<subtype>`
async fn prepare_output(
    output_dir: &Path,
    prefix: &str,
    title: &str,
    subtype: &str,
) -> Result<PathBuf, ProviderError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| io_error(output_dir, e))?;
    Ok(output_dir.join(format!("{}{}.{}", prefix, sanitize_filename(title), subtype)))
}

/// Catalog size when yt-dlp knew it, else the response's Content-Length, else 0
fn expected_size(catalog_size: u64, content_length: Option<u64>) -> u64 {
    match catalog_size {
        0 => content_length.unwrap_or(0),
        size => size,
    }
}

/// Turns received chunk lengths into remaining-byte counts
#[derive(Debug)]
struct ChunkCounter {
    total: u64,
    received: u64,
}

impl ChunkCounter {
    fn new(total: u64) -> Self {
        Self { total, received: 0 }
    }

    fn record(&mut self, chunk_len: usize) -> u64 {
        self.received += chunk_len as u64;
        self.total.saturating_sub(self.received)
    }
}

#[async_trait]
impl VideoHandle for YtDlpVideo {
    fn title(&self) -> &str {
        &self.title
    }

    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    async fn download(
        &self,
        stream: &StreamDescriptor,
        output_dir: &Path,
        filename_prefix: &str,
        observer: &mut (dyn TransferObserver + Send),
    ) -> Result<PathBuf, ProviderError> {
        let source = self
            .sources
            .get(&stream.format_id)
            .ok_or_else(|| ProviderError::NotFound(format!("format {}", stream.format_id)))?;

        let path = prepare_output(output_dir, filename_prefix, &self.title, &stream.subtype).await?;

        let mut request = self.client.get(&source.url);
        for (name, value) in &source.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let mut response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| map_http_error(e, &source.url))?;

        let mut counter = ChunkCounter::new(expected_size(stream.filesize, response.content_length()));
        debug!(format = %stream.format_id, total = counter.total, path = %path.display(), "Transfer started");

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_http_error(e, &source.url))?
        {
            file.write_all(&chunk).await.map_err(|e| io_error(&path, e))?;
            observer.on_progress(counter.record(chunk.len()));
        }
        file.flush().await.map_err(|e| io_error(&path, e))?;

        info!(format = %stream.format_id, bytes = counter.received, path = %path.display(), "Transfer finished");
        observer.on_complete(&path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "title": "Sample: clip",
            "formats": [
                { "format_id": "sb0", "ext": "mhtml", "protocol": "mhtml", "vcodec": "none", "acodec": "none",
                  "url": "https://i.ytimg.com/sb" },
                { "format_id": "139", "ext": "m4a", "protocol": "https", "vcodec": "none", "acodec": "mp4a.40.5",
                  "abr": 48.8, "filesize": 500, "url": "https://cdn/139" },
                { "format_id": "140", "ext": "m4a", "protocol": "https", "vcodec": "none", "acodec": "mp4a.40.2",
                  "abr": 129.5, "filesize": 2000, "url": "https://cdn/140",
                  "http_headers": { "User-Agent": "Mozilla/5.0" } },
                { "format_id": "251", "ext": "webm", "protocol": "https", "vcodec": "none", "acodec": "opus",
                  "abr": 160.0, "filesize_approx": 2500, "url": "https://cdn/251" },
                { "format_id": "18", "ext": "mp4", "protocol": "https", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
                  "height": 360, "url": "https://cdn/18" },
                { "format_id": "136", "ext": "mp4", "protocol": "https", "vcodec": "avc1.4d401f", "acodec": "none",
                  "height": 720, "filesize": 8000, "url": "https://cdn/136" },
                { "format_id": "247", "ext": "webm", "protocol": "https", "vcodec": "vp9", "acodec": "none",
                  "height": 720, "url": "https://cdn/247" },
                { "format_id": "hls-720", "ext": "mp4", "protocol": "m3u8_native", "vcodec": "avc1", "acodec": "mp4a",
                  "height": 720, "url": "https://cdn/playlist.m3u8" }
            ]
        })
    }

    #[test]
    fn test_parse_catalog() {
        let video = parse_video(&sample(), reqwest::Client::new()).unwrap();
        assert_eq!(video.title(), "Sample: clip");

        let ids: Vec<&str> = video.streams().iter().map(|s| s.format_id.as_str()).collect();
        assert_eq!(ids, vec!["139", "140", "251", "18", "136", "247"]);

        let audio = &video.streams()[1];
        assert_eq!(audio, &StreamDescriptor::audio("140", "mp4", "130kbps", 2000));
        assert_eq!(video.sources["140"].headers, vec![("User-Agent".to_string(), "Mozilla/5.0".to_string())]);

        assert_eq!(video.streams()[2], StreamDescriptor::audio("251", "webm", "160kbps", 2500));
        assert_eq!(video.streams()[3], StreamDescriptor::progressive("18", "mp4", "360p", 0));
        assert_eq!(video.streams()[4], StreamDescriptor::video("136", "mp4", "720p", 8000));
    }

    #[test]
    fn test_formats_without_label_are_skipped() {
        let json = json!({
            "title": "x",
            "formats": [
                { "format_id": "a", "ext": "m4a", "vcodec": "none", "acodec": "mp4a", "url": "https://cdn/a" },
                { "format_id": "v", "ext": "mp4", "vcodec": "avc1", "acodec": "none", "url": "https://cdn/v" }
            ]
        });
        let video = parse_video(&json, reqwest::Client::new()).unwrap();
        assert!(video.streams().is_empty());
    }

    #[test]
    fn test_missing_formats_is_parse_failure() {
        let err = parse_video(&json!({ "title": "x" }), reqwest::Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::ParseFailure(_)));
    }

    #[tokio::test]
    async fn test_prepare_output_creates_dir_and_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let path = prepare_output(&nested, "(audio) ", "Live: Act/2?", "webm").await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(path, nested.join("(audio) Live Act 2.webm"));

        let plain = prepare_output(&nested, "", "Clip", "mp4").await.unwrap();
        assert_eq!(plain, nested.join("Clip.mp4"));
    }

    #[test]
    fn test_expected_size_falls_back_to_content_length() {
        assert_eq!(expected_size(8_000, Some(9_000)), 8_000);
        assert_eq!(expected_size(0, Some(9_000)), 9_000);
        assert_eq!(expected_size(0, None), 0);
    }

    #[test]
    fn test_chunk_counter_reports_remaining() {
        let mut counter = ChunkCounter::new(1_000);
        assert_eq!(counter.record(400), 600);
        assert_eq!(counter.record(600), 0);
        // more bytes than announced never underflows
        assert_eq!(counter.record(10), 0);
        assert_eq!(counter.received, 1_010);

        let mut unknown = ChunkCounter::new(0);
        assert_eq!(unknown.record(512), 0);
    }

    #[test]
    fn test_build_args() {
        let provider = YtDlpProvider::new(NetworkConfig {
            proxy: Some("socks5://127.0.0.1:1080".into()),
            timeout: Some(10),
        })
        .unwrap();
        let args = provider.build_args("https://youtu.be/abc");
        assert_eq!(&args[..2], &["--dump-json", "--no-playlist"]);
        assert!(args.windows(2).any(|w| w == ["--socket-timeout", "10"]));
        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://127.0.0.1:1080"]));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let result = YtDlpProvider::new(NetworkConfig {
            proxy: Some("not a url".into()),
            timeout: None,
        });
        assert!(matches!(result, Err(DownloadError::Provider(_))));
    }
}
