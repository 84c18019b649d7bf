// Helper functions for provider implementations

use crate::downloader::errors::ProviderError;
use crate::downloader::models::NetworkConfig;
use lazy_static::lazy_static;
use regex::Regex;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::{debug, warn};

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).unwrap();
    static ref REPEATED_SPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, ProviderError> {
    debug!(program, args = %args.join(" "), "Spawning");

    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProviderError::Other(format!("Failed to start {}: {}", program, e)))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ProviderError::Other(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ProviderError::Other(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| ProviderError::Other(format!("Failed to wait for {}: {}", program, e)))?;
            let stdout = collect(stdout_task, "stdout").await?;
            let stderr = collect(stderr_task, "stderr").await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            warn!(program, timeout_secs, "Timed out, killing child");
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(ProviderError::MaxRetriesExceeded)
        }
    }
}

async fn collect(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    pipe: &str,
) -> Result<Vec<u8>, ProviderError> {
    task.await
        .map_err(|e| ProviderError::Other(format!("{} task failed: {}", pipe, e)))?
        .map_err(|e| ProviderError::Other(format!("Failed to read {}: {}", pipe, e)))
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = config.timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    args
}

/// Make a video title usable as a file name on every desktop platform
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(title, " ");
    let collapsed = REPEATED_SPACE.replace_all(cleaned.trim(), " ");
    let trimmed = collapsed.trim_end_matches('.').trim();
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_args() {
        let config = NetworkConfig {
            proxy: Some("socks5://127.0.0.1:1080".into()),
            timeout: Some(15),
        };
        assert_eq!(get_proxy_args(&config), vec!["--proxy", "socks5://127.0.0.1:1080"]);
        assert_eq!(get_timeout_args(&config), vec!["--socket-timeout", "15"]);

        let bare = NetworkConfig {
            proxy: None,
            timeout: None,
        };
        assert!(get_proxy_args(&bare).is_empty());
        assert!(get_timeout_args(&bare).is_empty());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC: Live | 1991"), "AC DC Live 1991");
        assert_eq!(sanitize_filename("  what?  "), "what");
        assert_eq!(sanitize_filename("ending..."), "ending");
        assert_eq!(sanitize_filename("Plain title"), "Plain title");
        assert_eq!(sanitize_filename("///"), "video");
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let result = run_output_with_timeout("definitely-not-a-real-binary-xyz", vec![], 5).await;
        assert!(matches!(result, Err(ProviderError::Other(msg)) if msg.starts_with("Failed to start")));
    }
}
