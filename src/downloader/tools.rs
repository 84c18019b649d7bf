use std::path::Path;
use std::process::Command;
use tracing::debug;

const YTDLP: &str = "yt-dlp";

/// Where the yt-dlp binary lives and which version it is
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager {
    common_dirs: Vec<String>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self {
            common_dirs: vec![
                "/opt/homebrew/bin".to_string(), // Homebrew on Apple Silicon
                "/usr/local/bin".to_string(),
                "/usr/bin".to_string(),
            ],
        }
    }

    pub fn ytdlp_info(&self) -> ToolInfo {
        let path = self.locate(YTDLP);
        let version = path.as_deref().and_then(Self::version_of);

        ToolInfo {
            name: YTDLP.to_string(),
            is_available: version.is_some(),
            version,
            path,
        }
    }

    fn locate(&self, binary_name: &str) -> Option<String> {
        // 1. Try common paths first
        for dir in &self.common_dirs {
            let path = Path::new(dir).join(binary_name);
            if path.exists() {
                return Some(path.to_string_lossy().into_owned());
            }
        }

        // 2. Try PATH
        if let Ok(output) = Command::new("which").arg(binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }

        debug!(binary = binary_name, "Binary not found");
        None
    }

    fn version_of(path: &str) -> Option<String> {
        match Command::new(path).arg("--version").output() {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!out.is_empty()).then_some(out)
            }
            _ => None,
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}
