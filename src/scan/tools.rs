use std::process::Command;

use tracing::{info, warn};

/// Which optional external extractors are usable. Probed once at startup
/// and passed read-only to workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolAvailability {
    pub ffprobe: bool,
    pub exiftool: bool,
}

/// Probe the configured tools. A tool that is not asked for is not probed
/// and reports unavailable.
pub fn probe_tools(use_ffprobe: bool, use_exiftool: bool) -> ToolAvailability {
    let mut tools = ToolAvailability::default();

    if use_ffprobe {
        tools.ffprobe = probe("ffprobe", "-version");
        if tools.ffprobe {
            info!("ffprobe is available");
        } else {
            warn!("ffprobe was requested but is not on PATH; video metadata will be skipped");
        }
    }

    if use_exiftool {
        tools.exiftool = probe("exiftool", "-ver");
        if tools.exiftool {
            info!("exiftool is available");
        } else {
            warn!("exiftool was requested but is not on PATH; RAW/HEIC fallback is disabled");
        }
    }

    tools
}

fn probe(binary: &str, version_arg: &str) -> bool {
    Command::new(binary)
        .arg(version_arg)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
