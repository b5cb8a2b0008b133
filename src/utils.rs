//! Directory locations and small text helpers
//!
//! Paths follow the XDG Base Directory layout:
//!
//! - Data: `~/.local/share/ruledeck/` - `config.json`
//! - State: `~/.local/state/ruledeck/` - `ruledeck.log`, `audit.log`
//!
//! # Example
//!
//! ```
//! use ruledeck::utils::{ensure_dirs, get_data_dir};
//!
//! ensure_dirs().expect("Failed to create directories");
//!
//! if let Some(data_path) = get_data_dir() {
//!     let _config = data_path.join("config.json");
//! }
//! ```

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ruledeck", "ruledeck")
}

pub fn get_data_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.data_dir().to_path_buf())
}

/// `None` on platforms without a state directory (macOS, Windows)
pub fn get_state_dir() -> Option<PathBuf> {
    project_dirs().and_then(|pd| pd.state_dir().map(std::path::Path::to_path_buf))
}

/// Creates the data and state directories, owner-only on Unix.
pub fn ensure_dirs() -> std::io::Result<()> {
    let dirs = [get_data_dir(), get_state_dir()];

    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        let mut builder = DirBuilder::new();
        builder.mode(0o700).recursive(true);
        for dir in dirs.into_iter().flatten() {
            builder.create(dir)?;
        }
    }

    #[cfg(not(unix))]
    for dir in dirs.into_iter().flatten() {
        std::fs::create_dir_all(dir)?;
    }

    Ok(())
}

/// Shortens `s` to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("0123456789abc", 10), "0123456...");
        assert_eq!(truncate_string("tcp dpt:22", 10), "tcp dpt:22");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let out = truncate_string("ééééééééé", 8);
        assert_eq!(out, "ééééé...");
        assert_eq!(out.chars().count(), 8);
    }
}
