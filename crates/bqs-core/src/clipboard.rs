//! System clipboard integration via platform utilities.

use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("no clipboard utility found (install xclip or xsel)")]
    NoUtility,

    #[error("clipboard not supported on this platform")]
    Unsupported,

    #[error("clipboard command failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("clipboard command exited with failure")]
    CommandFailed,
}

/// Copy text to the system clipboard.
///
/// Uses `pbcopy` on macOS, `xclip` falling back to `xsel` on Linux, and
/// `clip` on Windows.
pub fn copy_to_clipboard(text: &str) -> Result<(), ClipboardError> {
    let mut command = clipboard_command()?;

    let mut child = command.stdin(Stdio::piped()).spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClipboardError::NoUtility
        } else {
            ClipboardError::Io(e)
        }
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(ClipboardError::CommandFailed);
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn clipboard_command() -> Result<Command, ClipboardError> {
    Ok(Command::new("pbcopy"))
}

#[cfg(target_os = "linux")]
fn clipboard_command() -> Result<Command, ClipboardError> {
    if binary_on_path("xclip") {
        let mut cmd = Command::new("xclip");
        cmd.args(["-selection", "clipboard"]);
        return Ok(cmd);
    }
    if binary_on_path("xsel") {
        let mut cmd = Command::new("xsel");
        cmd.args(["--clipboard", "--input"]);
        return Ok(cmd);
    }
    Err(ClipboardError::NoUtility)
}

#[cfg(target_os = "windows")]
fn clipboard_command() -> Result<Command, ClipboardError> {
    Ok(Command::new("clip"))
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn clipboard_command() -> Result<Command, ClipboardError> {
    Err(ClipboardError::Unsupported)
}

#[cfg(target_os = "linux")]
fn binary_on_path(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ClipboardError::NoUtility.to_string(),
            "no clipboard utility found (install xclip or xsel)"
        );
        assert_eq!(
            ClipboardError::Unsupported.to_string(),
            "clipboard not supported on this platform"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_binary_on_path_finds_sh() {
        assert!(binary_on_path("sh"));
        assert!(!binary_on_path("definitely-not-a-real-binary-name"));
    }
}
