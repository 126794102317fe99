//! Transcript files for model calls under `<log-root>/<task>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Separator between prompt and completion in a transcript.
pub const TRANSCRIPT_DIVIDER: &str = "\n\n================================================================================\n\n";

/// Path for one transcript: `<dir>/<prefix>-<millis>.log`.
pub fn transcript_path(dir: &Path, prefix: &str, timestamp_ms: i64) -> PathBuf {
    dir.join(format!("{prefix}-{timestamp_ms}.log"))
}

/// Write the prompt and completion for a single call.
///
/// Creates the directory on first use. Returns the written path.
pub fn write_transcript(
    dir: &Path,
    prefix: &str,
    timestamp_ms: i64,
    prompt: &str,
    completion: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create transcript dir {}", dir.display()))?;
    let path = transcript_path(dir, prefix, timestamp_ms);
    let mut buf = String::with_capacity(prompt.len() + completion.len() + TRANSCRIPT_DIVIDER.len());
    buf.push_str(prompt);
    buf.push_str(TRANSCRIPT_DIVIDER);
    buf.push_str(completion);
    fs::write(&path, buf).with_context(|| format!("write transcript {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_is_eighty_equals_between_blank_lines() {
        let trimmed = TRANSCRIPT_DIVIDER.trim_matches('\n');
        assert_eq!(trimmed.len(), 80);
        assert!(trimmed.chars().all(|c| c == '='));
        assert!(TRANSCRIPT_DIVIDER.starts_with("\n\n"));
        assert!(TRANSCRIPT_DIVIDER.ends_with("\n\n"));
    }

    #[test]
    fn writes_prompt_then_completion() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("logs").join("add");
        let path = write_transcript(&dir, "stub", 1_700_000_000_123, "PROMPT", "ANSWER")
            .expect("write");

        assert_eq!(path, dir.join("stub-1700000000123.log"));
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, format!("PROMPT{TRANSCRIPT_DIVIDER}ANSWER"));
    }
}
