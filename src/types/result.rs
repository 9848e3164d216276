//! Generation result returned to front-end hosts.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A generated audio file.
///
/// There is exactly one artifact per result. Download and playback views
/// both point at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Path of the written WAV file.
    pub path: PathBuf,

    /// Sample rate of the file in Hz.
    pub sample_rate: u32,

    /// Number of audio channels in the file.
    pub channels: u16,

    /// Length of the file in seconds.
    pub duration_sec: f32,
}

impl GenerationResult {
    /// Path offered for download.
    pub fn download_path(&self) -> &Path {
        &self.path
    }

    /// Path offered to an inline player.
    pub fn playback_path(&self) -> &Path {
        &self.path
    }

    /// Both views of the result, in (download, playback) order.
    pub fn paths(&self) -> (&Path, &Path) {
        (self.download_path(), self.playback_path())
    }
}

/// Prints the download and playback paths, one labelled line each.
impl fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (download, playback) = self.paths();
        writeln!(f, "download: {}", download.display())?;
        write!(f, "playback: {}", playback.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_and_playback_are_the_same_file() {
        let result = GenerationResult {
            path: PathBuf::from("/tmp/songstarter-abc.wav"),
            sample_rate: 32000,
            channels: 2,
            duration_sec: 10.0,
        };
        let (download, playback) = result.paths();
        assert_eq!(download, playback);
        assert_eq!(download, Path::new("/tmp/songstarter-abc.wav"));
    }

    #[test]
    fn display_labels_both_paths() {
        let result = GenerationResult {
            path: PathBuf::from("/tmp/songstarter-abc.wav"),
            sample_rate: 32000,
            channels: 1,
            duration_sec: 5.0,
        };
        assert_eq!(
            result.to_string(),
            "download: /tmp/songstarter-abc.wav\nplayback: /tmp/songstarter-abc.wav"
        );
    }
}
