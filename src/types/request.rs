//! Generation request and its conditioning variant.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::waveform::Waveform;

/// A single generation request as collected by a front-end host.
///
/// `duration_sec` is bounded by the front-end; the service forwards it
/// unchanged and leaves rejection of unusable values to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free-form text prompt, passed through verbatim.
    pub description: String,

    /// Requested output length in seconds.
    pub duration_sec: u32,

    /// Optional audio file used as melodic conditioning.
    #[serde(default)]
    pub melody_path: Option<PathBuf>,

    /// Optional sampling seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GenerationRequest {
    /// Creates a text-only request.
    pub fn new(description: impl Into<String>, duration_sec: u32) -> Self {
        Self {
            description: description.into(),
            duration_sec,
            melody_path: None,
            seed: None,
        }
    }

    /// Adds a melody file to the request.
    pub fn with_melody(mut self, path: impl Into<PathBuf>) -> Self {
        self.melody_path = Some(path.into());
        self
    }

    /// Sets the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// What the model is conditioned on for one request.
#[derive(Debug, Clone)]
pub enum Conditioning {
    /// Text prompt only.
    TextOnly { description: String },

    /// Text prompt plus a decoded melody.
    MelodyConditioned {
        description: String,
        melody: Waveform,
    },
}

impl Conditioning {
    /// Returns the text prompt.
    pub fn description(&self) -> &str {
        match self {
            Conditioning::TextOnly { description } => description,
            Conditioning::MelodyConditioned { description, .. } => description,
        }
    }

    /// Returns a short label for logging.
    pub fn mode(&self) -> &'static str {
        match self {
            Conditioning::TextOnly { .. } => "text",
            Conditioning::MelodyConditioned { .. } => "melody",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let request = GenerationRequest::new("ethereal, ambient, piano, 120 bpm", 20)
            .with_melody("/tmp/melody.wav")
            .with_seed(42);
        assert_eq!(request.duration_sec, 20);
        assert_eq!(request.melody_path, Some(PathBuf::from("/tmp/melody.wav")));
        assert_eq!(request.seed, Some(42));
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"description":"lofi","duration_sec":5}"#).unwrap();
        assert!(request.melody_path.is_none());
        assert!(request.seed.is_none());
    }

    #[test]
    fn conditioning_accessors() {
        let text = Conditioning::TextOnly {
            description: "trap".to_string(),
        };
        assert_eq!(text.description(), "trap");
        assert_eq!(text.mode(), "text");

        let melody = Conditioning::MelodyConditioned {
            description: "trap".to_string(),
            melody: Waveform::mono(vec![0.0; 10], 32000),
        };
        assert_eq!(melody.mode(), "melody");
    }
}
