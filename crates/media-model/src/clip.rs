//! Clip descriptors: what planning needs to know about a media source.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::time::MediaTime;
use crate::transform::AffineTransform;

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A video track inside a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    /// Coded frame size, before the preferred transform.
    pub natural_size: Size,

    /// Display transform from container metadata (camera orientation).
    #[serde(default)]
    pub preferred_transform: AffineTransform,
}

/// An audio track inside a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Playable duration of the track.
    pub duration: MediaTime,
}

/// A decodable media source and its tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDescriptor {
    /// Location of the media file.
    pub source: PathBuf,

    /// Clip duration.
    pub duration: MediaTime,

    /// Video tracks in container order.
    #[serde(default)]
    pub video_tracks: Vec<VideoTrack>,

    /// Audio tracks in container order.
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
}

impl ClipDescriptor {
    /// A clip with a single video track.
    pub fn video(
        source: impl Into<PathBuf>,
        natural_size: Size,
        preferred_transform: AffineTransform,
        duration: MediaTime,
    ) -> Self {
        Self {
            source: source.into(),
            duration,
            video_tracks: vec![VideoTrack {
                natural_size,
                preferred_transform,
            }],
            audio_tracks: vec![],
        }
    }

    /// A clip with a single audio track spanning its whole duration.
    pub fn audio(source: impl Into<PathBuf>, duration: MediaTime) -> Self {
        Self {
            source: source.into(),
            duration,
            video_tracks: vec![],
            audio_tracks: vec![AudioTrack { duration }],
        }
    }

    pub fn first_video_track(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }

    pub fn first_audio_track(&self) -> Option<&AudioTrack> {
        self.audio_tracks.first()
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    /// Load a descriptor from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        load_json(path.as_ref())
    }

    /// Save this descriptor as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        save_json(path.as_ref(), self)
    }
}

/// Which kind of media a file picker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Audio,
}

impl MediaKind {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Movie => &["mov", "mp4", "m4v", "mkv", "avi", "webm"],
            MediaKind::Audio => &[
                "m4a", "mp3", "wav", "aac", "aiff", "aif", "caf", "flac", "ogg",
            ],
        }
    }

    /// Whether the file extension belongs to this kind (case-insensitive).
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

/// Identifies a clip within a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipSlot {
    First,
    Second,
    Audio,
}

impl ClipSlot {
    pub const ALL: [ClipSlot; 3] = [ClipSlot::First, ClipSlot::Second, ClipSlot::Audio];

    /// The media kind this slot loads.
    pub fn media_kind(&self) -> MediaKind {
        match self {
            ClipSlot::First | ClipSlot::Second => MediaKind::Movie,
            ClipSlot::Audio => MediaKind::Audio,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClipSlot::First => "first",
            ClipSlot::Second => "second",
            ClipSlot::Audio => "audio",
        }
    }
}

impl fmt::Display for ClipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from reading, writing, or validating model files.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid model: {message}")]
    ValidationError { message: String },
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError {
            message: msg.into(),
        }
    }
}

pub(crate) fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ModelError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ModelError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| ModelError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| ModelError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}
