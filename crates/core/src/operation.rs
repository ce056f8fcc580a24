//! Operation registry: the closed mapping from abstract request kinds to
//! concrete operation types, and from operation types to output media types.
//!
//! Both mappings are exhaustive matches over closed enums. Adding an
//! operation type means adding a kind string here, a required-field rule
//! in [`crate::canonical`], and provider capability entries — the startup
//! self-check in `fabula-provider` asserts all three stay in lockstep.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Operation types
// ---------------------------------------------------------------------------

/// A provider-independent generation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    TextToImage,
    ImageToImage,
    TextToVideo,
    ImageToVideo,
    VideoExtend,
    VideoTransition,
    Fusion,
}

impl OperationType {
    /// Every member, for exhaustive iteration (self-checks, capability
    /// tables, tests).
    pub const ALL: &'static [OperationType] = &[
        OperationType::TextToImage,
        OperationType::ImageToImage,
        OperationType::TextToVideo,
        OperationType::ImageToVideo,
        OperationType::VideoExtend,
        OperationType::VideoTransition,
        OperationType::Fusion,
    ];

    /// Resolve an abstract request kind to an operation type.
    ///
    /// The match is exhaustive over known kinds and has no default arm
    /// mapping to a fallback type; an unknown kind fails with
    /// [`CoreError::UnmappedOperationKind`].
    pub fn resolve(kind: &str) -> Result<OperationType, CoreError> {
        match kind {
            "text_to_image" => Ok(OperationType::TextToImage),
            "image_to_image" => Ok(OperationType::ImageToImage),
            "text_to_video" => Ok(OperationType::TextToVideo),
            "image_to_video" => Ok(OperationType::ImageToVideo),
            "video_extend" => Ok(OperationType::VideoExtend),
            "video_transition" => Ok(OperationType::VideoTransition),
            "fusion" => Ok(OperationType::Fusion),
            other => Err(CoreError::UnmappedOperationKind(other.to_string())),
        }
    }

    /// The canonical kind string for this operation type.
    pub fn kind(self) -> &'static str {
        match self {
            OperationType::TextToImage => "text_to_image",
            OperationType::ImageToImage => "image_to_image",
            OperationType::TextToVideo => "text_to_video",
            OperationType::ImageToVideo => "image_to_video",
            OperationType::VideoExtend => "video_extend",
            OperationType::VideoTransition => "video_transition",
            OperationType::Fusion => "fusion",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

// ---------------------------------------------------------------------------
// Media types
// ---------------------------------------------------------------------------

/// The kind of media an asset holds.
///
/// Always declared explicitly by the provider adapter from the requested
/// operation type — never inferred from which URL field happens to be
/// populated in a raw provider payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Model,
}

impl MediaType {
    /// The output media type produced by an operation.
    ///
    /// This is the single authority for the mapping. Fusion combines image
    /// references into a motion result, so it yields video.
    pub fn for_operation(op: OperationType) -> MediaType {
        match op {
            OperationType::TextToImage | OperationType::ImageToImage => MediaType::Image,
            OperationType::TextToVideo
            | OperationType::ImageToVideo
            | OperationType::VideoExtend
            | OperationType::VideoTransition
            | OperationType::Fusion => MediaType::Video,
        }
    }

    /// Stable name for logging and serialization.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Model => "model",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
