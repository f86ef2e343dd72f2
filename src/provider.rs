//! Generation Service
//!
//! The narrow interface every stage uses to reach a generative model. Text calls
//! carry a task tag naming the response schema the caller will parse; image and
//! video calls take reference media as raw bytes.

use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod http;
pub mod structured;

pub use http::HttpGenerationService;
pub use structured::parse_structured;

/// Which declared response a text request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    Story,
    Characters,
    Script,
    Storyboard,
    ShotDescription,
    CameraTree,
    ReferencePreselect,
    ReferenceSelect,
}

impl GenerationTask {
    /// Everything but free-form story prose is answered as JSON.
    pub fn is_structured(&self) -> bool {
        !matches!(self, GenerationTask::Story)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationTask::Story => "story",
            GenerationTask::Characters => "characters",
            GenerationTask::Script => "script",
            GenerationTask::Storyboard => "storyboard",
            GenerationTask::ShotDescription => "shot_description",
            GenerationTask::CameraTree => "camera_tree",
            GenerationTask::ReferencePreselect => "reference_preselect",
            GenerationTask::ReferenceSelect => "reference_select",
        }
    }
}

/// One piece of a (possibly multimodal) user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub task: GenerationTask,
    pub system: String,
    pub content: Vec<ContentPart>,
}

impl GenerationRequest {
    pub fn new(task: GenerationTask, system: impl Into<String>) -> Self {
        Self {
            task,
            system: system.into(),
            content: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ContentPart::Text(text.into()));
        self
    }

    pub fn image(mut self, bytes: Vec<u8>) -> Self {
        self.content.push(ContentPart::Image(bytes));
        self
    }

    /// All text parts joined, handy for logging and fakes.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.content
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count()
    }
}

/// Text-to-image, or image-to-image when `references` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub references: Vec<Vec<u8>>,
}

/// Image-to-video from a first frame and an optional last frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub prompt: String,
    pub frames: Vec<Vec<u8>>,
}

/// Generation service interface
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Text or structured (JSON) completion; returns the raw response text.
    async fn generate_text(&self, request: GenerationRequest) -> Result<String, PipelineError>;

    /// Encoded image bytes.
    async fn generate_image(&self, request: ImageRequest) -> Result<Vec<u8>, PipelineError>;

    /// Encoded video bytes.
    async fn generate_video(&self, request: VideoRequest) -> Result<Vec<u8>, PipelineError>;

    fn provider_name(&self) -> &str;
}
