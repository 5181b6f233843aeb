//! Stable Horde image generation shapes.
//!
//! Submission and polling of image jobs happen elsewhere; these types describe
//! what the horde reports back and what gets stored per generation. The bot
//! itself only links them, so they're kept for the storage and presentation
//! code built on top of it.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// One finished image as the horde reports it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawImageGenerationResult {
    /// URL of the generated image.
    pub img: String,
    /// Seed to reproduce this image.
    pub seed: String,
    pub id: String,
    /// Whether the worker censored the image.
    pub censored: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageGenerationResult {
    pub seed: String,
    /// Temporary URL on the Stable Horde CDN.
    pub url: String,
    pub id: String,
    pub censored: bool,
}
impl From<RawImageGenerationResult> for ImageGenerationResult {
    fn from(raw: RawImageGenerationResult) -> Self {
        Self {
            seed: raw.seed,
            url: raw.img,
            id: raw.id,
            censored: raw.censored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageJobState {
    Queued,
    Processing,
    Done,
    Faulted,
}

/// The lightweight progress report for a running request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageGenerationCheckData {
    pub finished: u32,
    pub processing: u32,
    pub restarted: u32,
    pub waiting: u32,
    /// Whether every image of the request has finished.
    pub done: bool,
    pub faulted: bool,
    /// Approximate seconds left to wait.
    pub wait_time: u64,
    pub queue_position: u32,
    pub is_possible: bool,
    /// Kudos spent on this request.
    pub kudos: f64,
    #[serde(default)]
    pub id: String,
}
impl ImageGenerationCheckData {
    pub fn state(&self) -> ImageJobState {
        if self.faulted {
            ImageJobState::Faulted
        } else if self.done {
            ImageJobState::Done
        } else if self.processing > 0 || self.finished > 0 {
            ImageJobState::Processing
        } else {
            ImageJobState::Queued
        }
    }
}

/// The full status report, including any generated images.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageGenerationStatusData {
    #[serde(flatten)]
    pub check: ImageGenerationCheckData,
    #[serde(default)]
    pub generations: Vec<RawImageGenerationResult>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StableHordeGenerationResult {
    pub id: String,
    pub kudos: f64,
    pub images: Vec<ImageGenerationResult>,
    /// Milliseconds between request and completion.
    pub duration: u64,
    /// Unix timestamps in milliseconds.
    pub requested: u64,
    pub completed: u64,
}
impl StableHordeGenerationResult {
    pub fn new(status: ImageGenerationStatusData, requested: u64, completed: u64) -> Self {
        Self {
            id: status.check.id,
            kudos: status.check.kudos,
            images: status.generations.into_iter().map(Into::into).collect(),
            duration: completed.saturating_sub(requested),
            requested,
            completed,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageGenerationPrompt {
    /// Things to include in the image.
    pub prompt: String,
    /// Things to keep out of the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    /// Name of the filter that was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageGenerationSampler {
    KLms,
    KHeun,
    KEuler,
    KEulerA,
    KDpmFast,
    KDpmAdaptive,
    #[serde(rename = "k_dpmpp_2m")]
    KDpmpp2m,
    KDpmppSde,
}
impl ImageGenerationSampler {
    pub const ALL: [Self; 8] = [
        Self::KLms,
        Self::KHeun,
        Self::KEuler,
        Self::KEulerA,
        Self::KDpmFast,
        Self::KDpmAdaptive,
        Self::KDpmpp2m,
        Self::KDpmppSde,
    ];
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageGenerationParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_skip: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f64>,
    pub height: u32,
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_variation: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hires_fix: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karras: Option<bool>,
    pub n: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing: Option<Vec<String>>,
    pub sampler_name: ImageGenerationSampler,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageGenerationOptions {
    pub nsfw: bool,
    /// Spend the bot's kudos to skip ahead in the queue.
    pub priority: bool,
    /// Share the image with LAION.
    pub shared: bool,
    /// Stable Horde model name.
    pub model: String,
    pub params: ImageGenerationParameters,
    pub source: Option<ImageInput>,
    pub prompt: ImageGenerationPrompt,
}
