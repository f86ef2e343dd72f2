//! Scripted generation service and concatenator shared by the integration tests.
//!
//! The fake answers every task with well-formed JSON derived from the request
//! text, counts calls per task, and can be told to fail, to answer garbage, or
//! to answer well-formed but inconsistent JSON for one kind of call.

use async_trait::async_trait;
use parking_lot::Mutex;
use reelsmith::assemble::Concatenator;
use reelsmith::config::PipelineSettings;
use reelsmith::error::PipelineError;
use reelsmith::executor::PipelineEngine;
use reelsmith::provider::{
    GenerationRequest, GenerationService, GenerationTask, ImageRequest, VideoRequest,
};
use reelsmith::store::ArtifactStore;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

pub const IMAGE: &str = "image";
pub const VIDEO: &str = "video";

/// Duration encoded into every fake clip, plus this much per extra key frame.
pub const CLIP_MS: u64 = 1000;
pub const LAST_FRAME_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct Scenario {
    /// Camera index of every storyboard shot, one list per scene.
    pub scenes: Vec<Vec<usize>>,
    /// Shots (scene, shot) whose variation is "medium".
    pub varied_shots: Vec<(usize, usize)>,
    pub characters: Vec<&'static str>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            scenes: vec![vec![0, 1, 0, 1]],
            varied_shots: vec![(0, 2)],
            characters: vec!["Mara", "Old Tom"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub task: GenerationTask,
    pub text: String,
    pub images: usize,
}

#[derive(Default)]
pub struct FakeService {
    scenario: Scenario,
    calls: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<LoggedRequest>>,
    fail: Mutex<Option<String>>,
    garble: Mutex<Option<String>>,
    inconsistent: Mutex<Option<String>>,
    bad_camera_tree: Mutex<bool>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_scenario(scenario: Scenario) -> Arc<Self> {
        Arc::new(Self {
            scenario,
            ..Self::default()
        })
    }

    pub fn calls(&self, kind: &str) -> usize {
        self.calls.lock().get(kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn requests(&self, task: GenerationTask) -> Vec<LoggedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.task == task)
            .cloned()
            .collect()
    }

    /// Make every call of `kind` fail with a provider error.
    pub fn fail_on(&self, kind: &str) {
        *self.fail.lock() = Some(kind.to_string());
    }

    pub fn recover(&self) {
        *self.fail.lock() = None;
        *self.garble.lock() = None;
        *self.inconsistent.lock() = None;
        *self.bad_camera_tree.lock() = false;
    }

    /// Answer every call of `kind` with text that is not JSON.
    pub fn garble(&self, kind: &str) {
        *self.garble.lock() = Some(kind.to_string());
    }

    /// Answer every call of `kind` with parseable JSON that breaks the task's
    /// rules: an empty script, a storyboard numbered from 1, or a shot naming a
    /// character that was never extracted.
    pub fn answer_inconsistently(&self, kind: &str) {
        *self.inconsistent.lock() = Some(kind.to_string());
    }

    fn is_inconsistent(&self, task: GenerationTask) -> bool {
        self.inconsistent.lock().as_deref() == Some(task.as_str())
    }

    /// Propose a camera that is its own parent.
    pub fn propose_cycle(&self) {
        *self.bad_camera_tree.lock() = true;
    }

    fn count(&self, kind: &str) -> Result<usize, PipelineError> {
        let n = {
            let mut calls = self.calls.lock();
            let entry = calls.entry(kind.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if self.fail.lock().as_deref() == Some(kind) {
            return Err(PipelineError::ProviderError(format!("{kind} backend unavailable")));
        }
        Ok(n)
    }

    fn answer(&self, task: GenerationTask, text: &str, images: usize, n: usize) -> String {
        match task {
            GenerationTask::Story => {
                let mut story = format!("Draft {n}: a lighthouse keeper befriends a storm.");
                if let Some(feedback) = section(text, "FEEDBACK") {
                    story.push_str(&format!(" Revised for: {feedback}."));
                }
                story
            }
            GenerationTask::Characters => {
                let characters: Vec<_> = self
                    .scenario
                    .characters
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        json!({
                            "idx": i,
                            "identifier_in_scene": name,
                            "is_visible": true,
                            "static_features": format!("{name} has a weathered coat"),
                            "dynamic_features": "soaked by rain"
                        })
                    })
                    .collect();
                json!({ "characters": characters }).to_string()
            }
            GenerationTask::Script if self.is_inconsistent(task) => {
                json!({ "script": [] }).to_string()
            }
            GenerationTask::Script => {
                let script: Vec<String> = (0..self.scenario.scenes.len())
                    .map(|i| format!("Scene {i}: the storm arrives."))
                    .collect();
                json!({ "script": script }).to_string()
            }
            GenerationTask::Storyboard => {
                let scene = number_after(text, "Scene ").unwrap_or(0);
                let cameras = self.scenario.scenes.get(scene).cloned().unwrap_or_default();
                let last = cameras.len().saturating_sub(1);
                let storyboard: Vec<_> = cameras
                    .iter()
                    .enumerate()
                    .map(|(i, cam)| {
                        let numbered = if self.is_inconsistent(task) { i + 1 } else { i };
                        json!({
                            "idx": numbered,
                            "is_last": i == last,
                            "cam_idx": cam,
                            "visual_desc": format!("Scene {scene} Shot {i}: waves against the rocks"),
                            "audio_desc": "wind"
                        })
                    })
                    .collect();
                json!({ "storyboard": storyboard }).to_string()
            }
            GenerationTask::ShotDescription => {
                let shot_text = section(text, "SHOT").unwrap_or_default();
                let scene = number_after(&shot_text, "Scene ").unwrap_or(0);
                let shot = number_after(&shot_text, "Shot ").unwrap_or(0);
                let varied = self.scenario.varied_shots.contains(&(scene, shot));
                let last_frame = if varied {
                    format!("scene {scene} shot {shot} ends on the sea")
                } else {
                    String::new()
                };
                let mut visible: Vec<usize> = (0..self.scenario.characters.len()).collect();
                if self.is_inconsistent(task) {
                    visible.push(self.scenario.characters.len());
                }
                json!({
                    "ff_desc": format!("scene {scene} shot {shot} opens on the keeper"),
                    "lf_desc": last_frame,
                    "motion_desc": format!("slow push in on shot {shot}"),
                    "audio_desc": "distant thunder",
                    "variation_type": if varied { "medium" } else { "small" },
                    "ff_vis_char_idxs": visible,
                    "lf_vis_char_idxs": [0]
                })
                .to_string()
            }
            GenerationTask::CameraTree => {
                let cameras = parse_cameras(text);
                let (root, anchor) = cameras.first().cloned().unwrap_or((0, 0));
                let cycle = *self.bad_camera_tree.lock();
                let items: Vec<serde_json::Value> = cameras
                    .iter()
                    .enumerate()
                    .map(|(position, (camera, _))| {
                        if position == 0 {
                            return serde_json::Value::Null;
                        }
                        let parent = if cycle { *camera } else { root };
                        json!({
                            "parent_cam_idx": parent,
                            "parent_shot_idx": anchor,
                            "reason": "same lighthouse interior",
                            "is_parent_fully_covers_child": true,
                            "missing_info": ""
                        })
                    })
                    .collect();
                json!({ "camera_parent_items": items }).to_string()
            }
            GenerationTask::ReferencePreselect => {
                let offered = image_lines(text).len();
                let keep: Vec<usize> = (0..offered.min(8)).collect();
                json!({ "ref_image_indices": keep, "text_prompt": "" }).to_string()
            }
            GenerationTask::ReferenceSelect => {
                let offered = image_lines(text);
                assert_eq!(images, offered.len(), "every offered image is attached");
                let picked = pick_references(&offered);
                let instruction = if picked.is_empty() {
                    "Render the frame.".to_string()
                } else {
                    "Keep Image 0 consistent with the new frame.".to_string()
                };
                json!({ "ref_image_indices": picked, "text_prompt": instruction }).to_string()
            }
        }
    }
}

#[async_trait]
impl GenerationService for FakeService {
    async fn generate_text(&self, request: GenerationRequest) -> Result<String, PipelineError> {
        let kind = request.task.as_str();
        let n = self.count(kind)?;
        let text = request.text_content();
        let images = request.image_count();
        self.requests.lock().push(LoggedRequest {
            task: request.task,
            text: text.clone(),
            images,
        });
        if self.garble.lock().as_deref() == Some(kind) {
            return Ok("I'd rather not answer in JSON today.".to_string());
        }
        Ok(self.answer(request.task, &text, images, n))
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<Vec<u8>, PipelineError> {
        self.count(IMAGE)?;
        Ok(format!("png[{} refs]:{}", request.references.len(), request.prompt).into_bytes())
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<Vec<u8>, PipelineError> {
        self.count(VIDEO)?;
        let extra = request.frames.len().saturating_sub(1) as u64;
        Ok(format!("clip:{}", CLIP_MS + extra * LAST_FRAME_MS).into_bytes())
    }

    fn provider_name(&self) -> &str {
        "fake"
    }
}

/// Sums the durations of fake clips.
#[derive(Default)]
pub struct FakeConcatenator {
    calls: Mutex<Vec<usize>>,
}

impl FakeConcatenator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clip_counts(&self) -> Vec<usize> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Concatenator for FakeConcatenator {
    async fn concatenate(&self, clips: Vec<Vec<u8>>) -> Result<Vec<u8>, PipelineError> {
        self.calls.lock().push(clips.len());
        let mut total = 0u64;
        for clip in &clips {
            total += clip_duration(clip)
                .ok_or_else(|| PipelineError::AssemblyFailed("not a fake clip".to_string()))?;
        }
        Ok(format!("cut:{total}").into_bytes())
    }
}

pub fn clip_duration(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.strip_prefix("clip:")?.parse().ok()
}

pub fn cut_duration(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.strip_prefix("cut:")?.parse().ok()
}

pub fn engine(
    service: &Arc<FakeService>,
    store: Arc<dyn ArtifactStore>,
    concatenator: &Arc<FakeConcatenator>,
    auto_approve: bool,
) -> PipelineEngine {
    PipelineEngine::new(
        service.clone(),
        store,
        concatenator.clone(),
        PipelineSettings {
            auto_approve,
            ..PipelineSettings::default()
        },
    )
}

/// Text between `<TAG>` and `</TAG>`.
fn section(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

fn number_after(text: &str, marker: &str) -> Option<usize> {
    let at = text.find(marker)? + marker.len();
    let digits: String = text[at..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// `(camera, first shot)` in the order cameras are listed.
fn parse_cameras(text: &str) -> Vec<(usize, usize)> {
    let mut cameras: Vec<(usize, usize)> = Vec::new();
    let mut pending: Option<usize> = None;
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Camera ") {
            pending = number_after(rest, "");
        } else if let (Some(camera), Some(shot)) = (pending, number_after(line, "Shot ")) {
            cameras.push((camera, shot));
            pending = None;
        }
    }
    cameras
}

/// `Image N: description` lines, in offer order.
fn image_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("Image ")?;
            let (_, description) = rest.split_once(": ")?;
            Some(description.to_string())
        })
        .collect()
}

/// Earlier frames first, then one portrait per character, at most three.
fn pick_references(offered: &[String]) -> Vec<usize> {
    let mut picked: Vec<usize> = offered
        .iter()
        .enumerate()
        .filter(|(_, d)| d.starts_with("[Camera"))
        .map(|(i, _)| i)
        .collect();
    let mut seen: Vec<String> = Vec::new();
    for (i, description) in offered.iter().enumerate() {
        if let Some(rest) = description.split(" portrait of ").nth(1) {
            let who = rest.trim_end_matches('.').to_string();
            if !seen.contains(&who) {
                seen.push(who);
                picked.push(i);
            }
        }
    }
    picked.truncate(3);
    picked
}
