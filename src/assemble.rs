//! Final-Cut Assembler
//!
//! Concatenates every shot video of the run in (scene, shot) order into one
//! artifact. Assembly happens at most once per run: an existing final cut is
//! never rebuilt, and a missing shot video aborts instead of being skipped.

use crate::error::PipelineError;
use crate::memo::{CacheStatus, Memoizer};
use crate::record::ProductionRecord;
use crate::store::RunLayout;
use crate::types::ArtifactKey;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

/// Joins encoded clips into one encoded video.
#[async_trait]
pub trait Concatenator: Send + Sync {
    async fn concatenate(&self, clips: Vec<Vec<u8>>) -> Result<Vec<u8>, PipelineError>;
}

/// Concatenation through the `ffmpeg` concat demuxer (stream copy, no re-encode).
pub struct FfmpegConcatenator {
    binary: PathBuf,
}

impl Default for FfmpegConcatenator {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegConcatenator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn failed(context: &str, err: impl std::fmt::Display) -> PipelineError {
        PipelineError::AssemblyFailed(format!("{}: {}", context, err))
    }
}

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concatenate(&self, clips: Vec<Vec<u8>>) -> Result<Vec<u8>, PipelineError> {
        let workdir = tempfile::TempDir::new().map_err(|e| Self::failed("temp dir", e))?;
        let list_path = workdir.path().join("clips.txt");

        let mut list = String::new();
        for (i, clip) in clips.iter().enumerate() {
            let clip_path = workdir.path().join(format!("clip_{:05}.mp4", i));
            fs::write(&clip_path, clip)
                .await
                .map_err(|e| Self::failed(&format!("clip {}", i), e))?;
            list.push_str(&format!("file '{}'\n", clip_path.display()));
        }
        fs::write(&list_path, list)
            .await
            .map_err(|e| Self::failed("clip list", e))?;

        let output_path = workdir.path().join("final.mp4");
        let output = Command::new(&self.binary)
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::failed(&format!("failed to run {}", self.binary.display()), e))?;
        if !output.status.success() {
            return Err(PipelineError::AssemblyFailed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        fs::read(&output_path)
            .await
            .map_err(|e| Self::failed("reading output", e))
    }
}

/// Keys of every shot video in (scene index, shot index) order.
pub fn ordered_shot_videos(
    layout: &RunLayout,
    record: &ProductionRecord,
) -> Result<Vec<ArtifactKey>, PipelineError> {
    let mut scenes: Vec<_> = record.scenes.iter().collect();
    scenes.sort_by_key(|scene| scene.index);

    let mut keys = Vec::new();
    for scene in scenes {
        let mut shots: Vec<usize> = scene.shots.iter().map(|shot| shot.index).collect();
        shots.sort_unstable();
        for shot in shots {
            keys.push(layout.video(scene.index, shot)?);
        }
    }
    Ok(keys)
}

/// Produce the run's final cut unless it already exists.
pub async fn assemble(
    memo: &Memoizer,
    layout: &RunLayout,
    record: &ProductionRecord,
    concatenator: &dyn Concatenator,
) -> Result<ArtifactKey, PipelineError> {
    let key = layout.final_cut()?;
    let status = memo
        .blob(&key, || async {
            let videos = ordered_shot_videos(layout, record)?;
            if videos.is_empty() {
                return Err(PipelineError::missing(&key, "run has no shot videos to assemble"));
            }
            let mut clips = Vec::with_capacity(videos.len());
            for video in &videos {
                clips.push(memo.require(video)?);
            }
            info!(run_id = %record.run_id, clips = clips.len(), "concatenating final cut");
            concatenator.concatenate(clips).await
        })
        .await?;
    if status == CacheStatus::Hit {
        debug!(key = %key, "final cut already assembled");
    }
    Ok(key)
}
