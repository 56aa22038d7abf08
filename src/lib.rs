//! Основной файл библиотеки dialogue-video
//!
//! Библиотека собирает обучающее видео из озвученных диалогов: реплики
//! выравниваются по аудио, каждая проигрывается дважды (второй раз медленнее),
//! а на фоне показывается пузырь с текстом говорящего.

pub mod alignment;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod utils;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use crate::alignment::{SharedAligner, WhisperAligner, WordAligner};
use crate::config::RenderConfig;
use crate::error::{DialogueVideoError, Result};
use crate::media::{FfmpegTempoStretcher, TimeStretcher};
use crate::models::RenderJob;
use crate::pipeline::ConversationRenderer;
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::render::{FfmpegEncoder, VideoEncoder};
use crate::utils::ffmpeg::check_tool_installed;

pub use crate::models::{Conversation, DialogueLine, Speaker};

/// Основная структура для работы с библиотекой
#[derive(Clone)]
pub struct DialogueVideo {
    config: RenderConfig,
    aligner: SharedAligner,
    stretcher: Arc<dyn TimeStretcher>,
    encoder: Arc<dyn VideoEncoder>,
    progress: Arc<ProgressTracker>,
}

impl DialogueVideo {
    /// Создать экземпляр с Whisper и FFmpeg согласно конфигурации
    pub fn new(config: RenderConfig) -> Self {
        let aligner = Box::new(WhisperAligner::new(config.alignment.clone()));
        let stretcher = Arc::new(FfmpegTempoStretcher::new(
            config.encoder.ffmpeg_program.clone(),
        ));
        let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
        Self::with_components(config, aligner, stretcher, encoder)
    }

    /// Создать экземпляр с собственными реализациями внешних движков
    pub fn with_components(
        config: RenderConfig,
        aligner: Box<dyn WordAligner>,
        stretcher: Arc<dyn TimeStretcher>,
        encoder: Arc<dyn VideoEncoder>,
    ) -> Self {
        Self {
            config,
            aligner: SharedAligner::new(aligner),
            stretcher,
            encoder,
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        self.progress.add_observer(observer)
    }

    /// Проверить, что FFmpeg и Whisper доступны в PATH
    pub fn check_tools(&self) -> Result<()> {
        for program in [
            &self.config.encoder.ffmpeg_program,
            &self.config.alignment.whisper_program,
        ] {
            let path = check_tool_installed(program)?;
            log::debug!("Found {} at {}", program, path.display());
        }
        Ok(())
    }

    /// Отрендерить задание в текущем потоке
    pub fn render_blocking(&self, job: &RenderJob) -> Result<PathBuf> {
        self.config.validate()?;
        let renderer = ConversationRenderer {
            config: &self.config,
            aligner: &self.aligner,
            stretcher: self.stretcher.as_ref(),
            encoder: self.encoder.as_ref(),
            progress: &self.progress,
        };
        renderer.render_job(job, self.config.worker_count())
    }

    /// Отрендерить задание, не блокируя асинхронный рантайм
    pub async fn render(&self, job: RenderJob) -> Result<PathBuf> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.render_blocking(&job))
            .await
            .map_err(|e| DialogueVideoError::Other(format!("Render task failed: {}", e)))?
    }
}

/// Отрендерить видео с настройками по умолчанию
pub async fn render_dialogue_video(job: RenderJob) -> Result<PathBuf> {
    render_dialogue_video_with_config(job, RenderConfig::default()).await
}

/// Отрендерить видео с указанной конфигурацией
pub async fn render_dialogue_video_with_config(
    job: RenderJob,
    config: RenderConfig,
) -> Result<PathBuf> {
    let engine = DialogueVideo::new(config);
    engine.check_tools()?;
    engine.render(job).await
}
