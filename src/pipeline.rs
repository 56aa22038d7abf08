//! Рендеринг диалогов и сборка итогового видео
//!
//! Каждый диалог обрабатывается отдельной задачей в пуле rayon:
//! выравнивание (под общей блокировкой движка), сборка дорожки, отрисовка
//! кадров и кодирование клипа. Результаты собираются по индексам и только
//! затем склеиваются.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::alignment::{align_sentences, SharedAligner};
use crate::config::RenderConfig;
use crate::error::{DialogueVideoError, Result};
use crate::media::{build_playback_timeline, AudioClip, TimeStretcher};
use crate::models::{Conversation, RenderJob};
use crate::progress::{ProgressTracker, RenderStep};
use crate::render::{build_concat_script, concatenate_clips, FrameCompositor, VideoEncoder};
use crate::utils::ffmpeg::ensure_output;
use crate::utils::retry::retry;
use crate::utils::temp::TaskWorkspace;

/// Префикс общего рабочего каталога задания внутри каталога вывода
const SCRATCH_PREFIX: &str = ".dialogue-video-";

/// Всё, что нужно задаче рендеринга одного диалога
pub struct ConversationRenderer<'a> {
    pub config: &'a RenderConfig,
    pub aligner: &'a SharedAligner,
    pub stretcher: &'a dyn TimeStretcher,
    pub encoder: &'a dyn VideoEncoder,
    pub progress: &'a ProgressTracker,
}

impl ConversationRenderer<'_> {
    /// Отрендерить клип диалога `index` в каталог `scratch`
    pub fn render_conversation(
        &self,
        index: usize,
        conversation: &Conversation,
        scratch: &Path,
    ) -> Result<PathBuf> {
        for path in [&conversation.audio, &conversation.background] {
            if !path.is_file() {
                return Err(DialogueVideoError::FileNotFound(path.clone()));
            }
        }

        let config = self.config;
        let workspace = TaskWorkspace::new_in(scratch, &format!("conversation_{:03}", index))?;
        log::info!(
            "Rendering conversation {} ({} lines)",
            index + 1,
            conversation.dialogue.len()
        );

        // 1. Выравнивание
        self.progress.set_step(index, RenderStep::Aligning);
        let source = AudioClip::read_wav(&conversation.audio)?;
        let tokens = self.aligner.align(&conversation.audio, &config.retry)?;
        let sentences: Vec<&str> = conversation
            .dialogue
            .iter()
            .map(|line| line.text.as_str())
            .collect();
        let timeline = align_sentences(&sentences, &tokens, &config.timing).normalized(&config.timing);

        // 2. Дорожка с повторами
        self.progress.set_step(index, RenderStep::BuildingTrack);
        let playback = build_playback_timeline(
            &conversation.dialogue,
            &timeline,
            &source,
            self.stretcher,
            &workspace,
            &config.timing,
            &config.retry,
        )?;

        // 3. Кадры
        self.progress.set_step(index, RenderStep::RenderingFrames);
        let compositor = FrameCompositor::load(&conversation.background, &config.bubble)?;
        let background = workspace.file_path("background", "png");
        compositor.save_background(&background)?;
        let script = build_concat_script(
            &playback.segments,
            playback.total_duration,
            &background,
            |position, segment| {
                let frame = workspace.file_path(&format!("frame_{:03}", position), "png");
                compositor.save_frame(segment, &frame)?;
                Ok(frame)
            },
        )?;
        let script_path = workspace.file_path("stills", "txt");
        script.write_to(&script_path)?;

        // 4. Кодирование
        self.progress.set_step(index, RenderStep::Encoding);
        let clip = scratch.join(format!("conversation_{:03}.mp4", index));
        retry(&config.retry, "clip encoding", |_| {
            self.encoder
                .encode_stills(&script_path, &playback.audio_path, &clip)?;
            ensure_output(&clip)
        })?;

        workspace.close()?;
        self.progress.set_step(index, RenderStep::Done);
        log::info!(
            "Conversation {} rendered: {:.2}s",
            index + 1,
            playback.total_duration
        );
        Ok(clip)
    }

    /// Отрендерить все диалоги задания и склеить их в итоговый файл
    pub fn render_job(&self, job: &RenderJob, workers: usize) -> Result<PathBuf> {
        if job.conversations.is_empty() {
            return Err(DialogueVideoError::Configuration(
                "Render job has no conversations".to_string(),
            ));
        }

        std::fs::create_dir_all(&job.output_dir)?;
        // Пути в списках concat должны быть абсолютными
        let output_dir = job.output_dir.canonicalize()?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&output_dir)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .map_err(|e| DialogueVideoError::Other(format!("Failed to start worker pool: {}", e)))?;

        log::info!(
            "Rendering {} conversation(s) on {} worker(s)",
            job.conversations.len(),
            workers.max(1)
        );
        self.progress.start(job.conversations.len());

        let results: Vec<Result<PathBuf>> = pool.install(|| {
            job.conversations
                .par_iter()
                .enumerate()
                .map(|(index, conversation)| {
                    let result = self.render_conversation(index, conversation, scratch.path());
                    if let Err(e) = &result {
                        log::error!("Conversation {} failed: {}", index + 1, e);
                        self.progress.fail(index, e.to_string());
                    }
                    result
                })
                .collect()
        });

        let output = output_dir.join(
            job.output_path()
                .file_name()
                .ok_or_else(|| DialogueVideoError::Configuration("Invalid output name".to_string()))?,
        );
        let output = concatenate_clips(
            results,
            scratch.path(),
            &output,
            self.encoder,
            &self.config.retry,
        )?;

        scratch.close()?;
        self.progress.complete(output.display().to_string());
        log::info!("Dialogue video written to {}", output.display());
        Ok(output)
    }
}
