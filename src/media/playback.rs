//! Построение итоговой дорожки с повторами
//!
//! Для каждой реплики: обычное воспроизведение, пауза, медленный повтор,
//! пауза. В конце добавляется короткая тишина. Сегменты строятся по курсору
//! на новой шкале времени, и именно они управляют рендерингом кадров.

use std::path::PathBuf;

use crate::alignment::SentenceTimeline;
use crate::config::TimingConfig;
use crate::error::{DialogueVideoError, Result};
use crate::media::audio::{AudioClip, TimeStretcher};
use crate::models::{DialogueLine, PlaybackSegment};
use crate::utils::ffmpeg::ensure_output;
use crate::utils::retry::{retry, BackoffPolicy};
use crate::utils::temp::TaskWorkspace;

/// Итоговая дорожка и её сегменты
#[derive(Debug, Clone)]
pub struct PlaybackTimeline {
    pub segments: Vec<PlaybackSegment>,
    /// WAV файл итоговой дорожки
    pub audio_path: PathBuf,
    /// Длительность итоговой дорожки, измеренная по семплам
    pub total_duration: f64,
    /// Суммарная длительность вставленной тишины
    pub silence_duration: f64,
}

/// Собрать итоговую дорожку из нормализованных меток предложений
pub fn build_playback_timeline(
    dialogue: &[DialogueLine],
    timeline: &SentenceTimeline,
    source: &AudioClip,
    stretcher: &dyn TimeStretcher,
    workspace: &TaskWorkspace,
    timing: &TimingConfig,
    policy: &BackoffPolicy,
) -> Result<PlaybackTimeline> {
    if timeline.entries().len() != dialogue.len() {
        return Err(DialogueVideoError::AudioProcessing(format!(
            "Timeline has {} entries for {} dialogue lines",
            timeline.entries().len(),
            dialogue.len()
        )));
    }

    let rate = source.sample_rate;
    let channels = source.channels;
    let pause_normal = AudioClip::silence(timing.pause_after_normal, rate, channels);
    let pause_slow = AudioClip::silence(timing.pause_after_slow, rate, channels);
    let trailing = AudioClip::silence(timing.trailing_silence, rate, channels);

    let mut track = AudioClip::empty(rate, channels);
    let mut segments = Vec::with_capacity(dialogue.len() * 2);
    let mut cursor = 0.0;
    let mut silence_duration = 0.0;

    for (index, (line, stamp)) in dialogue.iter().zip(timeline.entries()).enumerate() {
        let end = if stamp.end <= stamp.start {
            stamp.start + timing.missing_sentence_slot
        } else {
            stamp.end
        };
        let normal = source.slice(stamp.start, end);
        if normal.frames() == 0 {
            log::warn!(
                "Sentence {} ({:.3}-{:.3}s) is outside of the recording",
                index,
                stamp.start,
                end
            );
        }

        let normal_duration = normal.duration();
        segments.push(segment(index, line, false, cursor, normal_duration));
        track.append(&normal)?;
        cursor += normal_duration;

        track.append(&pause_normal)?;
        cursor += pause_normal.duration();
        silence_duration += pause_normal.duration();

        let slow = stretch_clip(&normal, index, stretcher, workspace, timing.slow_ratio, policy)?;
        let slow_duration = slow.duration();
        segments.push(segment(index, line, true, cursor, slow_duration));
        track.append(&slow)?;
        cursor += slow_duration;

        track.append(&pause_slow)?;
        cursor += pause_slow.duration();
        silence_duration += pause_slow.duration();
    }

    track.append(&trailing)?;
    silence_duration += trailing.duration();

    let audio_path = workspace.file_path("composite", "wav");
    track.write_wav(&audio_path)?;

    let total_duration = track.duration();
    log::debug!(
        "Composite track: {} segments, {:.3}s ({:.3}s cursor)",
        segments.len(),
        total_duration,
        cursor + trailing.duration()
    );

    Ok(PlaybackTimeline {
        segments,
        audio_path,
        total_duration,
        silence_duration,
    })
}

fn segment(
    line_index: usize,
    line: &DialogueLine,
    is_repeated: bool,
    start: f64,
    duration: f64,
) -> PlaybackSegment {
    PlaybackSegment {
        line_index,
        line: line.clone(),
        is_repeated,
        start,
        end: start + duration,
        duration,
    }
}

/// Замедлить клип внешним процессом; длительность берётся из реального результата
fn stretch_clip(
    clip: &AudioClip,
    index: usize,
    stretcher: &dyn TimeStretcher,
    workspace: &TaskWorkspace,
    ratio: f64,
    policy: &BackoffPolicy,
) -> Result<AudioClip> {
    if clip.frames() == 0 {
        return Ok(clip.clone());
    }

    let input = workspace.file_path(&format!("stretch_in_{}", index), "wav");
    let output = workspace.file_path(&format!("stretch_out_{}", index), "wav");
    clip.write_wav(&input)?;

    retry(policy, "time-stretch", |_| {
        stretcher.stretch(&input, ratio, &output)?;
        ensure_output(&output)
    })?;

    let stretched = AudioClip::read_wav(&output)?.conform(clip.sample_rate, clip.channels)?;

    for path in [&input, &output] {
        if let Err(e) = std::fs::remove_file(path) {
            log::debug!("Failed to remove {}: {}", path.display(), e);
        }
    }

    Ok(stretched)
}
