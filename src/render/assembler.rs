//! Сборка клипа диалога из статичных кадров
//!
//! Сегменты дорожки превращаются в файл инструкций concat-демультиплексора
//! FFmpeg: каждый кадр удерживается на экране заданное время, промежутки
//! между сегментами заполняются чистым фоном.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::EncoderConfig;
use crate::error::{DialogueVideoError, Result};
use crate::models::PlaybackSegment;
use crate::utils::ffmpeg::{concat_quote, run_ffmpeg};

/// Минимальное время показа кадра с репликой
pub const MIN_STILL_HOLD: f64 = 0.1;

/// Минимальное время показа фона в промежутке
const MIN_GAP_HOLD: f64 = 0.001;

/// Кадр и время его показа
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatInstruction {
    pub image: PathBuf,
    /// Время показа в секундах
    pub hold: f64,
}

/// Упорядоченный список кадров для concat-демультиплексора
#[derive(Debug, Clone, Default)]
pub struct ConcatScript {
    instructions: Vec<ConcatInstruction>,
}

impl ConcatScript {
    pub fn instructions(&self) -> &[ConcatInstruction] {
        &self.instructions
    }

    /// Суммарное время показа всех кадров
    pub fn total_duration(&self) -> f64 {
        self.instructions.iter().map(|i| i.hold).sum()
    }

    /// Текст файла инструкций.
    ///
    /// Последний кадр указывается повторно без длительности, иначе
    /// демультиплексор игнорирует его `duration`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for instruction in &self.instructions {
            let _ = writeln!(out, "file {}", concat_quote(&instruction.image));
            let _ = writeln!(out, "duration {:.3}", instruction.hold);
        }
        if let Some(last) = self.instructions.last() {
            let _ = writeln!(out, "file {}", concat_quote(&last.image));
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }

    fn push(&mut self, image: &Path, hold: f64) {
        self.instructions.push(ConcatInstruction {
            image: image.to_path_buf(),
            hold,
        });
    }
}

/// Построить инструкции по сегментам итоговой дорожки.
///
/// `frame_for` отрисовывает кадр сегмента и возвращает путь к нему.
/// Промежутки до сегментов и хвост до `total_duration` заполняются `background`.
pub fn build_concat_script<F>(
    segments: &[PlaybackSegment],
    total_duration: f64,
    background: &Path,
    mut frame_for: F,
) -> Result<ConcatScript>
where
    F: FnMut(usize, &PlaybackSegment) -> Result<PathBuf>,
{
    let mut script = ConcatScript::default();
    let mut cursor = 0.0;

    for (position, segment) in segments.iter().enumerate() {
        if segment.start > cursor {
            script.push(background, (segment.start - cursor).max(MIN_GAP_HOLD));
        }
        let frame = frame_for(position, segment)?;
        script.push(&frame, (segment.end - segment.start).max(MIN_STILL_HOLD));
        cursor = segment.end;
    }

    if cursor < total_duration - MIN_GAP_HOLD {
        script.push(background, (total_duration - cursor).max(MIN_GAP_HOLD));
    }

    if script.instructions.is_empty() {
        return Err(DialogueVideoError::Rendering(
            "Nothing to render: no segments and no audio".to_string(),
        ));
    }
    Ok(script)
}

/// Кодирование клипов внешним энкодером
pub trait VideoEncoder: Send + Sync {
    /// Собрать клип из файла инструкций и итоговой дорожки
    fn encode_stills(&self, script: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Склеить клипы из списка без перекодирования
    fn concat_clips(&self, list: &Path, output: &Path) -> Result<()>;
}

/// Кодирование через FFmpeg
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    fn stills_args(&self, script: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        let c = &self.config;
        vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            script.as_os_str().to_owned(),
            "-i".into(),
            audio.as_os_str().to_owned(),
            "-c:v".into(),
            c.video_codec.clone().into(),
            "-preset".into(),
            c.preset.clone().into(),
            "-pix_fmt".into(),
            c.pixel_format.clone().into(),
            "-c:a".into(),
            c.audio_codec.clone().into(),
            "-b:a".into(),
            c.audio_bitrate.clone().into(),
            "-shortest".into(),
            output.as_os_str().to_owned(),
        ]
    }

    fn concat_args(list: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list.as_os_str().to_owned(),
            "-c".into(),
            "copy".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode_stills(&self, script: &Path, audio: &Path, output: &Path) -> Result<()> {
        run_ffmpeg(
            &self.config.ffmpeg_program,
            self.stills_args(script, audio, output),
            output,
        )?;
        Ok(())
    }

    fn concat_clips(&self, list: &Path, output: &Path) -> Result<()> {
        run_ffmpeg(
            &self.config.ffmpeg_program,
            Self::concat_args(list, output),
            output,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DialogueLine, Speaker};

    fn segment(index: usize, is_repeated: bool, start: f64, end: f64) -> PlaybackSegment {
        PlaybackSegment {
            line_index: index,
            line: DialogueLine::new(Speaker::Left, "Hallo"),
            is_repeated,
            start,
            end,
            duration: end - start,
        }
    }

    fn frames(_: usize, s: &PlaybackSegment) -> Result<PathBuf> {
        Ok(PathBuf::from(format!(
            "/tmp/frame_{}_{}.png",
            s.line_index, s.is_repeated as u8
        )))
    }

    #[test]
    fn gaps_and_tail_are_filled_with_background() {
        let segments = vec![segment(0, false, 0.0, 1.0), segment(0, true, 2.0, 3.5)];
        let script =
            build_concat_script(&segments, 6.0, Path::new("/tmp/bg.png"), frames).unwrap();

        let images: Vec<&str> = script
            .instructions()
            .iter()
            .map(|i| i.image.to_str().unwrap())
            .collect();
        assert_eq!(
            images,
            vec![
                "/tmp/frame_0_0.png",
                "/tmp/bg.png",
                "/tmp/frame_0_1.png",
                "/tmp/bg.png"
            ]
        );
        let holds: Vec<f64> = script.instructions().iter().map(|i| i.hold).collect();
        assert_eq!(holds, vec![1.0, 1.0, 1.5, 2.5]);
        assert!((script.total_duration() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn short_segments_are_held_for_minimum_time() {
        let segments = vec![segment(0, false, 0.0, 0.02)];
        let script =
            build_concat_script(&segments, 0.02, Path::new("/tmp/bg.png"), frames).unwrap();
        assert_eq!(script.instructions().len(), 1);
        assert_eq!(script.instructions()[0].hold, MIN_STILL_HOLD);
    }

    #[test]
    fn rendered_script_repeats_last_image() {
        let segments = vec![segment(1, false, 0.5, 1.25)];
        let script =
            build_concat_script(&segments, 1.25, Path::new("/tmp/bg.png"), frames).unwrap();
        assert_eq!(
            script.render(),
            "file '/tmp/bg.png'\nduration 0.500\n\
             file '/tmp/frame_1_0.png'\nduration 0.750\n\
             file '/tmp/frame_1_0.png'\n"
        );
    }

    #[test]
    fn frame_errors_abort_the_script() {
        let segments = vec![segment(0, false, 0.0, 1.0)];
        let result = build_concat_script(&segments, 1.0, Path::new("/tmp/bg.png"), |_, _| {
            Err(DialogueVideoError::Rendering("disk full".to_string()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(build_concat_script(&[], 0.0, Path::new("/tmp/bg.png"), frames).is_err());
    }

    #[test]
    fn encoder_arguments_follow_config() {
        let encoder = FfmpegEncoder::new(EncoderConfig::default());
        let args: Vec<String> = encoder
            .stills_args(Path::new("s.txt"), Path::new("a.wav"), Path::new("o.mp4"))
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(&args[..7], ["-y", "-f", "concat", "-safe", "0", "-i", "s.txt"]);
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "192k"));
        assert_eq!(args[args.len() - 2], "-shortest");

        let args = FfmpegEncoder::concat_args(Path::new("l.txt"), Path::new("out.mp4"));
        assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
    }
}
