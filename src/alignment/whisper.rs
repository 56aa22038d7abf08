//! Адаптер к консольной утилите Whisper
//!
//! Whisper запускается с пословными временными метками и пишет JSON в
//! отдельный временный каталог; из JSON берутся только слова.

use std::ffi::OsString;
use std::path::Path;

use serde::Deserialize;

use crate::alignment::{normalize_token, WordAligner};
use crate::config::AlignmentConfig;
use crate::error::{DialogueVideoError, Result};
use crate::models::Token;
use crate::utils::ffmpeg::{ensure_output, run_process};

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

/// Распознавание через `whisper --word_timestamps True`
///
/// Адаптер не хранит состояния между вызовами: каждый [`WordAligner::align`]
/// запускает отдельный процесс, который заново загружает модель
/// `config.model`. Загрузка занимает заметное время, поэтому на задание
/// создаётся один экземпляр, а вызовы к нему сериализуются через
/// [`SharedAligner`](crate::alignment::SharedAligner).
pub struct WhisperAligner {
    config: AlignmentConfig,
}

impl WhisperAligner {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, audio_path: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            audio_path.as_os_str().to_owned(),
            "--model".into(),
            self.config.model.clone().into(),
            "--word_timestamps".into(),
            "True".into(),
            "--output_format".into(),
            "json".into(),
            "--output_dir".into(),
            output_dir.as_os_str().to_owned(),
            "--verbose".into(),
            "False".into(),
        ];
        if let Some(language) = &self.config.language {
            args.push("--language".into());
            args.push(language.clone().into());
        }
        args
    }
}

impl WordAligner for WhisperAligner {
    fn name(&self) -> &str {
        "whisper"
    }

    fn align(&self, audio_path: &Path) -> Result<Vec<Token>> {
        let output_dir = tempfile::tempdir()?;
        run_process(
            &self.config.whisper_program,
            self.build_args(audio_path, output_dir.path()),
        )?;

        let stem = audio_path.file_stem().ok_or_else(|| {
            DialogueVideoError::Alignment(format!("Invalid audio path: {}", audio_path.display()))
        })?;
        let json_path = output_dir
            .path()
            .join(format!("{}.json", stem.to_string_lossy()));
        ensure_output(&json_path)?;

        let raw = std::fs::read_to_string(&json_path)?;
        let tokens = parse_whisper_json(&raw)?;
        log::info!(
            "Whisper recognized {} words in {}",
            tokens.len(),
            audio_path.display()
        );
        Ok(tokens)
    }
}

/// Извлечь нормализованные слова из JSON вывода Whisper
pub fn parse_whisper_json(raw: &str) -> Result<Vec<Token>> {
    let output: WhisperOutput = serde_json::from_str(raw)?;
    Ok(output
        .segments
        .into_iter()
        .flat_map(|segment| segment.words)
        .filter_map(|word| {
            let text = normalize_token(&word.word);
            if text.is_empty() {
                None
            } else {
                Some(Token::new(text, word.start, word.end))
            }
        })
        .collect())
}
