//! Модуль обработки ошибок библиотеки dialogue-video
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при рендеринге диалогов.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Ошибки библиотеки dialogue-video
#[derive(Debug, Error)]
pub enum DialogueVideoError {
    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка чтения или записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка декодирования или сохранения изображения
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Ошибка выравнивания слов
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка рендеринга кадров
    #[error("Rendering error: {0}")]
    Rendering(String),

    /// Внешний процесс завершился с ненулевым кодом
    #[error("{program} exited with {status}: {stderr}")]
    Process {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Внешний процесс не создал ожидаемый файл
    #[error("Expected output is missing or empty: {}", .0.display())]
    MissingOutput(PathBuf),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Файл не найден
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Один или несколько диалогов не удалось отрендерить
    #[error("{} conversation(s) failed: {}", .0.len(), FailureList(.0))]
    ConversationsFailed(Vec<ConversationFailure>),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

/// Описание упавшей задачи рендеринга диалога
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationFailure {
    /// Индекс диалога в исходном порядке
    pub index: usize,
    /// Причина ошибки
    pub reason: String,
}

impl fmt::Display for ConversationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conversation {}: {}", self.index + 1, self.reason)
    }
}

struct FailureList<'a>(&'a [ConversationFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

/// Тип Result для библиотеки dialogue-video
pub type Result<T> = std::result::Result<T, DialogueVideoError>;
