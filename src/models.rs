//! Модели данных
//!
//! Реплики диалога, распознанные слова, временные метки предложений и
//! сегменты итоговой дорожки.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Сторона говорящего
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Left,
    Right,
}

/// Реплика диалога
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
}

impl DialogueLine {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Распознанное слово с временными метками (секунды)
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Нормализованный текст: только буквы и цифры в нижнем регистре
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Token {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Временной диапазон предложения в исходной записи
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceTimestamp {
    pub sentence_index: usize,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl SentenceTimestamp {
    pub fn new(sentence_index: usize, start: f64, end: f64) -> Self {
        Self {
            sentence_index,
            start,
            end,
            duration: end - start,
        }
    }
}

/// Сегмент на шкале времени итоговой дорожки.
///
/// Шкала итоговой дорожки не совпадает со шкалой исходной записи: в неё
/// добавлены паузы и медленные повторы.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSegment {
    /// Индекс реплики в диалоге
    pub line_index: usize,
    pub line: DialogueLine,
    /// `true` для медленного повтора
    pub is_repeated: bool,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Один диалог: фон, озвучка и реплики. Единица параллельной обработки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub background: PathBuf,
    pub audio: PathBuf,
    pub dialogue: Vec<DialogueLine>,
}

/// Задание на рендеринг итогового видео
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    /// Название видео; из него строится имя выходного файла
    pub title: String,
    /// Каталог для итогового файла
    pub output_dir: PathBuf,
    pub conversations: Vec<Conversation>,
}

impl RenderJob {
    /// Путь к итоговому файлу
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.mp4", sanitize_title(&self.title)))
    }
}

/// Безопасное имя файла из названия видео
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe = kept.trim().replace(' ', "_").to_lowercase();
    if safe.is_empty() {
        "dialogue".to_string()
    } else {
        safe
    }
}
