//! Модуль выравнивания текста диалога по аудио
//!
//! Адаптер распознавания возвращает слова с временными метками, после чего
//! известные предложения сопоставляются с этим потоком слов и временные
//! диапазоны приводятся к непересекающейся последовательности.

pub mod normalizer;
pub mod sentence;
pub mod whisper;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::models::Token;
use crate::utils::retry::{retry, BackoffPolicy};

pub use normalizer::SentenceTimeline;
pub use sentence::align_sentences;
pub use whisper::WhisperAligner;

/// Движок распознавания слов с временными метками.
///
/// Реализации не обязаны быть реентерабельными: доступ к ним всегда идёт
/// через [`SharedAligner`].
pub trait WordAligner: Send {
    /// Название движка для логов
    fn name(&self) -> &str;

    /// Распознать слова в аудиофайле
    fn align(&self, audio_path: &Path) -> Result<Vec<Token>>;
}

/// Общий для всех задач экземпляр движка, доступный только под блокировкой
#[derive(Clone)]
pub struct SharedAligner {
    inner: Arc<Mutex<Box<dyn WordAligner>>>,
}

impl SharedAligner {
    pub fn new(aligner: Box<dyn WordAligner>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(aligner)),
        }
    }

    /// Распознать слова, удерживая блокировку на всё время вызова (включая повторы)
    pub fn align(&self, audio_path: &Path, policy: &BackoffPolicy) -> Result<Vec<Token>> {
        let aligner = self.inner.lock();
        log::debug!(
            "Acquired {} aligner for {}",
            aligner.name(),
            audio_path.display()
        );
        retry(policy, "word alignment", |_| aligner.align(audio_path))
    }
}

/// Нормализация распознанного слова: только буквы и цифры в нижнем регистре
pub fn normalize_token(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Разбиение предложения на нормализованные слова
pub fn sentence_words(sentence: &str) -> Vec<String> {
    let cleaned: String = sentence
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}
