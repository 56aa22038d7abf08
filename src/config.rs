//! Модуль конфигурации библиотеки dialogue-video
//!
//! Этот модуль содержит структуры для настройки выравнивания, таймингов,
//! отрисовки пузырей и вызова кодировщика.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DialogueVideoError, Result};
use crate::utils::retry::BackoffPolicy;

/// Настройки адаптера распознавания слов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Исполняемый файл Whisper
    pub whisper_program: String,
    /// Модель Whisper
    pub model: String,
    /// Язык речи (None - автоопределение)
    pub language: Option<String>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            whisper_program: "whisper".to_string(),
            model: "base".to_string(),
            language: None,
        }
    }
}

/// Временные константы выравнивания и построения дорожки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Максимальное расширение границы в паузу между предложениями (секунды)
    pub boundary_padding: f64,
    /// Минимальная длительность предложения и кадра (секунды)
    pub min_duration: f64,
    /// Длительность слота, если распознавание не дало ни одного слова
    pub placeholder_slot: f64,
    /// Длительность слота для предложения без слов
    pub missing_sentence_slot: f64,
    /// Коэффициент скорости медленного повтора
    pub slow_ratio: f64,
    /// Пауза после обычного воспроизведения
    pub pause_after_normal: f64,
    /// Пауза после медленного повтора
    pub pause_after_slow: f64,
    /// Тишина в конце дорожки
    pub trailing_silence: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            boundary_padding: 0.1,
            min_duration: 0.1,
            placeholder_slot: 2.0,
            missing_sentence_slot: 1.0,
            slow_ratio: 0.70,
            pause_after_normal: 1.0,
            pause_after_slow: 2.0,
            trailing_silence: 0.5,
        }
    }
}

/// Оформление пузыря с репликой
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleStyle {
    /// Шрифты в порядке приоритета
    pub font_paths: Vec<PathBuf>,
    pub font_size: f32,
    /// Ширина переноса текста в символах
    pub wrap_width: usize,
    pub padding: u32,
    pub corner_radius: u32,
    /// Горизонтальный отступ от края кадра
    pub side_margin: u32,
    pub fill: [u8; 4],
    pub repeated_fill: [u8; 4],
    pub text_color: [u8; 4],
    /// Картинка-маркер повтора (если нет - рисуется значок)
    pub marker_path: Option<PathBuf>,
    pub marker_size: u32,
}

impl Default for BubbleStyle {
    fn default() -> Self {
        Self {
            font_paths: vec![
                PathBuf::from("/System/Library/Fonts/Helvetica.ttc"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
                PathBuf::from("C:\\Windows\\Fonts\\arial.ttf"),
            ],
            font_size: 36.0,
            wrap_width: 35,
            padding: 20,
            corner_radius: 30,
            side_margin: 100,
            fill: [255, 255, 255, 230],
            repeated_fill: [193, 154, 107, 230],
            text_color: [0, 0, 0, 255],
            marker_path: None,
            marker_size: 60,
        }
    }
}

/// Параметры вызова FFmpeg
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg_program: String,
    pub video_codec: String,
    pub preset: String,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_program: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// Конфигурация рендеринга
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub alignment: AlignmentConfig,
    pub timing: TimingConfig,
    pub bubble: BubbleStyle,
    pub encoder: EncoderConfig,
    /// Политика повторов для внешних процессов
    pub retry: BackoffPolicy,
    /// Максимальное количество параллельных диалогов (None - по числу ядер)
    pub max_workers: Option<usize>,
}

impl RenderConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| DialogueVideoError::FileNotFound(path.to_path_buf()))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверить значения, которые нельзя обработать корректно
    pub fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        if !(timing.slow_ratio > 0.0 && timing.slow_ratio.is_finite()) {
            return Err(DialogueVideoError::Configuration(format!(
                "slow_ratio must be positive, got {}",
                timing.slow_ratio
            )));
        }
        if timing.min_duration <= 0.0 {
            return Err(DialogueVideoError::Configuration(
                "min_duration must be positive".to_string(),
            ));
        }
        if timing.boundary_padding < 0.0 {
            return Err(DialogueVideoError::Configuration(
                "boundary_padding must not be negative".to_string(),
            ));
        }
        if self.bubble.wrap_width == 0 {
            return Err(DialogueVideoError::Configuration(
                "wrap_width must be at least 1".to_string(),
            ));
        }
        if self.max_workers == Some(0) {
            return Err(DialogueVideoError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(DialogueVideoError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Количество рабочих потоков для пула диалогов
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"timing": {"slow_ratio": 0.5}, "max_workers": 2}"#).unwrap();
        assert_eq!(config.timing.slow_ratio, 0.5);
        assert_eq!(config.timing.pause_after_slow, 2.0);
        assert_eq!(config.bubble.wrap_width, 35);
        assert_eq!(config.worker_count(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_workers() {
        let config = RenderConfig {
            max_workers: Some(0),
            ..RenderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DialogueVideoError::Configuration(_))
        ));
    }
}
