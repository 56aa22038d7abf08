//! Модуль для работы с аудио
//!
//! Нарезка исходной записи, замедление с сохранением высоты тона и сборка
//! итоговой дорожки с повторами.

pub mod audio;
pub mod playback;

pub use audio::{AudioClip, FfmpegTempoStretcher, TimeStretcher};
pub use playback::{build_playback_timeline, PlaybackTimeline};
