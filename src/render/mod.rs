//! Модуль для работы с видео
//!
//! Отрисовка кадров с репликами, сборка клипа каждого диалога из статичных
//! кадров и склейка клипов в итоговый файл.

pub mod assembler;
pub mod compositor;
pub mod concat;

pub use assembler::{build_concat_script, ConcatScript, FfmpegEncoder, VideoEncoder};
pub use compositor::{wrap_text, FrameCompositor};
pub use concat::concatenate_clips;
