//! Тесты полного конвейера с подменёнными внешними движками

mod test_pipeline;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::alignment::WordAligner;
use crate::config::{BubbleStyle, RenderConfig};
use crate::error::{DialogueVideoError, Result};
use crate::media::{AudioClip, TimeStretcher};
use crate::models::{Conversation, DialogueLine, Speaker, Token};
use crate::progress::{ProgressInfo, ProgressObserver};
use crate::render::VideoEncoder;
use crate::utils::retry::BackoffPolicy;

/// Движок распознавания с заранее заданными словами
pub struct FakeAligner {
    pub tokens: Vec<Token>,
    pub calls: Arc<AtomicUsize>,
    /// Количество одновременно выполняющихся вызовов
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
}

impl FakeAligner {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl WordAligner for FakeAligner {
    fn name(&self) -> &str {
        "fake"
    }

    fn align(&self, _audio_path: &Path) -> Result<Vec<Token>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.tokens.clone())
    }
}

/// Замедление повтором ближайших кадров
pub struct NaiveStretcher;

impl TimeStretcher for NaiveStretcher {
    fn stretch(&self, input: &Path, ratio: f64, output: &Path) -> Result<()> {
        let clip = AudioClip::read_wav(input)?;
        let frames = (clip.frames() as f64 / ratio).round() as usize;
        let channels = clip.channels as usize;
        let mut samples = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            let source = ((frame as f64 * ratio) as usize).min(clip.frames() - 1);
            samples.extend_from_slice(&clip.samples[source * channels..(source + 1) * channels]);
        }
        AudioClip { samples, ..clip }.write_wav(output)
    }
}

/// Кодировщик, который вместо видео пишет текст: содержимое файла
/// инструкций для клипа и конкатенацию клипов для итогового файла
#[derive(Default)]
pub struct FakeEncoder {
    /// Подстрока имени клипа, на котором кодирование падает
    pub fail_on: Option<String>,
    /// Сколько первых попыток кодирования клипа падает
    pub flaky_attempts: usize,
    pub encode_calls: AtomicUsize,
    pub concat_calls: AtomicUsize,
}

impl VideoEncoder for FakeEncoder {
    fn encode_stills(&self, script: &Path, audio: &Path, output: &Path) -> Result<()> {
        let call = self.encode_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.flaky_attempts {
            return Err(DialogueVideoError::Other("encoder hiccup".to_string()));
        }
        let name = output.to_string_lossy().to_string();
        if let Some(fail_on) = &self.fail_on {
            if name.contains(fail_on.as_str()) {
                return Err(DialogueVideoError::Rendering(format!("cannot encode {}", name)));
            }
        }

        let text = std::fs::read_to_string(script)?;
        for line in text.lines().filter(|l| l.starts_with("file ")) {
            let frame = line.trim_start_matches("file '").trim_end_matches('\'');
            if !Path::new(frame).is_file() {
                return Err(DialogueVideoError::FileNotFound(PathBuf::from(frame)));
            }
        }
        let audio = AudioClip::read_wav(audio)?;
        std::fs::write(
            output,
            format!("{}\naudio {:.3}\n{}", name, audio.duration(), text),
        )?;
        Ok(())
    }

    fn concat_clips(&self, list: &Path, output: &Path) -> Result<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        let mut joined = String::new();
        for line in std::fs::read_to_string(list)?.lines() {
            let clip = line.trim_start_matches("file '").trim_end_matches('\'');
            joined.push_str(&std::fs::read_to_string(clip)?);
        }
        std::fs::write(output, joined)?;
        Ok(())
    }
}

/// Наблюдатель, сохраняющий все события прогресса
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub updates: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.updates.lock().unwrap().push(progress);
    }
}

pub fn dialogue() -> Vec<DialogueLine> {
    vec![
        DialogueLine::new(Speaker::Left, "Guten Morgen!"),
        DialogueLine::new(Speaker::Right, "Wie geht es dir?"),
    ]
}

pub fn tokens() -> Vec<Token> {
    vec![
        Token::new("guten", 0.1, 0.5),
        Token::new("morgen", 0.5, 1.0),
        Token::new("wie", 1.4, 1.6),
        Token::new("geht", 1.6, 1.9),
        Token::new("es", 1.9, 2.0),
        Token::new("dir", 2.0, 2.4),
    ]
}

/// Создать на диске озвучку и фон для диалога
pub fn conversation_fixture(dir: &Path, index: usize) -> Conversation {
    let audio = dir.join(format!("voice_{}.wav", index));
    let samples = (0..16_000 * 3)
        .map(|i| (i as f32 * 0.05).sin() * 0.3)
        .collect();
    AudioClip {
        sample_rate: 16_000,
        channels: 1,
        samples,
    }
    .write_wav(&audio)
    .unwrap();

    let background = dir.join(format!("background_{}.png", index));
    RgbaImage::from_pixel(320, 180, Rgba([40, 60, 90, 255]))
        .save(&background)
        .unwrap();

    Conversation {
        background,
        audio,
        dialogue: dialogue(),
    }
}

pub fn test_config() -> RenderConfig {
    RenderConfig {
        bubble: BubbleStyle {
            font_paths: Vec::new(),
            font_size: 14.0,
            ..BubbleStyle::default()
        },
        retry: BackoffPolicy::no_retry(),
        max_workers: Some(2),
        ..RenderConfig::default()
    }
}
