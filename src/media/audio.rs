//! Базовые операции с PCM аудио
//!
//! Декодирование и кодирование WAV через `hound`, нарезка по времени,
//! генерация тишины и приведение формата. Замедление выполняется внешним
//! процессом через трейт [`TimeStretcher`].

use std::ffi::OsString;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{DialogueVideoError, Result};
use crate::utils::ffmpeg::run_ffmpeg;

/// Размер входного блока ресемплера в кадрах
const RESAMPLE_CHUNK: usize = 1024;

/// PCM аудио в памяти: чередующиеся семплы f32 в диапазоне [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioClip {
    /// Пустой клип заданного формата
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    /// Тишина заданной длительности
    pub fn silence(seconds: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = seconds_to_frames(seconds, sample_rate);
        Self {
            sample_rate,
            channels,
            samples: vec![0.0; frames * channels as usize],
        }
    }

    /// Прочитать WAV файл (целочисленный PCM или float)
    pub fn read_wav(path: &Path) -> Result<Self> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(DialogueVideoError::AudioProcessing(format!(
                "Unsupported WAV format in {}: {:?}",
                path.display(),
                spec
            )));
        }

        let samples = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Записать 16-битный PCM WAV
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Количество кадров (семплов на канал)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Длительность, измеренная по количеству кадров
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Вырезать интервал `[start, end)` в секундах; границы обрезаются по длине клипа
    pub fn slice(&self, start: f64, end: f64) -> Self {
        let frames = self.frames();
        let first = seconds_to_frames(start, self.sample_rate).min(frames);
        let last = seconds_to_frames(end, self.sample_rate).clamp(first, frames);
        let channels = self.channels as usize;
        Self {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: self.samples[first * channels..last * channels].to_vec(),
        }
    }

    /// Дописать клип того же формата в конец
    pub fn append(&mut self, other: &AudioClip) -> Result<()> {
        if other.sample_rate != self.sample_rate || other.channels != self.channels {
            return Err(DialogueVideoError::AudioProcessing(format!(
                "Cannot append {} Hz/{} ch audio to {} Hz/{} ch track",
                other.sample_rate, other.channels, self.sample_rate, self.channels
            )));
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Привести к заданной частоте и количеству каналов
    pub fn conform(self, sample_rate: u32, channels: u16) -> Result<Self> {
        let remixed = if self.channels == channels {
            self
        } else {
            self.remix(channels)
        };
        if remixed.sample_rate == sample_rate {
            Ok(remixed)
        } else {
            remixed.resample(sample_rate)
        }
    }

    fn remix(self, channels: u16) -> Self {
        let source_channels = self.channels.max(1) as usize;
        let mono = self
            .samples
            .chunks(source_channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32);
        let samples = mono
            .flat_map(|value| std::iter::repeat(value).take(channels as usize))
            .collect();
        Self {
            sample_rate: self.sample_rate,
            channels,
            samples,
        }
    }

    /// Sinc-ресемплинг через `rubato`
    ///
    /// Вход подаётся блоками фиксированного размера, последний блок дополняется
    /// нулями. Задержка фильтра отбрасывается, длина результата равна
    /// `round(frames * new_rate / old_rate)`.
    fn resample(self, sample_rate: u32) -> Result<Self> {
        let channels = self.channels.max(1) as usize;
        let source_frames = self.frames();
        let ratio = sample_rate as f64 / self.sample_rate as f64;
        let target_frames = (source_frames as f64 * ratio).round() as usize;
        if source_frames == 0 || target_frames == 0 {
            return Ok(Self::empty(sample_rate, self.channels));
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler =
            SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, channels).map_err(|e| {
                DialogueVideoError::AudioProcessing(format!("Failed to create resampler: {}", e))
            })?;

        let mut planar = vec![Vec::with_capacity(source_frames); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (channel, &sample) in frame.iter().enumerate() {
                planar[channel].push(sample);
            }
        }

        let delay = resampler.output_delay();
        let wanted = delay + target_frames;
        let mut resampled: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); channels];
        let mut position = 0;
        while resampled[0].len() < wanted {
            let needed = resampler.input_frames_next();
            let block: Vec<Vec<f32>> = planar
                .iter()
                .map(|data| {
                    let mut chunk = vec![0.0; needed];
                    if position < source_frames {
                        let end = (position + needed).min(source_frames);
                        chunk[..end - position].copy_from_slice(&data[position..end]);
                    }
                    chunk
                })
                .collect();
            let produced = resampler.process(&block, None).map_err(|e| {
                DialogueVideoError::AudioProcessing(format!("Resampling failed: {}", e))
            })?;
            if produced[0].is_empty() {
                return Err(DialogueVideoError::AudioProcessing(format!(
                    "Resampler produced no output for {} -> {} Hz",
                    self.sample_rate, sample_rate
                )));
            }
            for (target, data) in resampled.iter_mut().zip(produced) {
                target.extend(data);
            }
            position += needed;
        }

        let mut samples = Vec::with_capacity(target_frames * channels);
        for frame in delay..wanted {
            for data in &resampled {
                samples.push(data[frame]);
            }
        }

        Ok(Self {
            sample_rate,
            channels: self.channels,
            samples,
        })
    }
}

fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

/// Замедление или ускорение аудио без изменения высоты тона
pub trait TimeStretcher: Send + Sync {
    /// Записать в `output` версию `input`, воспроизводимую со скоростью `ratio`
    fn stretch(&self, input: &Path, ratio: f64, output: &Path) -> Result<()>;
}

/// Изменение темпа через фильтр FFmpeg `atempo`
pub struct FfmpegTempoStretcher {
    ffmpeg_program: String,
}

impl FfmpegTempoStretcher {
    pub fn new(ffmpeg_program: impl Into<String>) -> Self {
        Self {
            ffmpeg_program: ffmpeg_program.into(),
        }
    }
}

impl TimeStretcher for FfmpegTempoStretcher {
    fn stretch(&self, input: &Path, ratio: f64, output: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-filter:a".into(),
            format!("atempo={}", ratio).into(),
            "-c:a".into(),
            "pcm_s16le".into(),
            output.as_os_str().to_owned(),
        ];
        run_ffmpeg(&self.ffmpeg_program, args, output)?;
        Ok(())
    }
}
