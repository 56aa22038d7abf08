//! Нормализация временных меток предложений
//!
//! Исправляет пересечения соседних предложений и расширяет границы в паузы,
//! чтобы захватить начальные и конечные согласные. После нормализации
//! для всех `i` выполняется `end_i <= start_{i+1}` и `duration_i >= min_duration`.

use crate::config::TimingConfig;
use crate::models::SentenceTimestamp;

/// Упорядоченные временные метки предложений
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceTimeline {
    entries: Vec<SentenceTimestamp>,
    normalized: bool,
}

impl SentenceTimeline {
    pub fn new(entries: Vec<SentenceTimestamp>) -> Self {
        Self {
            entries,
            normalized: false,
        }
    }

    pub fn entries(&self) -> &[SentenceTimestamp] {
        &self.entries
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Нормализовать на месте. Повторный вызов ничего не меняет.
    pub fn normalize(&mut self, timing: &TimingConfig) {
        if self.normalized {
            return;
        }

        let entries = &mut self.entries;
        let count = entries.len();

        for i in 0..count.saturating_sub(1) {
            let current_end = entries[i].end;
            let next_start = entries[i + 1].start;

            if current_end > next_start {
                let midpoint = (current_end + next_start) / 2.0;
                entries[i].end = midpoint;
                entries[i + 1].start = midpoint;
            } else if current_end < next_start {
                let gap = next_start - current_end;
                let padding = timing.boundary_padding.min(gap / 2.0);
                entries[i].end += padding;
                entries[i + 1].start -= padding;
            }
        }

        for entry in entries.iter_mut() {
            entry.duration = entry.end - entry.start;
        }

        // Слишком короткие (в том числе отрицательные) интервалы растягиваются
        // до минимума; следующее предложение сдвигается, если начало перекрыто
        let floor = timing.min_duration;
        for i in 0..count {
            if entries[i].duration < floor {
                log::debug!(
                    "Clamping sentence {} duration {:.3}s to {:.3}s",
                    entries[i].sentence_index,
                    entries[i].duration,
                    floor
                );
                entries[i].end = entries[i].start + floor;
                entries[i].duration = floor;
            }
            if i + 1 < count && entries[i + 1].start < entries[i].end {
                entries[i + 1].start = entries[i].end;
                entries[i + 1].duration = entries[i + 1].end - entries[i + 1].start;
            }
        }

        self.normalized = true;
    }

    /// Вернуть нормализованную копию
    pub fn normalized(mut self, timing: &TimingConfig) -> Self {
        self.normalize(timing);
        self
    }
}
