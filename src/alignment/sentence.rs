//! Сопоставление известных предложений с распознанными словами
//!
//! Слова всех предложений склеиваются в одну последовательность с пометкой
//! индекса предложения, после чего строится скрипт правок между ней и
//! распознанным потоком. Каждое распознанное слово приписывается одному
//! предложению в зависимости от типа операции.

use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::alignment::normalizer::SentenceTimeline;
use crate::alignment::{normalize_token, sentence_words};
use crate::config::TimingConfig;
use crate::models::{SentenceTimestamp, Token};

/// Слово целевого текста с индексом предложения
struct TargetWord {
    sentence: usize,
    text: String,
}

/// Построить сырые временные диапазоны предложений.
///
/// Результат может содержать пересечения и нарушения порядка; их исправляет
/// [`SentenceTimeline::normalize`].
pub fn align_sentences<S: AsRef<str>>(
    sentences: &[S],
    tokens: &[Token],
    timing: &TimingConfig,
) -> SentenceTimeline {
    let targets: Vec<TargetWord> = sentences
        .iter()
        .enumerate()
        .flat_map(|(sentence, text)| {
            sentence_words(text.as_ref())
                .into_iter()
                .map(move |text| TargetWord { sentence, text })
        })
        .collect();

    // Распознанные слова приводятся к той же форме, что и слова предложений
    let observed: Vec<Token> = tokens
        .iter()
        .map(|t| Token::new(normalize_token(&t.text), t.start, t.end))
        .filter(|t| !t.text.is_empty())
        .collect();

    if targets.is_empty() || observed.is_empty() {
        log::warn!(
            "No usable alignment ({} target words, {} tokens); using {:.1}s placeholder slots",
            targets.len(),
            observed.len(),
            timing.placeholder_slot
        );
        return placeholder_timeline(sentences.len(), timing.placeholder_slot);
    }

    let assigned = assign_tokens(sentences.len(), &targets, &observed);

    let mut entries: Vec<SentenceTimestamp> = Vec::with_capacity(sentences.len());
    for (index, token_indices) in assigned.iter().enumerate() {
        let bounds = token_indices.iter().fold(None, |acc: Option<(f64, f64)>, &j| {
            let token = &observed[j];
            Some(match acc {
                Some((start, end)) => (start.min(token.start), end.max(token.end)),
                None => (token.start, token.end),
            })
        });

        let entry = match bounds {
            Some((start, end)) => SentenceTimestamp::new(index, start, end),
            None => {
                let start = entries.last().map(|prev| prev.end).unwrap_or(0.0);
                log::debug!(
                    "Sentence {} has no matched words; synthesizing {:.1}s slot at {:.3}",
                    index,
                    timing.missing_sentence_slot,
                    start
                );
                SentenceTimestamp::new(index, start, start + timing.missing_sentence_slot)
            }
        };
        entries.push(entry);
    }

    SentenceTimeline::new(entries)
}

/// Распределить индексы распознанных слов по предложениям
fn assign_tokens(
    sentence_count: usize,
    targets: &[TargetWord],
    observed: &[Token],
) -> Vec<Vec<usize>> {
    let target_texts: Vec<&str> = targets.iter().map(|w| w.text.as_str()).collect();
    let observed_texts: Vec<&str> = observed.iter().map(|t| t.text.as_str()).collect();

    let mut assigned = vec![Vec::new(); sentence_count];

    for op in capture_diff_slices(Algorithm::Myers, &target_texts, &observed_texts) {
        let (tag, old, new) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                for (k, j) in new.enumerate() {
                    assigned[targets[old.start + k].sentence].push(j);
                }
            }
            DiffTag::Replace => {
                let old_len = old.len();
                let new_len = new.len();
                for (k, j) in new.enumerate() {
                    let target = old.start + k * old_len / new_len;
                    assigned[targets[target].sentence].push(j);
                }
            }
            DiffTag::Insert => {
                // Лишние слова достаются ближайшему предшествующему предложению
                let sentence = if old.start > 0 {
                    targets[old.start - 1].sentence
                } else {
                    targets[0].sentence
                };
                assigned[sentence].extend(new);
            }
            DiffTag::Delete => {}
        }
    }

    assigned
}

/// Равномерные слоты одинаковой длины без промежутков
fn placeholder_timeline(count: usize, slot: f64) -> SentenceTimeline {
    let entries = (0..count)
        .map(|i| {
            let start = i as f64 * slot;
            SentenceTimestamp::new(i, start, start + slot)
        })
        .collect();
    SentenceTimeline::new(entries)
}
