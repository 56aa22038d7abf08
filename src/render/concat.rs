//! Склейка клипов диалогов в итоговое видео

use std::path::{Path, PathBuf};

use crate::error::{ConversationFailure, DialogueVideoError, Result};
use crate::render::assembler::VideoEncoder;
use crate::utils::ffmpeg::{concat_quote, ensure_output};
use crate::utils::retry::{retry, BackoffPolicy};

/// Разобрать результаты задач по индексам.
///
/// Если хотя бы одна задача упала, возвращается ошибка со списком всех
/// упавших диалогов и причин.
pub fn collect_clips(results: Vec<Result<PathBuf>>) -> Result<Vec<PathBuf>> {
    if results.is_empty() {
        return Err(DialogueVideoError::Configuration(
            "No conversations to concatenate".to_string(),
        ));
    }

    let mut clips = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(clip) => clips.push(clip),
            Err(e) => failures.push(ConversationFailure {
                index,
                reason: e.to_string(),
            }),
        }
    }

    if failures.is_empty() {
        Ok(clips)
    } else {
        Err(DialogueVideoError::ConversationsFailed(failures))
    }
}

/// Склеить клипы в порядке их индексов в `output`.
///
/// Список для демультиплексора пишется в `scratch` и удаляется после склейки.
pub fn concatenate_clips(
    results: Vec<Result<PathBuf>>,
    scratch: &Path,
    output: &Path,
    encoder: &dyn VideoEncoder,
    policy: &BackoffPolicy,
) -> Result<PathBuf> {
    let clips = collect_clips(results)?;

    let list_path = scratch.join("clips.txt");
    let list: String = clips
        .iter()
        .map(|clip| format!("file {}\n", concat_quote(clip)))
        .collect();
    std::fs::write(&list_path, list)?;

    log::info!(
        "Concatenating {} clip(s) into {}",
        clips.len(),
        output.display()
    );
    let result = retry(policy, "clip concatenation", |_| {
        encoder.concat_clips(&list_path, output)?;
        ensure_output(output)
    });

    if let Err(e) = std::fs::remove_file(&list_path) {
        log::debug!("Failed to remove {}: {}", list_path.display(), e);
    }
    result?;

    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Склеивает содержимое файлов из списка
    struct CatEncoder {
        calls: AtomicUsize,
    }

    impl VideoEncoder for CatEncoder {
        fn encode_stills(&self, _script: &Path, _audio: &Path, _output: &Path) -> Result<()> {
            unreachable!("only concatenation is exercised here")
        }

        fn concat_clips(&self, list: &Path, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut joined = Vec::new();
            for line in std::fs::read_to_string(list)?.lines() {
                let path = line
                    .trim_start_matches("file '")
                    .trim_end_matches('\'');
                joined.extend(std::fs::read(path)?);
            }
            std::fs::write(output, joined)?;
            Ok(())
        }
    }

    fn encoder() -> CatEncoder {
        CatEncoder {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn clips_are_joined_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = Vec::new();
        for (i, content) in ["first ", "second ", "third"].iter().enumerate() {
            let path = dir.path().join(format!("conversation_{:03}.mp4", i));
            std::fs::write(&path, content).unwrap();
            results.push(Ok(path));
        }
        let output = dir.path().join("final.mp4");

        let encoder = encoder();
        concatenate_clips(results, dir.path(), &output, &encoder, &BackoffPolicy::no_retry())
            .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "first second third");
        assert!(!dir.path().join("clips.txt").exists());
    }

    #[test]
    fn failed_conversations_are_reported_and_nothing_is_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.mp4");
        std::fs::write(&ok, b"clip").unwrap();
        let results = vec![
            Ok(ok),
            Err(DialogueVideoError::Alignment("whisper crashed".to_string())),
            Err(DialogueVideoError::FileNotFound(PathBuf::from("bg.png"))),
        ];

        let encoder = encoder();
        let output = dir.path().join("final.mp4");
        let err = concatenate_clips(results, dir.path(), &output, &encoder, &BackoffPolicy::no_retry())
            .unwrap_err();

        match &err {
            DialogueVideoError::ConversationsFailed(failures) => {
                let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
                assert_eq!(indices, vec![1, 2]);
                assert!(failures[0].reason.contains("whisper crashed"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("conversation 2: Alignment error: whisper crashed"));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
        assert!(!output.exists());
    }

    #[test]
    fn zero_conversations_is_an_error() {
        assert!(matches!(
            collect_clips(Vec::new()),
            Err(DialogueVideoError::Configuration(_))
        ));
    }
}
