use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::*;
use crate::models::RenderJob;
use crate::progress::RenderStep;
use crate::DialogueVideo;

fn job(dir: &Path, conversations: usize) -> RenderJob {
    RenderJob {
        title: "Im Café: Teil 1".to_string(),
        output_dir: dir.join("out"),
        conversations: (0..conversations)
            .map(|i| conversation_fixture(dir, i))
            .collect(),
    }
}

fn engine(config: RenderConfig, encoder: Arc<FakeEncoder>) -> (DialogueVideo, FakeAligner) {
    let aligner = FakeAligner::new(tokens());
    let counters = FakeAligner {
        tokens: Vec::new(),
        calls: aligner.calls.clone(),
        active: aligner.active.clone(),
        max_active: aligner.max_active.clone(),
    };
    let engine = DialogueVideo::with_components(
        config,
        Box::new(aligner),
        Arc::new(NaiveStretcher),
        encoder,
    );
    (engine, counters)
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn conversations_are_joined_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 4);
    let encoder = Arc::new(FakeEncoder::default());
    let (engine, counters) = engine(test_config(), encoder.clone());

    let output = engine.render_blocking(&job).unwrap();

    assert_eq!(output.file_name().unwrap(), "im_café_teil_1.mp4");
    let content = std::fs::read_to_string(&output).unwrap();
    let positions: Vec<usize> = (0..4)
        .map(|i| content.find(&format!("conversation_{:03}.mp4", i)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(counters.calls.load(Ordering::SeqCst), 4);
    assert_eq!(counters.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(encoder.encode_calls.load(Ordering::SeqCst), 4);
    assert_eq!(encoder.concat_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn each_clip_shows_every_segment_and_covers_the_track() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 1);
    let encoder = Arc::new(FakeEncoder::default());
    let (engine, _) = engine(test_config(), encoder);

    let output = engine.render_blocking(&job).unwrap();
    let content = std::fs::read_to_string(output).unwrap();

    let audio: f64 = content
        .lines()
        .find_map(|l| l.strip_prefix("audio "))
        .unwrap()
        .parse()
        .unwrap();
    let holds: Vec<f64> = content
        .lines()
        .filter_map(|l| l.strip_prefix("duration "))
        .map(|d| d.parse().unwrap())
        .collect();
    let frames = content.lines().filter(|l| l.contains("frame_")).count();

    // Два предложения: обычное и медленное воспроизведение каждого,
    // последний кадр указан повторно
    assert!(frames >= 4);
    assert!((holds.iter().sum::<f64>() - audio).abs() < 0.01);
    // Пауза после медленного повтора плюс тишина в конце
    assert!(holds.last().copied().unwrap() >= 2.5 - 0.01);
}

#[test]
fn successful_run_leaves_only_the_final_video() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 3);
    let (engine, _) = engine(test_config(), Arc::new(FakeEncoder::default()));

    engine.render_blocking(&job).unwrap();

    assert_eq!(entries(&dir.path().join("out")), vec!["im_café_teil_1.mp4"]);
}

#[test]
fn failed_conversation_prevents_concatenation() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 3);
    let encoder = Arc::new(FakeEncoder {
        fail_on: Some("conversation_001".to_string()),
        ..FakeEncoder::default()
    });
    let (engine, _) = engine(test_config(), encoder.clone());

    let err = engine.render_blocking(&job).unwrap_err();

    match err {
        DialogueVideoError::ConversationsFailed(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
            assert!(failures[0].reason.contains("cannot encode"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(encoder.concat_calls.load(Ordering::SeqCst), 0);
    assert!(entries(&dir.path().join("out")).is_empty());
}

#[test]
fn failed_conversation_is_reported_to_observers() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 3);
    let encoder = Arc::new(FakeEncoder {
        fail_on: Some("conversation_001".to_string()),
        ..FakeEncoder::default()
    });
    let (engine, _) = engine(test_config(), encoder);
    let observer = RecordingObserver::default();
    engine.add_observer(Box::new(observer.clone()));

    assert!(engine.render_blocking(&job).is_err());

    let updates = observer.updates.lock().unwrap();
    let failed: Vec<&ProgressInfo> = updates
        .iter()
        .filter(|u| u.step == RenderStep::Failed.as_str())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].conversation, Some(1));
    assert!(failed[0].details.as_deref().unwrap().contains("cannot encode"));

    // Остальные диалоги дошли до конца, итоговое событие задания не отправлено
    for index in [0, 2] {
        assert!(updates
            .iter()
            .any(|u| u.conversation == Some(index) && u.step == RenderStep::Done.as_str()));
    }
    assert!(updates
        .iter()
        .all(|u| u.conversation.is_some() || u.step != RenderStep::Done.as_str()));
}

#[test]
fn missing_inputs_are_reported_per_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 2);
    job.conversations[0].background = dir.path().join("nope.png");
    let (engine, _) = engine(test_config(), Arc::new(FakeEncoder::default()));

    let err = engine.render_blocking(&job).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("conversation 1: File not found"));
    assert!(message.contains("nope.png"));
    assert!(!message.contains("conversation 2"));
}

#[test]
fn transient_encoder_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 1);
    let encoder = Arc::new(FakeEncoder {
        flaky_attempts: 1,
        ..FakeEncoder::default()
    });
    let config = RenderConfig {
        retry: BackoffPolicy {
            max_attempts: 2,
            base_delay_ms: 0,
            multiplier: 1.0,
        },
        ..test_config()
    };
    let (engine, _) = engine(config, encoder.clone());

    engine.render_blocking(&job).unwrap();
    assert_eq!(encoder.encode_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_job_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 0);
    let (engine, _) = engine(test_config(), Arc::new(FakeEncoder::default()));
    assert!(matches!(
        engine.render_blocking(&job),
        Err(DialogueVideoError::Configuration(_))
    ));
}

#[tokio::test]
async fn async_entry_point_renders_on_blocking_pool() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 2);
    let (engine, _) = engine(test_config(), Arc::new(FakeEncoder::default()));

    let output = engine.render(job).await.unwrap();
    assert!(output.is_file());
    assert!(output.starts_with(dir.path().canonicalize().unwrap()));
}
