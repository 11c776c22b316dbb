//! Integration tests for the drill engine public API
//!
//! These tests drive complete sessions against the synthetic camera and the
//! recording speaker, on tokio's paused clock:
//! - Stream behavior (snapshots, cues, results, telemetry)
//! - Calibration feeding the motion detector
//! - Assignment sessions reporting to their collaborator only
//! - Device failures surfacing as typed errors

use std::sync::Arc;
use std::time::Duration;

use faceoff_trainer::audio::{AudioCueEvent, CueKind, WhistleDelay};
use faceoff_trainer::config::{
    AppConfig, DrillConfiguration, DrillKind, DrillMode, SessionTarget,
};
use faceoff_trainer::engine::{
    CompletionReason, DrillDevices, DrillEngine, DrillState, InMemoryResultSink,
    RecordedAssignment, RepMeasurement, SessionState, StubAudioOutput, StubVideoSource,
    TelemetryEventKind,
};
use faceoff_trainer::error::{DrillError, DrillErrorCodes, ErrorCode};
use futures::{FutureExt, Stream, StreamExt};

fn shooting_release(target: SessionTarget) -> DrillConfiguration {
    DrillConfiguration::for_drill(
        &AppConfig::default(),
        DrillKind::Shooting,
        DrillMode::Release,
        target,
    )
    .with_whistle(WhistleDelay::Fixed { ms: 2000 })
}

fn camera(reaction_ms: &[u64]) -> StubVideoSource {
    StubVideoSource::new(320, 240, Duration::from_millis(10))
        .with_reactions(reaction_ms.iter().map(|&ms| Duration::from_millis(ms)))
}

fn engine_with(
    drill_config: DrillConfiguration,
    video: Arc<StubVideoSource>,
    sink: Arc<InMemoryResultSink>,
) -> DrillEngine {
    let devices = DrillDevices::new(video, Arc::new(StubAudioOutput::new()));
    DrillEngine::new(AppConfig::default(), drill_config, devices)
        .expect("drill configuration should be valid")
        .with_result_sink(sink)
}

/// Collect everything already buffered on a stream without waiting.
fn drain<T>(stream: &mut (impl Stream<Item = T> + Unpin)) -> Vec<T> {
    let mut items = Vec::new();
    while let Some(Some(item)) = stream.next().now_or_never() {
        items.push(item);
    }
    items
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Two shooting reps: cues, telemetry and the result stream line up
#[tokio::test(start_paused = true)]
async fn test_shooting_session_streams() {
    let video = Arc::new(camera(&[150, 250]));
    let sink = Arc::new(InMemoryResultSink::new());
    let engine = engine_with(
        shooting_release(SessionTarget::Reps { count: 2 }),
        video.clone(),
        sink.clone(),
    );
    let mut cues = engine.cue_stream();
    let mut telemetry = engine.telemetry_stream();
    let mut results = engine.result_stream();

    engine.start().expect("start should succeed on stub devices");
    // rep 1 measured at ~6.15 s, rep 2 starts 3 s later and lands at ~15.4 s
    sleep_ms(20_000).await;

    assert_eq!(engine.session_state(), SessionState::Finished);
    assert_eq!(
        engine.measurements(),
        vec![
            RepMeasurement::Latency { ms: 150 },
            RepMeasurement::Latency { ms: 250 },
        ]
    );

    let kinds: Vec<CueKind> = drain(&mut cues)
        .into_iter()
        .map(|event: AudioCueEvent| event.kind)
        .collect();
    let one_rep = vec![
        CueKind::CountdownTick { remaining: 3 },
        CueKind::CountdownTick { remaining: 2 },
        CueKind::CountdownTick { remaining: 1 },
        CueKind::Set { audible: false },
        CueKind::Whistle,
    ];
    assert_eq!(kinds, [one_rep.clone(), one_rep].concat());

    let events: Vec<TelemetryEventKind> = drain(&mut telemetry)
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        events.first(),
        Some(&TelemetryEventKind::SessionStarted {
            drill: DrillKind::Shooting,
            mode: DrillMode::Release,
        })
    );
    assert_eq!(
        events.last(),
        Some(&TelemetryEventKind::SessionFinished {
            reason: CompletionReason::TargetReached,
        })
    );
    let triggers = events
        .iter()
        .filter(|kind| matches!(kind, TelemetryEventKind::MotionTriggered { .. }))
        .count();
    assert_eq!(triggers, 2);

    let reports = drain(&mut results);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports, sink.reports());
    assert!(!video.is_acquired());
}

/// A calibrated ROI away from the motion keeps the rep measuring
#[tokio::test(start_paused = true)]
async fn test_calibrated_roi_ignores_motion_outside() {
    let video = Arc::new(camera(&[100]));
    let sink = Arc::new(InMemoryResultSink::new());
    let engine = engine_with(
        shooting_release(SessionTarget::Reps { count: 1 }),
        video.clone(),
        sink.clone(),
    );

    engine.begin_calibration().expect("calibration should open the camera");
    assert_eq!(engine.session_state(), SessionState::Calibration);
    let roi = engine
        .with_calibration(|calibration| {
            calibration.resize(100, 100);
            calibration.center_on(260, 120)
        })
        .expect("calibration in progress");
    assert!(roi.x >= 160, "ROI must sit in the right half, got {:?}", roi);

    let committed = engine.commit_calibration().expect("ROI should validate");
    assert_eq!(engine.drill_config().roi, committed);
    assert_eq!(engine.session_state(), SessionState::Setup);

    engine.start().expect("start after calibration");
    sleep_ms(10_000).await;

    // the stub only moves the left half of the picture
    assert_eq!(engine.drill_state(), DrillState::Measuring);
    assert!(engine.measurements().is_empty());
    assert_eq!(video.acquire_count(), 1);

    engine.abort();
    assert_eq!(engine.drill_state(), DrillState::Idle);
    assert!(sink.reports().is_empty());
}

/// Assignment notes set the rep target and receive the completion
#[tokio::test(start_paused = true)]
async fn test_assignment_session_reports_to_collaborator() {
    let video = Arc::new(camera(&[120, 180, 240]));
    let sink = Arc::new(InMemoryResultSink::new());
    let engine = engine_with(
        shooting_release(SessionTarget::Reps { count: 10 }),
        video,
        sink.clone(),
    );
    let mut results = engine.result_stream();
    let assignment = Arc::new(RecordedAssignment::new("Coach: take 2 shots low corners"));

    let reps = engine
        .start_assignment(assignment.clone())
        .expect("assignment should start");
    assert_eq!(reps, 2);
    sleep_ms(20_000).await;

    let completions = assignment.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].completion, CompletionReason::TargetReached);
    assert_eq!(completions[0].measurements.len(), 2);

    assert!(sink.reports().is_empty());
    assert!(drain(&mut results).is_empty());
}

/// Camera failure surfaces as a typed error and a telemetry event
#[tokio::test(start_paused = true)]
async fn test_camera_failure_is_reported() {
    let video = Arc::new(camera(&[]).failing("permission denied"));
    let sink = Arc::new(InMemoryResultSink::new());
    let engine = engine_with(
        shooting_release(SessionTarget::Reps { count: 1 }),
        video.clone(),
        sink,
    );
    let mut telemetry = engine.telemetry_stream();

    let err = engine.start().expect_err("camera failure should propagate");
    assert!(matches!(err, DrillError::CameraUnavailable { .. }));
    assert_eq!(err.code(), DrillErrorCodes::CAMERA_UNAVAILABLE);
    assert_eq!(engine.drill_state(), DrillState::Error);
    assert_eq!(engine.last_error(), Some(err));

    let events: Vec<TelemetryEventKind> = drain(&mut telemetry)
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert!(events.contains(&TelemetryEventKind::Error {
        code: DrillErrorCodes::CAMERA_UNAVAILABLE,
    }));

    engine.reset();
    assert_eq!(engine.drill_state(), DrillState::Idle);
    assert!(!video.is_acquired());
}

/// Snapshots of a full rep arrive in state order
#[tokio::test(start_paused = true)]
async fn test_snapshot_stream_follows_rep_lifecycle() {
    let sink = Arc::new(InMemoryResultSink::new());
    let engine = engine_with(
        shooting_release(SessionTarget::Reps { count: 1 }),
        Arc::new(camera(&[200])),
        sink,
    );
    let mut snapshots = engine.snapshot_stream();

    engine.start().expect("start");
    sleep_ms(8_000).await;

    let mut states: Vec<DrillState> = drain(&mut snapshots)
        .into_iter()
        .map(|snapshot| snapshot.drill_state)
        .collect();
    states.dedup();
    let order = [
        DrillState::Starting,
        DrillState::Countdown,
        DrillState::Set,
        DrillState::Measuring,
        DrillState::Result,
        DrillState::Idle,
    ];
    let rank = |state: &DrillState| order.iter().position(|candidate| candidate == state);
    let ranks: Vec<usize> = states.iter().filter_map(rank).collect();
    assert_eq!(ranks.len(), states.len(), "unexpected state in {:?}", states);
    assert!(
        ranks.windows(2).all(|pair| pair[0] < pair[1]),
        "states out of order: {:?}",
        states
    );
    assert_eq!(ranks.len(), order.len(), "missing states in {:?}", states);

    let last = engine.snapshot();
    assert_eq!(last.session_state, SessionState::Finished);
    assert_eq!(
        last.last_measurement,
        Some(RepMeasurement::Latency { ms: 200 })
    );
}
