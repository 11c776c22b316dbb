use super::*;
use crate::analysis::{ScriptedClassifier, ZoneClassifier};
use crate::audio::WhistleDelay;
use crate::engine::backend::{StubAudioOutput, StubVideoSource};
use crate::engine::collaborators::{InMemoryResultSink, RecordedAssignment};

struct Harness {
    engine: DrillEngine,
    video: Arc<StubVideoSource>,
    audio: Arc<StubAudioOutput>,
    sink: Arc<InMemoryResultSink>,
}

fn drill(kind: DrillKind, mode: DrillMode, target: SessionTarget) -> DrillConfiguration {
    DrillConfiguration::for_drill(&AppConfig::default(), kind, mode, target)
        .with_whistle(WhistleDelay::Fixed { ms: 2000 })
}

fn reactions(ms: &[u64]) -> Vec<Duration> {
    ms.iter().map(|&ms| Duration::from_millis(ms)).collect()
}

fn harness_with(
    drill_config: DrillConfiguration,
    video: StubVideoSource,
    audio: StubAudioOutput,
    classifier: Option<Arc<dyn ZoneClassifier>>,
) -> Harness {
    let video = Arc::new(video);
    let audio = Arc::new(audio);
    let sink = Arc::new(InMemoryResultSink::new());
    let mut devices = DrillDevices::new(video.clone(), audio.clone());
    if let Some(classifier) = classifier {
        devices = devices.with_classifier(classifier);
    }
    let engine = DrillEngine::new(AppConfig::default(), drill_config, devices)
        .unwrap()
        .with_seed(7)
        .with_result_sink(sink.clone());
    Harness {
        engine,
        video,
        audio,
        sink,
    }
}

fn harness(drill_config: DrillConfiguration, reaction_ms: &[u64]) -> Harness {
    harness_with(
        drill_config,
        StubVideoSource::new(320, 240, Duration::from_millis(10)).with_reactions(reactions(reaction_ms)),
        StubAudioOutput::new(),
        None,
    )
}

fn whistles(audio: &StubAudioOutput) -> usize {
    audio
        .played_kinds()
        .iter()
        .filter(|kind| **kind == CueKind::Whistle)
        .count()
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[test]
fn test_new_rejects_invalid_configuration() {
    let config = drill(DrillKind::FaceOff, DrillMode::Placement, SessionTarget::Reps { count: 3 });
    let devices = DrillDevices::new(
        Arc::new(StubVideoSource::vga()),
        Arc::new(StubAudioOutput::new()),
    );
    assert!(matches!(
        DrillEngine::new(AppConfig::default(), config, devices),
        Err(ConfigurationError::UnsupportedMode { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_face_off_cues_and_whistle_arm_at_8750() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 3 }),
        &[],
    );
    let t0 = tokio::time::Instant::now();
    h.engine.start().unwrap();
    assert_eq!(h.engine.drill_state(), DrillState::Starting);
    assert_eq!(h.engine.session_state(), SessionState::Running);

    sleep_ms(3500).await;
    assert_eq!(h.engine.drill_state(), DrillState::Countdown);
    assert_eq!(h.engine.snapshot().countdown, Some(3));

    sleep_ms(3500).await;
    assert_eq!(h.engine.drill_state(), DrillState::Set);

    sleep_ms(1760).await;
    assert_eq!(h.engine.drill_state(), DrillState::Measuring);

    let offsets: Vec<u64> = h
        .audio
        .played()
        .iter()
        .map(|(_, at)| at.duration_since(t0).as_millis() as u64)
        .collect();
    assert_eq!(offsets, vec![1000, 2000, 3000, 4000, 5000, 6750, 8750]);
    assert_eq!(h.audio.played_kinds().last(), Some(&CueKind::Whistle));
}

#[tokio::test(start_paused = true)]
async fn test_release_latency_is_recorded() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 1 }),
        &[250],
    );
    h.engine.start().unwrap();
    sleep_ms(9500).await;

    assert_eq!(
        h.engine.measurements(),
        vec![RepMeasurement::Latency { ms: 250 }]
    );
    assert_eq!(h.engine.drill_state(), DrillState::Idle);
    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert!(!h.video.is_acquired());
    assert!(!h.audio.is_open());
    assert_eq!(h.engine.pending_timers(), 0);

    let reports = h.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].completion, CompletionReason::TargetReached);
    assert_eq!(
        reports[0].result,
        Some(SessionResult::Release {
            count: 1,
            best_ms: 250,
            worst_ms: 250,
            average_ms: 250,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_fixed_count_completes_exactly() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 3 }),
        &[200, 300, 400, 500],
    );
    h.engine.start().unwrap();
    sleep_ms(40_000).await;

    assert_eq!(h.engine.measurements().len(), 3);
    assert_eq!(
        h.engine.result(),
        Some(SessionResult::Release {
            count: 3,
            best_ms: 200,
            worst_ms: 400,
            average_ms: 300,
        })
    );

    sleep_ms(30_000).await;
    assert_eq!(whistles(&h.audio), 3, "no fourth rep may start");
    assert_eq!(h.engine.measurements().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timed_guard_band_ends_after_recording() {
    // rep 1 lands at 8.85 s with 13 - 8 = 5 s left
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Timed { secs: 13 }),
        &[100, 100],
    );
    h.engine.start().unwrap();
    sleep_ms(9000).await;

    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert_eq!(h.engine.drill_state(), DrillState::Idle);
    let reports = h.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].completion, CompletionReason::GuardBand);
    assert_eq!(reports[0].measurements, vec![RepMeasurement::Latency { ms: 100 }]);

    sleep_ms(10_000).await;
    assert_eq!(whistles(&h.audio), 1);
}

#[tokio::test(start_paused = true)]
async fn test_five_rep_session_stops_after_fifth_whistle() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 5 }),
        &[100, 100, 100, 100, 100, 100, 100],
    );
    h.engine.start().unwrap();
    // rep 5 lands at 5 * 8.85 s + 4 * 3 s = 56.25 s
    sleep_ms(60_000).await;

    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert_eq!(h.engine.measurements().len(), 5);
    let reports = h.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].completion, CompletionReason::TargetReached);

    sleep_ms(30_000).await;
    assert_eq!(whistles(&h.audio), 5, "no sixth rep may start");
    assert_eq!(h.engine.measurements().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_minute_session_ends_in_guard_band() {
    // rep 5 lands at 56.25 s with 4 s left, too short for another rep
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Timed { secs: 60 }),
        &[100, 100, 100, 100, 100, 100, 100],
    );
    h.engine.start().unwrap();
    sleep_ms(57_000).await;

    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert_eq!(h.engine.drill_state(), DrillState::Idle);
    let reports = h.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].completion, CompletionReason::GuardBand);
    assert_eq!(reports[0].measurements.len(), 5);

    sleep_ms(20_000).await;
    assert_eq!(whistles(&h.audio), 5);
    assert_eq!(h.sink.reports().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timed_session_expires_mid_rep() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Timed { secs: 20 }),
        &[100],
    );
    h.engine.start().unwrap();
    sleep_ms(19_900).await;
    assert_eq!(h.engine.session_state(), SessionState::Running);
    assert_eq!(h.engine.snapshot().remaining_secs, Some(1));

    sleep_ms(200).await;
    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert_eq!(h.engine.drill_state(), DrillState::Idle);
    assert_eq!(h.sink.reports()[0].completion, CompletionReason::TimeExpired);
    assert_eq!(h.engine.measurements().len(), 1);
    assert!(!h.video.is_acquired());
}

#[tokio::test(start_paused = true)]
async fn test_placement_unknown_falls_back_to_log_shot() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![Ok(ZoneResponse::Unknown)]));
    let h = harness_with(
        drill(DrillKind::Shooting, DrillMode::Placement, SessionTarget::Reps { count: 1 }),
        StubVideoSource::new(320, 240, Duration::from_millis(10)).with_reactions(reactions(&[100])),
        StubAudioOutput::new(),
        Some(classifier.clone()),
    );
    h.engine.start().unwrap();
    // 1000 pre-start + 3 ticks + silent set at 4000 + 2000 whistle + 100 reaction
    sleep_ms(6500).await;

    assert_eq!(classifier.calls(), 1);
    assert_eq!(h.engine.drill_state(), DrillState::LogShot);
    assert!(h.engine.measurements().is_empty());

    let (_, roi) = h.engine.impact_frame().unwrap();
    let centre = ZoneGrid::new(roi).cell_rect(ZoneIndex::new(4).unwrap()).center();
    let zone = h.engine.log_zone_at(centre.0, centre.1).unwrap();
    assert_eq!(zone.index(), 4);

    assert_eq!(h.engine.measurements(), vec![RepMeasurement::Zone { zone }]);
    assert_eq!(h.engine.session_state(), SessionState::Finished);
    match h.sink.reports()[0].result.clone() {
        Some(SessionResult::Placement { count, zones }) => {
            assert_eq!(count, 1);
            assert_eq!(zones[4], 1);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_placement_out_of_range_falls_back_to_log_shot() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![Ok(ZoneResponse::Zone(12))]));
    let h = harness_with(
        drill(DrillKind::Shooting, DrillMode::Placement, SessionTarget::Reps { count: 2 }),
        StubVideoSource::new(320, 240, Duration::from_millis(10)).with_reactions(reactions(&[100])),
        StubAudioOutput::new(),
        Some(classifier),
    );
    h.engine.start().unwrap();
    sleep_ms(6500).await;
    assert_eq!(h.engine.drill_state(), DrillState::LogShot);

    assert!(matches!(
        h.engine.log_zone_at(0, 0),
        Err(DrillError::InvalidZone { .. })
    ));
    h.engine.log_zone(ZoneIndex::new(8).unwrap()).unwrap();
    assert_eq!(h.engine.drill_state(), DrillState::Result);
    assert_eq!(h.engine.session_state(), SessionState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_placement_automatic_zone() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![Ok(ZoneResponse::Zone(2))]));
    let h = harness_with(
        drill(DrillKind::Shooting, DrillMode::Placement, SessionTarget::Reps { count: 1 }),
        StubVideoSource::new(320, 240, Duration::from_millis(10)).with_reactions(reactions(&[100])),
        StubAudioOutput::new(),
        Some(classifier),
    );
    h.engine.start().unwrap();
    sleep_ms(6500).await;

    assert_eq!(
        h.engine.measurements(),
        vec![RepMeasurement::Zone {
            zone: ZoneIndex::new(2).unwrap()
        }]
    );
    assert_eq!(h.engine.session_state(), SessionState::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_placement_toggle_off_skips_classifier() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![Ok(ZoneResponse::Zone(2))]));
    let h = harness_with(
        drill(DrillKind::Shooting, DrillMode::Placement, SessionTarget::Reps { count: 1 })
            .with_auto_classify(false),
        StubVideoSource::new(320, 240, Duration::from_millis(10)).with_reactions(reactions(&[100])),
        StubAudioOutput::new(),
        Some(classifier.clone()),
    );
    h.engine.start().unwrap();
    sleep_ms(6500).await;

    assert_eq!(classifier.calls(), 0);
    assert_eq!(h.engine.drill_state(), DrillState::LogShot);
}

#[tokio::test(start_paused = true)]
async fn test_abort_leaves_no_live_callbacks() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 5 }),
        &[300],
    );
    h.engine.start().unwrap();
    sleep_ms(3500).await;
    assert_eq!(h.engine.drill_state(), DrillState::Countdown);

    h.engine.abort();
    let played = h.audio.played().len();
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.drill_state, DrillState::Idle);
    assert_eq!(snapshot.session_state, SessionState::Setup);
    assert_eq!(h.video.release_count(), 1);

    sleep_ms(10_000).await;
    assert_eq!(h.audio.played().len(), played);
    assert_eq!(h.engine.snapshot(), snapshot);
    assert_eq!(h.engine.pending_timers(), 0);
    assert!(h.engine.measurements().is_empty());

    // abort is idempotent
    h.engine.abort();
    assert_eq!(h.video.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_while_measuring_stops_frame_loop() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 5 }),
        &[],
    );
    h.engine.start().unwrap();
    sleep_ms(9000).await;
    assert_eq!(h.engine.drill_state(), DrillState::Measuring);

    h.engine.abort();
    h.video.trigger_motion();
    sleep_ms(5000).await;
    assert!(h.engine.measurements().is_empty());
    assert_eq!(h.engine.drill_state(), DrillState::Idle);
    assert_eq!(h.engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_camera_failure_enters_error() {
    let h = harness_with(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 3 }),
        StubVideoSource::vga().failing("permission denied"),
        StubAudioOutput::new(),
        None,
    );
    let err = h.engine.start().unwrap_err();
    assert!(matches!(err, DrillError::CameraUnavailable { .. }));
    assert_eq!(h.engine.drill_state(), DrillState::Error);
    assert_eq!(h.engine.pending_timers(), 0);

    sleep_ms(10_000).await;
    assert!(h.audio.played().is_empty());

    assert!(matches!(
        h.engine.start(),
        Err(DrillError::InvalidTransition { .. })
    ));
    h.engine.reset();
    assert_eq!(h.engine.drill_state(), DrillState::Idle);
    assert!(h.engine.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_audio_failure_releases_camera() {
    let h = harness_with(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 3 }),
        StubVideoSource::vga(),
        StubAudioOutput::failing("no output device"),
        None,
    );
    let err = h.engine.start().unwrap_err();
    assert!(matches!(err, DrillError::AudioDeviceUnavailable { .. }));
    assert_eq!(h.engine.drill_state(), DrillState::Error);
    assert!(!h.video.is_acquired());
    assert_eq!(h.engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_video_not_ready_at_whistle_enters_error() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 3 }),
        &[100],
    );
    h.engine.start().unwrap();
    sleep_ms(7000).await;
    h.video.set_ready_override(Some(false));
    sleep_ms(2000).await;

    assert_eq!(h.engine.drill_state(), DrillState::Error);
    assert_eq!(h.engine.last_error(), Some(DrillError::VideoNotReady));
    assert_eq!(whistles(&h.audio), 0, "whistle is suppressed with the arm");
    assert_eq!(h.engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_configure_locked_while_running() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 3 }),
        &[],
    );
    h.engine.start().unwrap();
    let replacement = drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 9 });
    assert_eq!(
        h.engine.configure(replacement.clone()),
        Err(ConfigurationError::LockedWhileRunning)
    );

    h.engine.abort();
    assert!(h.engine.configure(replacement).is_ok());
    assert_eq!(
        h.engine.snapshot().target,
        SessionTarget::Reps { count: 9 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_assignment_reports_to_collaborator_only() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 10 }),
        &[150, 250],
    );
    let assignment = Arc::new(RecordedAssignment::new("2 reps, stay low on the draw"));
    assert_eq!(h.engine.start_assignment(assignment.clone()).unwrap(), 2);

    sleep_ms(30_000).await;
    let completions = assignment.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].completion, CompletionReason::TargetReached);
    assert_eq!(
        completions[0].measurements,
        vec![
            RepMeasurement::Latency { ms: 150 },
            RepMeasurement::Latency { ms: 250 }
        ]
    );
    assert!(h.sink.reports().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_assignment_detaches_after_its_session() {
    use futures::{FutureExt, StreamExt};

    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 10 }),
        &[150, 250],
    );
    let mut results = h.engine.result_stream();
    let assignment = Arc::new(RecordedAssignment::new("1 rep before practice"));
    assert_eq!(h.engine.start_assignment(assignment.clone()).unwrap(), 1);
    sleep_ms(9500).await;
    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert_eq!(assignment.completions().len(), 1);

    // the follow-up session is self-directed
    h.engine.new_session().unwrap();
    h.engine.start().unwrap();
    sleep_ms(9500).await;

    assert_eq!(assignment.completions().len(), 1);
    let reports = h.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].measurements, vec![RepMeasurement::Latency { ms: 250 }]);
    assert_eq!(results.next().now_or_never().flatten(), reports.first().cloned());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_assignment_start_detaches() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 1 }),
        &[150, 250, 250, 250],
    );
    h.engine.start().unwrap();
    sleep_ms(9500).await;
    assert_eq!(h.engine.session_state(), SessionState::Finished);

    let assignment = Arc::new(RecordedAssignment::new("3 reps"));
    assert!(matches!(
        h.engine.start_assignment(assignment.clone()),
        Err(DrillError::InvalidTransition { .. })
    ));

    h.engine.new_session().unwrap();
    h.engine.start().unwrap();
    sleep_ms(40_000).await;

    assert!(assignment.completions().is_empty());
    assert_eq!(h.sink.reports().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_new_session_clears_measurements() {
    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 1 }),
        &[200, 220],
    );
    h.engine.start().unwrap();
    sleep_ms(9500).await;
    assert_eq!(h.engine.session_state(), SessionState::Finished);
    assert!(matches!(
        h.engine.start(),
        Err(DrillError::InvalidTransition { .. })
    ));

    h.engine.new_session().unwrap();
    assert!(h.engine.measurements().is_empty());
    h.engine.start().unwrap();
    sleep_ms(9500).await;
    assert_eq!(
        h.engine.measurements(),
        vec![RepMeasurement::Latency { ms: 220 }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_calibration_commits_roi_and_keeps_camera() {
    let h = harness(
        drill(DrillKind::Shooting, DrillMode::Release, SessionTarget::Reps { count: 1 }),
        &[],
    );
    let before = h.engine.drill_config().roi;
    h.engine.begin_calibration().unwrap();
    assert_eq!(h.engine.session_state(), SessionState::Calibration);
    assert!(h.engine.devices_held());

    h.engine.with_calibration(|c| c.move_by(32, 0)).unwrap();
    let committed = h.engine.commit_calibration().unwrap();
    assert!(committed.x > before.x);
    assert_eq!(h.engine.drill_config().roi, committed);
    assert_eq!(h.engine.session_state(), SessionState::Setup);

    h.engine.start().unwrap();
    assert_eq!(h.video.acquire_count(), 1);
    h.engine.abort();
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_stream_reports_transitions() {
    use futures::{FutureExt, StreamExt};

    let h = harness(
        drill(DrillKind::FaceOff, DrillMode::Release, SessionTarget::Reps { count: 1 }),
        &[100],
    );
    let mut stream = h.engine.snapshot_stream();
    h.engine.start().unwrap();
    sleep_ms(9000).await;

    let mut states = Vec::new();
    while let Some(Some(snapshot)) = stream.next().now_or_never() {
        if states.last() != Some(&snapshot.drill_state) {
            states.push(snapshot.drill_state);
        }
    }
    for expected in [
        DrillState::Starting,
        DrillState::Countdown,
        DrillState::Set,
        DrillState::Measuring,
        DrillState::Result,
        DrillState::Idle,
    ] {
        assert!(states.contains(&expected), "missing {:?} in {:?}", expected, states);
    }
}
