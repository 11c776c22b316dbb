//! DrillEngine: the rep state machine and session orchestration layer.
//!
//! One engine drives one athlete's session: it schedules the cue plan of
//! each rep, arms the motion detector at the whistle, records measurements
//! through the session manager and hands finished sessions to the
//! collaborators. Cue timers, the frame loop, the session clock and the
//! classification call are independent tokio tasks; each one carries the
//! epoch it was scheduled under and is ignored once teardown has bumped it.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::analysis::{
    encode_impact, Frame, MotionDetector, PlacementClassifier, PlacementDecision, ZoneGrid,
    ZoneIndex, ZoneResponse,
};
use crate::audio::{AudioCueEvent, CueBank, CueKind, CuePlan, CueScheduler, DelayDistribution};
use crate::calibration::{NormalizedRoi, RegionCalibration, Roi};
use crate::config::{AppConfig, DrillConfiguration, DrillKind, DrillMode, SessionTarget};
use crate::engine::backend::DrillDevices;
use crate::engine::collaborators::{
    parse_target_reps, AssignmentCollaborator, AssignmentReport, ResultSink,
};
use crate::engine::session::{
    CompletionReason, RepMeasurement, RepOutcome, SessionManager, SessionReport, SessionResult,
};
use crate::engine::state::{DrillState, SessionState};
use crate::error::{
    log_configuration_error, log_drill_error, ClassificationError, ConfigurationError, DrillError,
    ErrorCode,
};
use crate::managers::BroadcastChannelManager;

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// UI-facing view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillSnapshot {
    pub drill: DrillKind,
    pub mode: DrillMode,
    pub drill_state: DrillState,
    pub session_state: SessionState,
    /// Number currently shown by the countdown
    pub countdown: Option<u32>,
    pub status: String,
    pub reps_completed: usize,
    pub target: SessionTarget,
    /// Timed sessions only
    pub remaining_secs: Option<u32>,
    pub last_measurement: Option<RepMeasurement>,
    pub error: Option<String>,
}

/// Telemetry event emitted by the engine core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEventKind {
    SessionStarted { drill: DrillKind, mode: DrillMode },
    RepStarted { rep: usize, whistle_delay_ms: u64 },
    MotionTriggered { elapsed_ms: u64, score: f32 },
    MeasurementRecorded { measurement: RepMeasurement },
    ManualPlacementRequired,
    SessionFinished { reason: CompletionReason },
    Aborted,
    Error { code: i32 },
    Warning,
}

/// Collaborator call deferred until the engine lock is released
enum Delivery {
    Result(Arc<dyn ResultSink>, SessionReport),
    Assignment(Arc<dyn AssignmentCollaborator>, AssignmentReport),
}

struct EngineInner {
    drill_state: DrillState,
    session: SessionManager,
    drill_config: DrillConfiguration,
    calibration: Option<RegionCalibration>,
    scheduler: CueScheduler,
    detector: Option<MotionDetector>,
    /// Bumped by every teardown; callbacks from older epochs are dropped
    epoch: u64,
    countdown: Option<u32>,
    status: String,
    devices_held: bool,
    impact: Option<(Frame, Roi)>,
    assignment: Option<Arc<dyn AssignmentCollaborator>>,
    result_sink: Option<Arc<dyn ResultSink>>,
    rng: StdRng,
    last_error: Option<DrillError>,
    outbox: Vec<Delivery>,
}

struct Shared {
    config: AppConfig,
    devices: DrillDevices,
    cue_bank: CueBank,
    broadcasts: BroadcastChannelManager,
    inner: Mutex<EngineInner>,
    start_instant: Instant,
}

/// DrillEngine orchestrates one drill session over many reps.
pub struct DrillEngine {
    shared: Arc<Shared>,
}

impl DrillEngine {
    /// Create an engine for a validated drill configuration.
    pub fn new(
        config: AppConfig,
        drill_config: DrillConfiguration,
        devices: DrillDevices,
    ) -> Result<Self, ConfigurationError> {
        drill_config
            .validate(config.drills.get(drill_config.drill))
            .map_err(|err| {
                log_configuration_error(&err, "DrillEngine::new");
                err
            })?;

        let cue_bank = CueBank::from_config(&config.audio);
        let session = SessionManager::new(drill_config.target, config.session.guard_band_secs);
        let start_instant = devices.time_source.now();

        let inner = EngineInner {
            drill_state: DrillState::Idle,
            session,
            drill_config,
            calibration: None,
            scheduler: CueScheduler::new(),
            detector: None,
            epoch: 0,
            countdown: None,
            status: "Ready".to_string(),
            devices_held: false,
            impact: None,
            assignment: None,
            result_sink: None,
            rng: StdRng::from_entropy(),
            last_error: None,
            outbox: Vec::new(),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                devices,
                cue_bank,
                broadcasts: BroadcastChannelManager::initialized(),
                inner: Mutex::new(inner),
                start_instant,
            }),
        })
    }

    /// Make whistle-delay draws reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        self.shared.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_result_sink(self, sink: Arc<dyn ResultSink>) -> Self {
        self.shared.lock().result_sink = Some(sink);
        self
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Replace the drill configuration; rejected while a session is Running.
    pub fn configure(&self, drill_config: DrillConfiguration) -> Result<(), ConfigurationError> {
        let profile = self.shared.config.drills.get(drill_config.drill);
        drill_config.validate(profile)?;

        let mut inner = self.shared.lock();
        if !inner.session.state().is_editable() {
            return Err(ConfigurationError::LockedWhileRunning);
        }
        inner.session.configure(drill_config.target)?;
        inner.drill_config = drill_config;
        inner.detector = None;
        self.shared.publish_snapshot(&inner);
        Ok(())
    }

    /// Run the next session under a coach assignment.
    ///
    /// The rep target comes from the assignment notes ("25 shots"), falling
    /// back to the configured default when the notes carry no count.
    pub fn attach_assignment(
        &self,
        assignment: Arc<dyn AssignmentCollaborator>,
    ) -> Result<u32, ConfigurationError> {
        let count = parse_target_reps(&assignment.notes())
            .unwrap_or(self.shared.config.session.default_rep_target);

        let mut inner = self.shared.lock();
        if !inner.session.state().is_editable() {
            return Err(ConfigurationError::LockedWhileRunning);
        }
        let target = SessionTarget::Reps { count };
        inner.session.configure(target)?;
        inner.drill_config.target = target;
        inner.assignment = Some(assignment);
        log::info!("[DrillEngine] assignment attached, target {} reps", count);
        Ok(count)
    }

    pub fn detach_assignment(&self) {
        self.shared.lock().assignment = None;
    }

    pub fn drill_config(&self) -> DrillConfiguration {
        self.shared.lock().drill_config.clone()
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Open the camera and start positioning the ROI over the live preview.
    pub fn begin_calibration(&self) -> Result<(), DrillError> {
        let shared = &self.shared;
        shared.with_inner(|inner| {
            if inner.drill_state != DrillState::Idle {
                return Err(DrillError::AlreadyRunning);
            }
            inner.session.begin_calibration()?;

            if let Err(err) = shared.acquire_video(inner) {
                inner.session.halt();
                shared.enter_error(inner, err.clone());
                return Err(err);
            }
            let (width, height) = match shared.devices.video.resolution() {
                Some(resolution) => resolution,
                None => {
                    inner.session.halt();
                    shared.enter_error(inner, DrillError::VideoNotReady);
                    return Err(DrillError::VideoNotReady);
                }
            };

            inner.calibration = Some(RegionCalibration::new(width, height, inner.drill_config.roi));
            inner.status = "Position the target area".to_string();
            shared.publish_snapshot(inner);
            Ok(())
        })
    }

    /// Adjust the in-progress calibration.
    pub fn with_calibration<R>(
        &self,
        f: impl FnOnce(&mut RegionCalibration) -> R,
    ) -> Result<R, DrillError> {
        let mut inner = self.shared.lock();
        let from = inner.session.state();
        match inner.calibration.as_mut() {
            Some(calibration) => Ok(f(calibration)),
            None => Err(DrillError::InvalidTransition {
                from: from.to_string(),
                command: "adjust calibration".to_string(),
            }),
        }
    }

    /// Persist the calibrated ROI into the drill configuration.
    pub fn commit_calibration(&self) -> Result<NormalizedRoi, ConfigurationError> {
        let mut inner = self.shared.lock();
        let roi = inner
            .calibration
            .as_ref()
            .ok_or_else(|| ConfigurationError::InvalidRoi {
                reason: "no calibration in progress".to_string(),
            })?
            .finalize()?;

        inner.calibration = None;
        if let Err(err) = inner.session.end_calibration() {
            log_drill_error(&err, "commit_calibration");
        }
        inner.drill_config.roi = roi;
        inner.status = "Ready".to_string();
        log::info!(
            "[DrillEngine] ROI committed at ({:.3}, {:.3}) {:.3}x{:.3}",
            roi.x,
            roi.y,
            roi.width,
            roi.height
        );
        self.shared.publish_snapshot(&inner);
        Ok(roi)
    }

    /// Leave calibration without changing the ROI.
    pub fn cancel_calibration(&self) -> Result<(), DrillError> {
        let mut inner = self.shared.lock();
        inner.session.end_calibration()?;
        inner.calibration = None;
        self.shared.publish_snapshot(&inner);
        Ok(())
    }

    // ========================================================================
    // SESSION CONTROL
    // ========================================================================

    /// Start a session.
    ///
    /// Must be called from within a tokio runtime. Camera and audio are
    /// acquired if not already held; a failure moves the engine to Error.
    pub fn start(&self) -> Result<(), DrillError> {
        let shared = &self.shared;
        shared.with_inner(|inner| shared.start_session(inner))
    }

    /// Attach an assignment and start its session.
    pub fn start_assignment(
        &self,
        assignment: Arc<dyn AssignmentCollaborator>,
    ) -> Result<u32, DrillError> {
        let count = self.attach_assignment(assignment).map_err(|err| {
            log_configuration_error(&err, "start_assignment");
            match err {
                ConfigurationError::LockedWhileRunning => DrillError::AlreadyRunning,
                other => DrillError::InvalidTransition {
                    from: self.session_state().to_string(),
                    command: format!("start assignment ({})", other.message()),
                },
            }
        })?;
        if let Err(err) = self.start() {
            self.detach_assignment();
            return Err(err);
        }
        Ok(count)
    }

    /// Cancel everything and return to Idle. Idempotent.
    pub fn abort(&self) {
        let shared = &self.shared;
        shared.with_inner(|inner| {
            let was_active = inner.drill_state.is_active() || inner.devices_held;
            shared.teardown(inner);
            inner.session.halt();
            inner.calibration = None;
            inner.drill_state = DrillState::Idle;
            if was_active {
                inner.status = "Aborted".to_string();
                log::info!("[DrillEngine] session aborted");
                shared.emit(TelemetryEventKind::Aborted, None);
            }
            shared.publish_snapshot(inner);
        });
    }

    /// Leave Error; equivalent to abort that also clears the error.
    pub fn reset(&self) {
        self.abort();
        let mut inner = self.shared.lock();
        inner.last_error = None;
        inner.status = "Ready".to_string();
        self.shared.publish_snapshot(&inner);
    }

    /// Discard all measurements and any attached assignment; not allowed while
    /// Running.
    pub fn new_session(&self) -> Result<(), DrillError> {
        let mut inner = self.shared.lock();
        if inner.drill_state.is_active() {
            return Err(DrillError::AlreadyRunning);
        }
        inner.session.new_session()?;
        inner.assignment = None;
        inner.impact = None;
        inner.status = "Ready".to_string();
        self.shared.publish_snapshot(&inner);
        Ok(())
    }

    // ========================================================================
    // MANUAL PLACEMENT
    // ========================================================================

    /// Record the zone the operator picked while in LogShot.
    pub fn log_zone(&self, zone: ZoneIndex) -> Result<(), DrillError> {
        let shared = &self.shared;
        shared.with_inner(|inner| {
            if inner.drill_state != DrillState::LogShot {
                return Err(DrillError::InvalidTransition {
                    from: inner.drill_state.to_string(),
                    command: "log zone".to_string(),
                });
            }
            shared.transition(inner, DrillState::Result);
            shared.record_measurement(inner, RepMeasurement::Zone { zone });
            Ok(())
        })
    }

    /// Record the zone under a tap on the impact frame (frame coordinates).
    pub fn log_zone_at(&self, x: u32, y: u32) -> Result<ZoneIndex, DrillError> {
        let zone = {
            let inner = self.shared.lock();
            let (_, roi) = inner.impact.as_ref().ok_or_else(|| DrillError::InvalidZone {
                details: "no impact frame to tap on".to_string(),
            })?;
            ZoneGrid::new(*roi)
                .zone_at(x, y)
                .ok_or_else(|| DrillError::InvalidZone {
                    details: format!("tap ({}, {}) is outside the target area", x, y),
                })?
        };
        self.log_zone(zone)?;
        Ok(zone)
    }

    /// Latest impact still and the ROI it was measured in.
    pub fn impact_frame(&self) -> Option<(Frame, Roi)> {
        self.shared.lock().impact.clone()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn snapshot(&self) -> DrillSnapshot {
        let inner = self.shared.lock();
        self.shared.snapshot_of(&inner)
    }

    pub fn drill_state(&self) -> DrillState {
        self.shared.lock().drill_state
    }

    pub fn session_state(&self) -> SessionState {
        self.shared.lock().session.state()
    }

    pub fn measurements(&self) -> Vec<RepMeasurement> {
        self.shared.lock().session.measurements().to_vec()
    }

    pub fn result(&self) -> Option<SessionResult> {
        let inner = self.shared.lock();
        inner.session.result(inner.drill_config.mode)
    }

    pub fn last_error(&self) -> Option<DrillError> {
        self.shared.lock().last_error.clone()
    }

    /// Live timers, including the frame loop and session clock.
    pub fn pending_timers(&self) -> usize {
        self.shared.lock().scheduler.pending()
    }

    pub fn devices_held(&self) -> bool {
        self.shared.lock().devices_held
    }
}

impl Drop for DrillEngine {
    fn drop(&mut self) {
        self.abort();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("[DrillEngine] engine lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` under the lock, then deliver queued collaborator calls.
    fn with_inner<R>(&self, f: impl FnOnce(&mut EngineInner) -> R) -> R {
        let (result, outbox) = {
            let mut inner = self.lock();
            let result = f(&mut inner);
            (result, std::mem::take(&mut inner.outbox))
        };
        for delivery in outbox {
            let outcome = match delivery {
                Delivery::Result(sink, report) => sink.save(&report),
                Delivery::Assignment(assignment, report) => assignment.on_complete(report),
            };
            if let Err(err) = outcome {
                log::error!("[DrillEngine] collaborator delivery failed: {:#}", err);
                self.emit(TelemetryEventKind::Warning, Some(err.to_string()));
            }
        }
        result
    }

    fn uptime_ms(&self) -> u64 {
        self.devices
            .time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }

    fn emit(&self, kind: TelemetryEventKind, detail: Option<String>) {
        self.broadcasts.publish_telemetry(TelemetryEvent {
            timestamp_ms: self.uptime_ms(),
            kind,
            detail,
        });
    }

    fn snapshot_of(&self, inner: &EngineInner) -> DrillSnapshot {
        DrillSnapshot {
            drill: inner.drill_config.drill,
            mode: inner.drill_config.mode,
            drill_state: inner.drill_state,
            session_state: inner.session.state(),
            countdown: inner.countdown,
            status: inner.status.clone(),
            reps_completed: inner.session.measurements().len(),
            target: inner.session.target(),
            remaining_secs: inner.session.remaining_secs(),
            last_measurement: inner.session.measurements().last().copied(),
            error: inner.last_error.as_ref().map(|err| err.message()),
        }
    }

    fn publish_snapshot(&self, inner: &EngineInner) {
        self.broadcasts.publish_snapshot(self.snapshot_of(inner));
    }

    fn transition(&self, inner: &mut EngineInner, next: DrillState) -> bool {
        if !inner.drill_state.can_transition_to(next) {
            log::warn!(
                "[DrillEngine] ignoring transition {} -> {}",
                inner.drill_state,
                next
            );
            return false;
        }
        log::debug!("[DrillEngine] {} -> {}", inner.drill_state, next);
        inner.drill_state = next;
        self.publish_snapshot(inner);
        true
    }

    fn acquire_video(&self, inner: &mut EngineInner) -> Result<(), DrillError> {
        if inner.devices_held {
            return Ok(());
        }
        self.devices.video.acquire()?;
        inner.devices_held = true;
        Ok(())
    }

    fn acquire_devices(&self, inner: &mut EngineInner) -> Result<(), DrillError> {
        self.acquire_video(inner)?;
        self.devices.audio.open()?;
        if let Err(err) = self.devices.audio.resume() {
            log_drill_error(&err, "resume audio");
        }
        Ok(())
    }

    /// Cancel every timer, invalidate pending callbacks and release devices.
    fn teardown(&self, inner: &mut EngineInner) {
        let cancelled = inner.scheduler.cancel_all();
        inner.epoch += 1;
        inner.detector = None;
        inner.countdown = None;
        if inner.devices_held {
            self.devices.video.release();
            self.devices.audio.close();
            inner.devices_held = false;
        }
        log::debug!(
            "[DrillEngine] teardown: {} callbacks cancelled, epoch {}",
            cancelled,
            inner.epoch
        );
    }

    fn enter_error(&self, inner: &mut EngineInner, err: DrillError) {
        log_drill_error(&err, "DrillEngine");
        self.teardown(inner);
        inner.session.halt();
        inner.drill_state = DrillState::Error;
        inner.status = err.message();
        self.emit(TelemetryEventKind::Error { code: err.code() }, Some(err.message()));
        inner.last_error = Some(err);
        self.publish_snapshot(inner);
    }
}

// Session flow. These take `self: &Arc<Self>` so scheduled callbacks can hold
// a weak handle back to the engine.
impl Shared {
    fn start_session(self: &Arc<Self>, inner: &mut EngineInner) -> Result<(), DrillError> {
        match inner.drill_state {
            DrillState::Idle => {}
            DrillState::Error => {
                return Err(DrillError::InvalidTransition {
                    from: DrillState::Error.to_string(),
                    command: "start".to_string(),
                })
            }
            _ => return Err(DrillError::AlreadyRunning),
        }
        inner.calibration = None;
        inner.session.begin()?;
        self.transition(inner, DrillState::Starting);

        if let Err(err) = self.acquire_devices(inner) {
            self.enter_error(inner, err.clone());
            return Err(err);
        }

        let drill = inner.drill_config.drill;
        let mode = inner.drill_config.mode;
        log::info!(
            "[DrillEngine] starting {} {} session, target {:?}",
            drill,
            mode,
            inner.session.target()
        );
        self.emit(TelemetryEventKind::SessionStarted { drill, mode }, None);

        if let SessionTarget::Timed { .. } = inner.session.target() {
            self.start_clock(inner);
        }
        if let Err(err) = self.begin_rep(inner) {
            self.enter_error(inner, err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn start_clock(self: &Arc<Self>, inner: &mut EngineInner) {
        let weak = Arc::downgrade(self);
        let epoch = inner.epoch;
        let period = Duration::from_millis(self.config.session.clock_tick_ms.max(1));
        inner.scheduler.track(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                if !shared.on_clock_tick(epoch) {
                    break;
                }
            }
        });
    }

    /// Schedule the cue plan of the next rep; state must already be Starting.
    fn begin_rep(self: &Arc<Self>, inner: &mut EngineInner) -> Result<(), DrillError> {
        let profile = self.config.drills.get(inner.drill_config.drill);
        let whistle_delay_ms = inner.drill_config.timing.whistle.sample_ms(&mut inner.rng);
        let plan = CuePlan::build(
            profile,
            inner.drill_config.timing.pre_start_delay_ms,
            whistle_delay_ms,
        );

        inner.detector = Some(MotionDetector::new(
            inner.drill_config.sensitivity_threshold,
            inner.drill_config.roi,
        ));
        inner.impact = None;
        inner.countdown = None;
        inner.status = "Get ready".to_string();

        let weak: Weak<Shared> = Arc::downgrade(self);
        let epoch = inner.epoch;
        inner
            .scheduler
            .schedule_plan(&plan, tokio::time::Instant::now(), move |event| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_cue(epoch, event);
                }
            })?;

        let rep = inner.session.measurements().len() + 1;
        log::debug!(
            "[DrillEngine] rep {} scheduled, whistle at +{} ms",
            rep,
            plan.whistle_offset_ms().unwrap_or(0)
        );
        self.emit(
            TelemetryEventKind::RepStarted {
                rep,
                whistle_delay_ms,
            },
            None,
        );
        self.publish_snapshot(inner);
        Ok(())
    }

    fn play_cue(&self, event: &AudioCueEvent) {
        let clip = self.cue_bank.clip_for(&event.kind);
        if let Err(err) = self.devices.audio.play(event.kind, clip) {
            log_drill_error(&err, "play cue");
        }
        self.broadcasts.publish_cue(*event);
    }

    fn on_cue(self: &Arc<Self>, epoch: u64, event: AudioCueEvent) {
        self.with_inner(|inner| {
            if inner.epoch != epoch {
                return;
            }
            match event.kind {
                CueKind::CountdownTick { remaining } => {
                    if inner.drill_state == DrillState::Starting {
                        self.transition(inner, DrillState::Countdown);
                    }
                    inner.countdown = Some(remaining);
                    inner.status = remaining.to_string();
                    self.play_cue(&event);
                    self.publish_snapshot(inner);
                }
                CueKind::Set { audible } => {
                    inner.countdown = None;
                    inner.status = "Set".to_string();
                    if audible {
                        self.play_cue(&event);
                    } else {
                        self.broadcasts.publish_cue(event);
                    }
                    self.transition(inner, DrillState::Set);
                }
                CueKind::Whistle => self.on_whistle(inner, event),
            }
        });
    }

    /// Whistle and arming are one step under the lock: either both happen or,
    /// after an abort, neither does.
    fn on_whistle(self: &Arc<Self>, inner: &mut EngineInner, event: AudioCueEvent) {
        let video = Arc::clone(&self.devices.video);
        let frame = if video.is_ready() {
            video.current_frame()
        } else {
            None
        };
        let Some(frame) = frame else {
            self.enter_error(inner, DrillError::VideoNotReady);
            return;
        };

        self.play_cue(&event);
        let now = self.devices.time_source.now();
        if let Some(detector) = inner.detector.as_mut() {
            detector.arm(&frame, now);
        }
        inner.status = "Go".to_string();
        self.transition(inner, DrillState::Measuring);

        let weak = Arc::downgrade(self);
        let epoch = inner.epoch;
        inner.scheduler.set_frame_loop(async move {
            while let Some(frame) = video.next_frame().await {
                let Some(shared) = weak.upgrade() else { break };
                if !shared.on_frame(epoch, frame) {
                    break;
                }
            }
        });
    }

    /// Returns false once the loop should stop.
    fn on_frame(self: &Arc<Self>, epoch: u64, frame: Frame) -> bool {
        self.with_inner(|inner| {
            if inner.epoch != epoch || inner.drill_state != DrillState::Measuring {
                return false;
            }
            let now = self.devices.time_source.now();
            let Some(detector) = inner.detector.as_mut() else {
                return false;
            };
            let Some(trigger) = detector.process(&frame, now) else {
                return true;
            };
            let roi = detector.active_roi();

            log::debug!(
                "[DrillEngine] motion after {} ms (score {:.2})",
                trigger.elapsed_ms(),
                trigger.score
            );
            self.emit(
                TelemetryEventKind::MotionTriggered {
                    elapsed_ms: trigger.elapsed_ms(),
                    score: trigger.score,
                },
                None,
            );
            self.transition(inner, DrillState::Result);

            match inner.drill_config.mode {
                DrillMode::Release => {
                    inner.status = format!("{} ms", trigger.elapsed_ms());
                    self.record_measurement(
                        inner,
                        RepMeasurement::Latency {
                            ms: trigger.elapsed_ms(),
                        },
                    );
                }
                DrillMode::Placement => {
                    let roi = roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
                    inner.impact = Some((frame.clone(), roi));
                    self.classify_impact(inner, &frame, roi);
                }
            }
            false
        })
    }

    fn classify_impact(self: &Arc<Self>, inner: &mut EngineInner, frame: &Frame, roi: Roi) {
        let classifier =
            PlacementClassifier::new(self.devices.classifier.clone(), inner.drill_config.auto_classify);
        let Some(service) = classifier.service() else {
            self.require_manual(inner, ClassificationError::Unavailable);
            return;
        };
        let png = match encode_impact(frame, roi) {
            Ok(png) => png,
            Err(err) => {
                self.require_manual(inner, err);
                return;
            }
        };

        inner.status = "Classifying shot".to_string();
        self.publish_snapshot(inner);
        let weak = Arc::downgrade(self);
        let epoch = inner.epoch;
        inner.scheduler.track(async move {
            let response = service.classify(png).await;
            if let Some(shared) = weak.upgrade() {
                shared.on_classification(epoch, response);
            }
        });
    }

    fn on_classification(
        self: &Arc<Self>,
        epoch: u64,
        response: Result<ZoneResponse, ClassificationError>,
    ) {
        self.with_inner(|inner| {
            if inner.epoch != epoch || inner.drill_state != DrillState::Result {
                return;
            }
            match PlacementClassifier::resolve(response) {
                PlacementDecision::Automatic(zone) => {
                    inner.status = format!("Zone {}", zone);
                    self.record_measurement(inner, RepMeasurement::Zone { zone });
                }
                PlacementDecision::Manual { reason } => self.require_manual(inner, reason),
            }
        });
    }

    fn require_manual(&self, inner: &mut EngineInner, reason: ClassificationError) {
        inner.status = reason.message();
        self.emit(TelemetryEventKind::ManualPlacementRequired, Some(reason.message()));
        self.transition(inner, DrillState::LogShot);
    }

    /// Append a measurement (state is Result) and continue or finish.
    fn record_measurement(self: &Arc<Self>, inner: &mut EngineInner, measurement: RepMeasurement) {
        let outcome = match inner.session.record(measurement) {
            Ok(outcome) => outcome,
            Err(err) => {
                log_drill_error(&err, "record measurement");
                return;
            }
        };
        self.emit(TelemetryEventKind::MeasurementRecorded { measurement }, None);

        match outcome {
            RepOutcome::Complete(reason) => self.finish_session(inner, reason),
            RepOutcome::Continue => {
                let weak = Arc::downgrade(self);
                let epoch = inner.epoch;
                let delay = Duration::from_millis(inner.drill_config.timing.inter_rep_delay_ms);
                inner.scheduler.schedule_after(delay, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_next_rep(epoch);
                    }
                });
                self.publish_snapshot(inner);
            }
        }
    }

    fn on_next_rep(self: &Arc<Self>, epoch: u64) {
        self.with_inner(|inner| {
            if inner.epoch != epoch || inner.drill_state != DrillState::Result {
                return;
            }
            self.transition(inner, DrillState::Starting);
            if let Err(err) = self.begin_rep(inner) {
                self.enter_error(inner, err);
            }
        });
    }

    /// Returns false once the clock should stop.
    fn on_clock_tick(self: &Arc<Self>, epoch: u64) -> bool {
        self.with_inner(|inner| {
            if inner.epoch != epoch {
                return false;
            }
            match inner.session.tick_second() {
                Some(reason) => {
                    self.finish_session(inner, reason);
                    false
                }
                None => {
                    self.publish_snapshot(inner);
                    inner.session.state() == SessionState::Running
                }
            }
        })
    }

    /// Tear down and hand the session to its collaborator.
    fn finish_session(&self, inner: &mut EngineInner, reason: CompletionReason) {
        self.teardown(inner);
        inner.drill_state = DrillState::Idle;
        inner.status = "Session complete".to_string();

        let mode = inner.drill_config.mode;
        let measurements = inner.session.measurements().to_vec();
        // an assignment covers exactly one session
        match inner.assignment.take() {
            Some(assignment) => {
                inner.outbox.push(Delivery::Assignment(
                    assignment,
                    AssignmentReport {
                        completion: reason,
                        measurements,
                    },
                ));
            }
            None => {
                let report = SessionReport {
                    drill: inner.drill_config.drill,
                    mode,
                    target: inner.session.target(),
                    completion: reason,
                    result: inner.session.result(mode),
                    measurements,
                };
                self.broadcasts.publish_result(report.clone());
                if let Some(sink) = inner.result_sink.clone() {
                    inner.outbox.push(Delivery::Result(sink, report));
                }
            }
        }

        self.emit(TelemetryEventKind::SessionFinished { reason }, None);
        self.publish_snapshot(inner);
    }
}

#[cfg(test)]
mod tests;
