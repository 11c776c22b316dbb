use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::analysis::Frame;
use crate::audio::{CueClip, CueKind};
use crate::calibration::Roi;
use crate::error::DrillError;

use super::{AudioOutput, VideoSource};

/// Synthetic camera used for deterministic testing and CLI tooling.
///
/// Frames are a flat grey field produced every `frame_interval`. Each call
/// to `current_frame()` (the engine's arm step) pops the next scripted
/// reaction delay; once it elapses, frames show a bright block covering the
/// left half of the picture until the next arm.
pub struct StubVideoSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    still: Frame,
    moved: Frame,
    state: Mutex<StubVideoState>,
}

#[derive(Default)]
struct StubVideoState {
    acquired: bool,
    ready_override: Option<bool>,
    acquire_failure: Option<String>,
    reactions: VecDeque<Duration>,
    motion_at: Option<Instant>,
    acquire_count: usize,
    release_count: usize,
}

impl StubVideoSource {
    pub fn new(width: u32, height: u32, frame_interval: Duration) -> Self {
        let still = Frame::filled(width, height, [96, 96, 96]);
        let moved = still.with_block(Roi::new(0, 0, (width / 2).max(1), height), [240, 240, 240]);
        Self {
            width,
            height,
            frame_interval,
            still,
            moved,
            state: Mutex::new(StubVideoState::default()),
        }
    }

    /// 640x480 at ~30 fps
    pub fn vga() -> Self {
        Self::new(640, 480, Duration::from_millis(33))
    }

    /// Queue reaction delays, one per arm
    pub fn with_reactions(self, reactions: impl IntoIterator<Item = Duration>) -> Self {
        self.lock().reactions.extend(reactions);
        self
    }

    /// Make `acquire()` fail with the given reason
    pub fn failing(self, reason: &str) -> Self {
        self.lock().acquire_failure = Some(reason.to_string());
        self
    }

    /// Force readiness regardless of acquisition; None restores normal behavior
    pub fn set_ready_override(&self, ready: Option<bool>) {
        self.lock().ready_override = ready;
    }

    /// Start showing motion now
    pub fn trigger_motion(&self) {
        self.lock().motion_at = Some(Instant::now());
    }

    pub fn is_acquired(&self) -> bool {
        self.lock().acquired
    }

    pub fn acquire_count(&self) -> usize {
        self.lock().acquire_count
    }

    pub fn release_count(&self) -> usize {
        self.lock().release_count
    }

    fn lock(&self) -> MutexGuard<'_, StubVideoState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn frame_at(&self, now: Instant) -> Frame {
        match self.lock().motion_at {
            Some(at) if now >= at => self.moved.clone(),
            _ => self.still.clone(),
        }
    }
}

impl Default for StubVideoSource {
    fn default() -> Self {
        Self::vga()
    }
}

impl VideoSource for StubVideoSource {
    fn acquire(&self) -> Result<(), DrillError> {
        let mut state = self.lock();
        if let Some(reason) = state.acquire_failure.clone() {
            return Err(DrillError::CameraUnavailable { reason });
        }
        state.acquired = true;
        state.acquire_count += 1;
        Ok(())
    }

    fn release(&self) {
        let mut state = self.lock();
        if state.acquired {
            state.acquired = false;
            state.release_count += 1;
        }
        state.motion_at = None;
    }

    fn is_ready(&self) -> bool {
        let state = self.lock();
        state.ready_override.unwrap_or(state.acquired)
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        if self.is_ready() {
            Some((self.width, self.height))
        } else {
            None
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        let mut state = self.lock();
        if !state.ready_override.unwrap_or(state.acquired) {
            return None;
        }
        state.motion_at = state.reactions.pop_front().map(|delay| Instant::now() + delay);
        Some(self.still.clone())
    }

    fn next_frame(&self) -> BoxFuture<'_, Option<Frame>> {
        Box::pin(async move {
            tokio::time::sleep(self.frame_interval).await;
            if !self.lock().acquired {
                return None;
            }
            Some(self.frame_at(Instant::now()))
        })
    }
}

/// Silent speaker recording every cue with its virtual timestamp.
pub struct StubAudioOutput {
    state: Mutex<StubAudioState>,
}

#[derive(Default)]
struct StubAudioState {
    open: bool,
    open_failure: Option<String>,
    played: Vec<(CueKind, Instant)>,
    resume_count: usize,
}

impl StubAudioOutput {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubAudioState::default()),
        }
    }

    /// Make `open()` fail with the given reason
    pub fn failing(reason: &str) -> Self {
        let output = Self::new();
        output.lock().open_failure = Some(reason.to_string());
        output
    }

    pub fn played(&self) -> Vec<(CueKind, Instant)> {
        self.lock().played.clone()
    }

    pub fn played_kinds(&self) -> Vec<CueKind> {
        self.lock().played.iter().map(|(kind, _)| *kind).collect()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn resume_count(&self) -> usize {
        self.lock().resume_count
    }

    fn lock(&self) -> MutexGuard<'_, StubAudioState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StubAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for StubAudioOutput {
    fn open(&self) -> Result<(), DrillError> {
        let mut state = self.lock();
        if let Some(reason) = state.open_failure.clone() {
            return Err(DrillError::AudioDeviceUnavailable { reason });
        }
        state.open = true;
        Ok(())
    }

    fn play(&self, kind: CueKind, clip: &CueClip) -> Result<(), DrillError> {
        let mut state = self.lock();
        if !state.open {
            return Err(DrillError::AudioDeviceUnavailable {
                reason: "output not open".to_string(),
            });
        }
        log::trace!(
            "[StubAudioOutput] {} ({} ms clip)",
            kind.label(),
            clip.duration_ms()
        );
        state.played.push((kind, Instant::now()));
        Ok(())
    }

    fn resume(&self) -> Result<(), DrillError> {
        self.lock().resume_count += 1;
        Ok(())
    }

    fn close(&self) {
        self.lock().open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::mean_abs_diff;
    use crate::analysis::roi_luminance;

    #[tokio::test(start_paused = true)]
    async fn test_scripted_reaction_changes_frames() {
        let video = StubVideoSource::new(64, 48, Duration::from_millis(33))
            .with_reactions([Duration::from_millis(200)]);
        video.acquire().unwrap();
        let reference = video.current_frame().unwrap();
        let roi = Roi::full(64, 48);

        let early = video.next_frame().await.unwrap();
        assert_eq!(
            mean_abs_diff(&roi_luminance(&reference, roi), &roi_luminance(&early, roi)),
            0.0
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        let late = video.next_frame().await.unwrap();
        assert!(mean_abs_diff(&roi_luminance(&reference, roi), &roi_luminance(&late, roi)) > 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_source_yields_nothing() {
        let video = StubVideoSource::vga();
        assert!(video.current_frame().is_none());
        assert!(!video.is_ready());
        video.acquire().unwrap();
        assert!(video.is_ready());
        video.release();
        assert!(video.next_frame().await.is_none());
        assert_eq!(video.release_count(), 1);
    }

    #[test]
    fn test_failures_surface_as_acquisition_errors() {
        let video = StubVideoSource::vga().failing("denied");
        assert!(video.acquire().unwrap_err().is_acquisition());
        let audio = StubAudioOutput::failing("no device");
        assert!(audio.open().unwrap_err().is_acquisition());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stub_audio_records_cues() {
        let audio = StubAudioOutput::new();
        let clip = CueClip::new(vec![0.0; 480], 48000);
        assert!(audio.play(CueKind::Whistle, &clip).is_err());
        audio.open().unwrap();
        audio.play(CueKind::Whistle, &clip).unwrap();
        assert_eq!(audio.played_kinds(), vec![CueKind::Whistle]);
    }
}
