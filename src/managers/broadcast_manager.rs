// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::audio::AudioCueEvent;
use crate::engine::session::SessionReport;
use crate::engine::{DrillSnapshot, TelemetryEvent};

type Slot<T> = Arc<Mutex<Option<broadcast::Sender<T>>>>;

/// Manages all tokio broadcast channels
///
/// Single Responsibility: Broadcast channel lifecycle and subscription
///
/// This manager centralizes all broadcast channel creation, storage, and
/// subscription handling. It provides a clean interface for:
/// - Initializing broadcast channels with appropriate buffer sizes
/// - Subscribing to broadcast channels for multiple consumers
/// - Publishing without caring whether anyone listens
///
/// # Channel Types
/// - Snapshots: drill/session state, countdown value and status text for the UI
/// - Results: final session reports of self-directed sessions
/// - Cues: every audio cue as it fires
/// - Telemetry: lifecycle events and warnings
pub struct BroadcastChannelManager {
    snapshots: Slot<DrillSnapshot>,
    results: Slot<SessionReport>,
    cues: Slot<AudioCueEvent>,
    telemetry: Slot<TelemetryEvent>,
}

fn lock<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<broadcast::Sender<T>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn init<T: Clone>(slot: &Slot<T>, capacity: usize) -> broadcast::Sender<T> {
    let (tx, _) = broadcast::channel(capacity);
    *lock(slot) = Some(tx.clone());
    tx
}

fn subscribe<T: Clone>(slot: &Slot<T>) -> Option<broadcast::Receiver<T>> {
    lock(slot).as_ref().map(|tx| tx.subscribe())
}

/// Send if initialized; returns false when nobody received it
fn publish<T: Clone>(slot: &Slot<T>, value: T) -> bool {
    lock(slot)
        .as_ref()
        .map(|tx| tx.send(value).is_ok())
        .unwrap_or(false)
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(None)),
            results: Arc::new(Mutex::new(None)),
            cues: Arc::new(Mutex::new(None)),
            telemetry: Arc::new(Mutex::new(None)),
        }
    }

    /// Manager with every channel initialized
    pub fn initialized() -> Self {
        let manager = Self::new();
        manager.init_snapshots();
        manager.init_results();
        manager.init_cues();
        manager.init_telemetry();
        manager
    }

    // ========================================================================
    // SNAPSHOT CHANNEL
    // ========================================================================

    /// Initialize snapshot broadcast channel
    ///
    /// # Notes
    /// - Buffer size: 64 messages (one per state change plus 1 Hz clock ticks)
    /// - Lagging subscribers skip to the newest snapshot
    pub fn init_snapshots(&self) -> broadcast::Sender<DrillSnapshot> {
        init(&self.snapshots, 64)
    }

    /// Subscribe to snapshots; None if init_snapshots() was not called
    pub fn subscribe_snapshots(&self) -> Option<broadcast::Receiver<DrillSnapshot>> {
        subscribe(&self.snapshots)
    }

    pub fn publish_snapshot(&self, snapshot: DrillSnapshot) -> bool {
        publish(&self.snapshots, snapshot)
    }

    // ========================================================================
    // RESULT CHANNEL
    // ========================================================================

    /// Initialize session result channel
    ///
    /// # Notes
    /// - Buffer size: 8 messages (one per finished session)
    pub fn init_results(&self) -> broadcast::Sender<SessionReport> {
        init(&self.results, 8)
    }

    pub fn subscribe_results(&self) -> Option<broadcast::Receiver<SessionReport>> {
        subscribe(&self.results)
    }

    pub fn publish_result(&self, report: SessionReport) -> bool {
        publish(&self.results, report)
    }

    // ========================================================================
    // CUE CHANNEL
    // ========================================================================

    /// Initialize cue channel
    ///
    /// # Notes
    /// - Buffer size: 32 messages (a rep fires at most ticks + 2 cues)
    pub fn init_cues(&self) -> broadcast::Sender<AudioCueEvent> {
        init(&self.cues, 32)
    }

    pub fn subscribe_cues(&self) -> Option<broadcast::Receiver<AudioCueEvent>> {
        subscribe(&self.cues)
    }

    pub fn publish_cue(&self, event: AudioCueEvent) -> bool {
        publish(&self.cues, event)
    }

    // ========================================================================
    // TELEMETRY CHANNEL
    // ========================================================================

    /// Initialize telemetry channel
    ///
    /// # Notes
    /// - Buffer size: 128 messages
    /// - Not part of the timing-critical path
    pub fn init_telemetry(&self) -> broadcast::Sender<TelemetryEvent> {
        init(&self.telemetry, 128)
    }

    pub fn subscribe_telemetry(&self) -> Option<broadcast::Receiver<TelemetryEvent>> {
        subscribe(&self.telemetry)
    }

    pub fn publish_telemetry(&self, event: TelemetryEvent) -> bool {
        publish(&self.telemetry, event)
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
