use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{DrillEngine, DrillSnapshot, TelemetryEvent};
use crate::audio::AudioCueEvent;
use crate::config::AppConfig;
use crate::engine::session::SessionReport;

/// Drop lagged-receiver errors; subscribers only see delivered values.
fn delivered<T: Clone + Send + 'static>(
    receiver: Option<broadcast::Receiver<T>>,
) -> impl Stream<Item = T> + Unpin {
    futures::stream::iter(receiver)
        .flat_map(BroadcastStream::new)
        .filter_map(|item| futures::future::ready(item.ok()))
}

impl DrillEngine {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_snapshots(&self) -> Option<broadcast::Receiver<DrillSnapshot>> {
        self.shared.broadcasts.subscribe_snapshots()
    }

    pub fn subscribe_results(&self) -> Option<broadcast::Receiver<SessionReport>> {
        self.shared.broadcasts.subscribe_results()
    }

    pub fn subscribe_cues(&self) -> Option<broadcast::Receiver<AudioCueEvent>> {
        self.shared.broadcasts.subscribe_cues()
    }

    pub fn subscribe_telemetry(&self) -> Option<broadcast::Receiver<TelemetryEvent>> {
        self.shared.broadcasts.subscribe_telemetry()
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub fn snapshot_stream(&self) -> impl Stream<Item = DrillSnapshot> + Unpin {
        delivered(self.subscribe_snapshots())
    }

    pub fn result_stream(&self) -> impl Stream<Item = SessionReport> + Unpin {
        delivered(self.subscribe_results())
    }

    pub fn cue_stream(&self) -> impl Stream<Item = AudioCueEvent> + Unpin {
        delivered(self.subscribe_cues())
    }

    pub fn telemetry_stream(&self) -> impl Stream<Item = TelemetryEvent> + Unpin {
        delivered(self.subscribe_telemetry())
    }

    // ========================================================================
    // TOOLING HELPERS
    // ========================================================================

    /// Milliseconds elapsed since the engine was created (used for telemetry).
    pub fn uptime_ms(&self) -> u64 {
        self.shared.uptime_ms()
    }

    /// Snapshot the app configuration (tooling helper).
    pub fn config_snapshot(&self) -> AppConfig {
        self.shared.config.clone()
    }
}
