//! CueScheduler - cancellable timer set for cues and drill callbacks.
//!
//! Every cue in a plan gets its own tokio task sleeping until
//! `origin + offset`, so each one can be cancelled individually. Auxiliary
//! timers (inter-rep delay, session clock, classification call) and the
//! single frame loop are tracked in the same set so one `cancel_all()`
//! tears everything down.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio::cues::{AudioCueEvent, CuePlan};
use crate::error::DrillError;

/// Identifier of a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Cue,
    Aux,
}

struct ScheduledTimer {
    id: TimerId,
    kind: TimerKind,
    handle: JoinHandle<()>,
}

/// Owns every pending timer handle of the active session
pub struct CueScheduler {
    timers: Vec<ScheduledTimer>,
    frame_loop: Option<JoinHandle<()>>,
    next_id: u64,
}

impl CueScheduler {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            frame_loop: None,
            next_id: 0,
        }
    }

    /// Schedule every cue of `plan` relative to `origin`
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `DrillError::CuesPending` if cues from a previous plan are still live;
    /// the caller must cancel them first.
    pub fn schedule_plan<F>(
        &mut self,
        plan: &CuePlan,
        origin: Instant,
        on_fire: F,
    ) -> Result<Vec<TimerId>, DrillError>
    where
        F: Fn(AudioCueEvent) + Send + Sync + 'static,
    {
        self.prune_finished();
        let pending = self.pending_cues();
        if pending > 0 {
            return Err(DrillError::CuesPending { pending });
        }

        let on_fire = Arc::new(on_fire);
        let ids = plan
            .events()
            .iter()
            .map(|&event| {
                let on_fire = Arc::clone(&on_fire);
                let deadline = origin + event.offset();
                self.spawn(TimerKind::Cue, async move {
                    tokio::time::sleep_until(deadline).await;
                    on_fire(event);
                })
            })
            .collect();

        log::debug!("[CueScheduler] scheduled {} cues", plan.len());
        Ok(ids)
    }

    /// Run `callback` once after `delay`
    pub fn schedule_after<F>(&mut self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(TimerKind::Aux, async move {
            tokio::time::sleep(delay).await;
            callback();
        })
    }

    /// Track an arbitrary task (session clock, classification call)
    pub fn track<Fut>(&mut self, future: Fut) -> TimerId
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(TimerKind::Aux, future)
    }

    /// Install the frame loop; any previous loop is aborted first so at most
    /// one loop is ever alive.
    pub fn set_frame_loop<Fut>(&mut self, future: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.frame_loop.take() {
            previous.abort();
        }
        self.frame_loop = Some(tokio::spawn(future));
    }

    pub fn frame_loop_active(&self) -> bool {
        self.frame_loop
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel a single callback; returns false if it already ran or was unknown
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(pos) => {
                let timer = self.timers.swap_remove(pos);
                let was_pending = !timer.handle.is_finished();
                timer.handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Cancel every timer and the frame loop; returns how many were still pending
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for timer in self.timers.drain(..) {
            if !timer.handle.is_finished() {
                cancelled += 1;
            }
            timer.handle.abort();
        }
        if let Some(frame_loop) = self.frame_loop.take() {
            if !frame_loop.is_finished() {
                cancelled += 1;
            }
            frame_loop.abort();
        }
        if cancelled > 0 {
            log::debug!("[CueScheduler] cancelled {} pending callbacks", cancelled);
        }
        cancelled
    }

    pub fn pending_cues(&self) -> usize {
        self.timers
            .iter()
            .filter(|t| t.kind == TimerKind::Cue && !t.handle.is_finished())
            .count()
    }

    /// Live timers of any kind, including the frame loop
    pub fn pending(&self) -> usize {
        let timers = self
            .timers
            .iter()
            .filter(|t| !t.handle.is_finished())
            .count();
        timers + usize::from(self.frame_loop_active())
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    fn spawn<Fut>(&mut self, kind: TimerKind, future: Fut) -> TimerId
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.prune_finished();
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(ScheduledTimer {
            id,
            kind,
            handle: tokio::spawn(future),
        });
        id
    }

    fn prune_finished(&mut self) {
        self.timers.retain(|t| !t.handle.is_finished());
    }
}

impl Default for CueScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CueScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
