//! CPAL-based cue speaker for desktop platforms (Linux, macOS, Windows)
//!
//! The cpal stream lives on a dedicated thread because `cpal::Stream` is not
//! `Send` on every host. Clips reach the realtime callback through a
//! lock-free rtrb ring buffer; the callback mixes nothing, it simply drains
//! queued samples and writes silence when the queue is empty.
//!
//! The stream runs at the device's default rate; clips rendered at another
//! rate are resampled before they are queued.

use std::borrow::Cow;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio::tone::resample_linear;
use crate::audio::{CueClip, CueKind};
use crate::config::AudioConfig;
use crate::error::DrillError;

use super::AudioOutput;

enum StreamCommand {
    Resume,
    Shutdown,
}

struct OpenStream {
    producer: Producer<f32>,
    sample_rate: u32,
    commands: mpsc::Sender<StreamCommand>,
    thread: JoinHandle<()>,
}

/// Default output device driven through cpal
pub struct CpalAudioOutput {
    config: AudioConfig,
    stream: Mutex<Option<OpenStream>>,
}

impl CpalAudioOutput {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
        }
    }

    fn ring_capacity(&self) -> usize {
        (self.config.sample_rate as usize * self.config.ring_buffer_secs.max(1) as usize).max(1024)
    }
}

fn unavailable(reason: impl Into<String>) -> DrillError {
    DrillError::AudioDeviceUnavailable {
        reason: reason.into(),
    }
}

/// Clip samples at the stream's rate
fn samples_for_stream(clip: &CueClip, stream_rate: u32) -> Cow<'_, [f32]> {
    if clip.sample_rate() == stream_rate {
        Cow::Borrowed(clip.samples())
    } else {
        Cow::Owned(resample_linear(clip.samples(), clip.sample_rate(), stream_rate))
    }
}

fn build_stream(mut consumer: Consumer<f32>) -> Result<(cpal::Stream, u32), DrillError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| unavailable("No default output device found"))?;

    let default_config = device
        .default_output_config()
        .map_err(|e| unavailable(format!("Failed to get default output config: {:?}", e)))?;
    if default_config.sample_format() != cpal::SampleFormat::F32 {
        return Err(unavailable(
            "Only F32 sample format is currently supported for output",
        ));
    }

    let sample_rate = default_config.sample_rate().0;
    let stream_config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels_count = stream_config.channels.max(1) as usize;
    let err_fn = |err| log::error!("[CpalAudioOutput] Output stream error: {}", err);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels_count) {
                    let sample = consumer.pop().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| unavailable(format!("{:?}", e)))?;

    stream
        .play()
        .map_err(|e| unavailable(format!("Output start failed: {}", e)))?;
    Ok((stream, sample_rate))
}

impl AudioOutput for CpalAudioOutput {
    fn open(&self) -> Result<(), DrillError> {
        let mut slot = self.stream.lock().map_err(|_| DrillError::LockPoisoned {
            component: "cpal_output".to_string(),
        })?;
        if slot.is_some() {
            return Ok(());
        }

        let (producer, consumer) = RingBuffer::<f32>::new(self.ring_capacity());
        let (command_tx, command_rx) = mpsc::channel::<StreamCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, DrillError>>();

        let thread = thread::Builder::new()
            .name("cue-output".to_string())
            .spawn(move || {
                let stream = match build_stream(consumer) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                while let Ok(command) = command_rx.recv() {
                    match command {
                        StreamCommand::Resume => {
                            if let Err(err) = stream.play() {
                                log::warn!("[CpalAudioOutput] resume failed: {}", err);
                            }
                        }
                        StreamCommand::Shutdown => break,
                    }
                }
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => {
                if sample_rate != self.config.sample_rate {
                    log::info!(
                        "[CpalAudioOutput] device runs at {} Hz, resampling {} Hz cues",
                        sample_rate,
                        self.config.sample_rate
                    );
                }
                log::info!("[CpalAudioOutput] output stream open at {} Hz", sample_rate);
                *slot = Some(OpenStream {
                    producer,
                    sample_rate,
                    commands: command_tx,
                    thread,
                });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(unavailable("output thread exited before opening the stream"))
            }
        }
    }

    fn play(&self, kind: CueKind, clip: &CueClip) -> Result<(), DrillError> {
        let mut slot = self.stream.lock().map_err(|_| DrillError::LockPoisoned {
            component: "cpal_output".to_string(),
        })?;
        let stream = slot
            .as_mut()
            .ok_or_else(|| unavailable("output not open"))?;

        let samples = samples_for_stream(clip, stream.sample_rate);
        let mut dropped = 0usize;
        for &sample in samples.iter() {
            if stream.producer.push(sample).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!(
                "[CpalAudioOutput] ring buffer full, dropped {} samples of {}",
                dropped,
                kind.label()
            );
        }
        Ok(())
    }

    fn resume(&self) -> Result<(), DrillError> {
        let slot = self.stream.lock().map_err(|_| DrillError::LockPoisoned {
            component: "cpal_output".to_string(),
        })?;
        match slot.as_ref() {
            Some(stream) => stream
                .commands
                .send(StreamCommand::Resume)
                .map_err(|_| unavailable("output thread has exited")),
            None => Err(unavailable("output not open")),
        }
    }

    fn close(&self) {
        let taken = match self.stream.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(stream) = taken {
            let _ = stream.commands.send(StreamCommand::Shutdown);
            if stream.thread.join().is_err() {
                log::warn!("[CpalAudioOutput] output thread panicked");
            }
        }
    }
}

impl Drop for CpalAudioOutput {
    fn drop(&mut self) {
        self.close();
    }
}
