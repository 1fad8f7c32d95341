//! Background conversion thread.
//!
//! Spawns a thread that owns the `SampleSource` and the `Pipeline`, playing
//! the role of the conversion-complete interrupt: every conversion runs the
//! pipeline to completion, and events go to the reporter over a bounded
//! channel without ever blocking the thread.
//!
//! Each `Sampler` spawns exactly one thread, which is shut down and joined
//! when the `Sampler` is dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use knob_traits::clock::Clock;
use knob_traits::{SampleSource, WordStore};

use crate::config::SamplerCfg;
use crate::error::{KnobError, Result};
use crate::event::{ChannelSink, Event};
use crate::hw_error::map_hw_error;
use crate::pipeline::Pipeline;

/// Why a sampling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source has no more conversions.
    EndOfStream,
    /// Stop was requested from outside.
    Shutdown,
    /// The configured sample budget was used up.
    SampleLimit,
    /// The source failed with something other than a timeout.
    Fault(KnobError),
}

/// Read one conversion; timeouts come back as `Ok(None)`.
pub(crate) fn read_next<S: SampleSource + ?Sized>(
    source: &mut S,
    timeout: Duration,
) -> std::result::Result<Option<u16>, StopReason> {
    match source.read(timeout) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) => match map_hw_error(&*e) {
            KnobError::Timeout => Ok(None),
            KnobError::EndOfStream => Err(StopReason::EndOfStream),
            other => Err(StopReason::Fault(other)),
        },
    }
}

/// What the sampler thread hands back when it ends.
#[derive(Debug)]
pub struct SamplerExit<W: WordStore> {
    pub pipeline: Pipeline<W>,
    pub reason: StopReason,
}

pub struct Sampler<W: WordStore> {
    rx: xch::Receiver<Event>,
    samples: Arc<AtomicU64>,
    timeouts: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<JoinHandle<SamplerExit<W>>>,
}

impl<W: WordStore + Send + 'static> Sampler<W> {
    /// Start the conversion thread.
    ///
    /// `cfg.sample_rate_hz == 0` relies on the source's own blocking for
    /// cadence and adds no sleeps. `max_samples` bounds the run.
    pub fn spawn<S, C>(
        mut source: S,
        mut pipeline: Pipeline<W>,
        cfg: &SamplerCfg,
        max_samples: Option<u64>,
        clock: C,
    ) -> Self
    where
        S: SampleSource + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (mut sink, rx) = ChannelSink::bounded(cfg.event_queue);
        let dropped = sink.dropped_counter();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let samples = Arc::new(AtomicU64::new(0));
        let samples_clone = Arc::clone(&samples);
        let timeouts = Arc::new(AtomicU64::new(0));
        let timeouts_clone = Arc::clone(&timeouts);
        let hz = cfg.sample_rate_hz;
        let period = Duration::from_micros(crate::util::period_us(hz));
        let read_timeout = cfg.read_timeout;

        tracing::debug!(hz, queue = cfg.event_queue, ?max_samples, "sampler starting");
        let join_handle = std::thread::spawn(move || {
            let mut taken: u64 = 0;
            let reason = loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break StopReason::Shutdown;
                }
                if max_samples.is_some_and(|max| taken >= max) {
                    break StopReason::SampleLimit;
                }

                match read_next(&mut source, read_timeout) {
                    Ok(Some(raw)) => {
                        pipeline.on_sample(raw, &mut sink);
                        taken += 1;
                        samples_clone.store(taken, Ordering::Relaxed);
                    }
                    Ok(None) => {
                        timeouts_clone.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(reason) => break reason,
                }

                if hz > 0 {
                    clock.sleep(period);
                }
            };
            tracing::debug!(?reason, samples = taken, "sampler thread exiting");
            SamplerExit { pipeline, reason }
        });

        Self {
            rx,
            samples,
            timeouts,
            dropped,
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl<W: WordStore> Sampler<W> {
    /// Receiving end of the event queue. Disconnects once the thread ends
    /// and the queue is drained.
    pub fn events(&self) -> &xch::Receiver<Event> {
        &self.rx
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Reads that timed out without a conversion.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Events lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Ask the thread to stop after the current conversion.
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the thread to end on its own and take back the pipeline.
    pub fn finish(mut self) -> Result<SamplerExit<W>> {
        let handle = self
            .join_handle
            .take()
            .ok_or_else(|| eyre::eyre!("sampler already joined"))?;
        handle
            .join()
            .map_err(|_| eyre::eyre!("sampler thread panicked"))
    }

    /// Signal shutdown, then join.
    pub fn stop(self) -> Result<SamplerExit<W>> {
        self.request_stop();
        self.finish()
    }
}

impl<W: WordStore> Drop for Sampler<W> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(_) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
