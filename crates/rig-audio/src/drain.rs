//! Period drain run on the audio callback
//!
//! The device hands the callback arbitrary chunks of interleaved samples.
//! [`PeriodDrain`] stages them in a ring sized to the negotiated buffer and,
//! once the start threshold and wake-up watermark are met, drains whole
//! periods. The first `transform_size` samples of every drained period
//! become a [`SampleWindow`] sent to the consumer over a bounded channel.
//!
//! Window buffers circulate: the consumer hands spent ones back through
//! [`CaptureStream::recycle`], so steady-state capture does not allocate on
//! the audio thread. Nothing here blocks; a full channel drops the window
//! and the consumer is told through the error channel.

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::CaptureError;
use crate::params::{HwParams, SwParams};

/// Windows that can be queued for the consumer
pub const WINDOW_QUEUE_DEPTH: usize = 4;

const ERROR_QUEUE_DEPTH: usize = 8;

/// One analysis window of interleaved 16-bit samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleWindow {
    /// Index of the period this window was taken from
    pub sequence: u64,
    /// `transform_size` samples, channel-interleaved
    pub samples: Vec<i16>,
}

/// Something the consumer receives from a running capture
#[derive(Debug)]
pub enum CaptureEvent {
    Window(SampleWindow),
    Error(CaptureError),
}

/// Sending half for errors raised outside the data callback
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: mpsc::Sender<CaptureError>,
}

impl ErrorReporter {
    /// Queue an error for the consumer; never blocks
    pub fn report(&self, err: CaptureError) {
        if self.tx.try_send(err).is_err() {
            trace!("capture error queue full or closed");
        }
    }
}

/// Staging ring and period drain
pub struct PeriodDrain {
    ring: Vec<i16>,
    head: usize,
    len: usize,
    period_samples: usize,
    transform_size: usize,
    start_threshold: usize,
    avail_min: usize,
    primed: bool,
    sequence: u64,
    dropped: u64,
    spare: Vec<Vec<i16>>,
    window_tx: mpsc::Sender<SampleWindow>,
    recycle_rx: mpsc::Receiver<Vec<i16>>,
    errors: ErrorReporter,
}

/// Receiving side of a capture
pub struct CaptureStream {
    windows: mpsc::Receiver<SampleWindow>,
    errors: mpsc::Receiver<CaptureError>,
    recycle: mpsc::Sender<Vec<i16>>,
}

/// Create a drain for the negotiated parameters and its receiving side
pub fn channel(hw: &HwParams, sw: &SwParams) -> (PeriodDrain, CaptureStream) {
    let channels = hw.channels as usize;
    let buffers = WINDOW_QUEUE_DEPTH + 2;

    let (window_tx, windows) = mpsc::channel(WINDOW_QUEUE_DEPTH);
    let (recycle, recycle_rx) = mpsc::channel(buffers);
    let (error_tx, errors) = mpsc::channel(ERROR_QUEUE_DEPTH);

    let mut spare = Vec::with_capacity(buffers);
    for _ in 0..buffers {
        spare.push(Vec::with_capacity(hw.transform_size));
    }

    let drain = PeriodDrain {
        ring: vec![0; hw.buffer_samples()],
        head: 0,
        len: 0,
        period_samples: hw.period_samples(),
        transform_size: hw.transform_size,
        start_threshold: sw.start_threshold * channels,
        avail_min: sw.avail_min * channels,
        primed: false,
        sequence: 0,
        dropped: 0,
        spare,
        window_tx,
        recycle_rx,
        errors: ErrorReporter { tx: error_tx },
    };
    let stream = CaptureStream {
        windows,
        errors,
        recycle,
    };
    (drain, stream)
}

impl PeriodDrain {
    /// Error sender for the device's error callback
    pub fn error_reporter(&self) -> ErrorReporter {
        self.errors.clone()
    }

    /// Interleaved samples currently staged
    pub fn staged(&self) -> usize {
        self.len
    }

    /// Accept samples from the device
    ///
    /// Returns the number of periods drained.
    pub fn push(&mut self, mut data: &[i16]) -> usize {
        let mut drained = 0;
        while !data.is_empty() {
            let capacity = self.ring.len();
            let free = capacity - self.len;
            if free == 0 {
                // Only reachable with a buffer smaller than one period
                trace!("staging ring full, discarding {} samples", data.len());
                break;
            }

            let n = free.min(data.len());
            let tail = (self.head + self.len) % capacity;
            let first = n.min(capacity - tail);
            self.ring[tail..tail + first].copy_from_slice(&data[..first]);
            self.ring[..n - first].copy_from_slice(&data[first..n]);
            self.len += n;
            data = &data[n..];

            drained += self.drain_ready();
        }
        drained
    }

    fn drain_ready(&mut self) -> usize {
        if !self.primed {
            if self.len < self.start_threshold {
                return 0;
            }
            debug!("capture primed with {} samples staged", self.len);
            self.primed = true;
        }
        if self.len < self.avail_min {
            return 0;
        }

        let mut drained = 0;
        while self.len >= self.period_samples {
            self.drain_period();
            drained += 1;
        }
        drained
    }

    fn drain_period(&mut self) {
        while let Ok(buf) = self.recycle_rx.try_recv() {
            self.spare.push(buf);
        }

        let sequence = self.sequence;
        self.sequence += 1;

        match self.spare.pop() {
            Some(mut samples) => {
                samples.clear();
                let capacity = self.ring.len();
                let first = self.transform_size.min(capacity - self.head);
                samples.extend_from_slice(&self.ring[self.head..self.head + first]);
                samples.extend_from_slice(&self.ring[..self.transform_size - first]);

                match self.window_tx.try_send(SampleWindow { sequence, samples }) {
                    Ok(()) => {
                        if self.dropped > 0 {
                            self.errors.report(CaptureError::Overrun {
                                dropped: self.dropped,
                            });
                            self.dropped = 0;
                        }
                    }
                    Err(mpsc::error::TrySendError::Full(window))
                    | Err(mpsc::error::TrySendError::Closed(window)) => {
                        self.spare.push(window.samples);
                        self.dropped += 1;
                    }
                }
            }
            None => self.dropped += 1,
        }

        self.head = (self.head + self.period_samples) % self.ring.len();
        self.len -= self.period_samples;
    }
}

impl CaptureStream {
    /// Wait for the next window or error
    ///
    /// Errors are delivered ahead of windows. Returns `None` once the drain
    /// has been dropped and every queued window has been received.
    pub async fn next_event(&mut self) -> Option<CaptureEvent> {
        tokio::select! {
            biased;
            Some(err) = self.errors.recv() => Some(CaptureEvent::Error(err)),
            window = self.windows.recv() => window.map(CaptureEvent::Window),
        }
    }

    /// Take a queued window without waiting
    pub fn try_window(&mut self) -> Option<SampleWindow> {
        self.windows.try_recv().ok()
    }

    /// Take a queued error without waiting
    pub fn try_error(&mut self) -> Option<CaptureError> {
        self.errors.try_recv().ok()
    }

    /// Hand a spent window back to the drain
    pub fn recycle(&self, window: SampleWindow) {
        let _ = self.recycle.try_send(window.samples);
    }
}
