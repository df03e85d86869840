//! Bounded producer/consumer record channel.
//!
//! A [`RecordChannel`] decouples decompression and parsing from record
//! consumption. One background thread decodes records into a fixed arena
//! of [`RecordSlot`]s; the consumer pulls them in input order.
//!
//! # Slot lifecycle
//!
//! ```text
//!   free queue ──> producer fills slot ──> filled queue ──> consumer holds slot
//!       ^                                                          │
//!       └──────────────── returned on the next pull() ─────────────┘
//! ```
//!
//! The arena holds exactly `capacity` slots. When every slot is filled or
//! held, the producer blocks on the free queue until the consumer advances.
//! The consumer keeps at most one slot, and gives it back at the start of
//! the next [`pull`](RecordChannel::pull); the returned borrow makes it
//! impossible to keep a reference past that point.
//!
//! End of input and parse faults travel through the filled queue as
//! terminal messages, after every record parsed before them.

use crate::fastx::{FastxError, FastxReader, Result};
use crate::record::{Record, RecordSlot};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, trace};
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A pull-based stream of records.
///
/// A reference returned by [`pull`](RecordSource::pull) is valid until the
/// next call; callers copy out anything they need past that.
pub trait RecordSource {
    /// Next record, `Ok(None)` at end of stream, or the fault that ended it.
    fn pull(&mut self) -> Result<Option<&Record>>;

    /// The record returned by the last successful pull, if it is still held.
    fn current(&self) -> Option<&Record>;

    /// Ask the source to stop producing. Further pulls return `Ok(None)`.
    fn stop(&mut self) {}
}

enum Message {
    Record(RecordSlot),
    End,
    Fault(FastxError),
}

/// Fixed-capacity channel fed by one background parsing thread.
pub struct RecordChannel {
    filled: Option<Receiver<Message>>,
    free: Option<Sender<RecordSlot>>,
    current: Option<RecordSlot>,
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    capacity: usize,
    delivered: u64,
    finished: bool,
}

impl RecordChannel {
    /// Open an input file (or stdin for `-`) and start parsing it.
    ///
    /// The file is opened on the calling thread so open failures surface
    /// here rather than as a stream fault.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        Self::spawn(FastxReader::from_path(path)?, capacity)
    }

    /// Start a producer thread decoding from `reader`.
    pub fn spawn<R>(reader: FastxReader<R>, capacity: usize) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        if capacity == 0 {
            return Err(FastxError::InvalidConfig(
                "channel capacity must be at least 1".to_string(),
            ));
        }

        let (free_tx, free_rx) = bounded(capacity);
        // One extra message for the terminal marker when every slot is filled
        let (filled_tx, filled_rx) = bounded(capacity + 1);
        for index in 0..capacity {
            // Cannot fail: the receiver is alive and the queue has room.
            let _ = free_tx.send(RecordSlot::new(index));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let producer_stop = Arc::clone(&stop);
        let producer = thread::Builder::new()
            .name("fastx-reader".to_string())
            .spawn(move || produce(reader, free_rx, filled_tx, producer_stop))?;

        debug!("record channel started with {} slots", capacity);

        Ok(Self {
            filled: Some(filled_rx),
            free: Some(free_tx),
            current: None,
            stop,
            producer: Some(producer),
            capacity,
            delivered: 0,
            finished: false,
        })
    }

    /// Number of slots in the arena.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records handed to the consumer so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Arena index of the slot currently held by the consumer.
    pub fn current_slot(&self) -> Option<usize> {
        self.current.as_ref().map(|slot| slot.index)
    }

    /// Block until the next record is parsed.
    ///
    /// Returns `Ok(None)` once the input is exhausted or the channel was
    /// stopped. A parse fault is returned exactly once; every later pull
    /// returns `Ok(None)`.
    pub fn pull(&mut self) -> Result<Option<&Record>> {
        self.release_current();
        if self.finished {
            return Ok(None);
        }
        let message = match &self.filled {
            Some(rx) => rx.recv(),
            None => return Ok(None),
        };

        match message {
            Ok(Message::Record(slot)) => {
                self.delivered += 1;
                Ok(Some(&self.current.insert(slot).record))
            }
            Ok(Message::End) => {
                trace!("record channel reached end after {} records", self.delivered);
                self.finish()?;
                Ok(None)
            }
            Ok(Message::Fault(e)) => {
                self.finish()?;
                Err(e)
            }
            // The producer always sends a terminal message unless it panicked
            Err(_) => {
                self.finish()?;
                Err(FastxError::ProducerPanicked)
            }
        }
    }

    /// Stop the producer and release every slot.
    ///
    /// Records parsed but not yet pulled are discarded. The producer
    /// notices within one parse: it checks the stop flag before filling a
    /// slot, and a send into the disconnected queue fails.
    pub fn stop(&mut self) {
        if self.producer.is_none() && self.finished {
            return;
        }
        self.stop.store(true, Ordering::Release);
        self.current = None;
        self.free = None;
        self.filled = None;
        self.finished = true;
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                debug!("record producer panicked during shutdown");
            }
        }
        debug!("record channel stopped after {} records", self.delivered);
    }

    fn release_current(&mut self) {
        if let Some(slot) = self.current.take() {
            if let Some(free) = &self.free {
                // The producer may already be gone; the slot is dropped then.
                let _ = free.send(slot);
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.free = None;
        self.filled = None;
        match self.producer.take() {
            Some(handle) => handle.join().map_err(|_| FastxError::ProducerPanicked),
            None => Ok(()),
        }
    }
}

impl RecordSource for RecordChannel {
    fn pull(&mut self) -> Result<Option<&Record>> {
        RecordChannel::pull(self)
    }

    fn current(&self) -> Option<&Record> {
        self.current.as_ref().map(|slot| &slot.record)
    }

    fn stop(&mut self) {
        RecordChannel::stop(self)
    }
}

impl Drop for RecordChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce<R: BufRead>(
    mut reader: FastxReader<R>,
    free: Receiver<RecordSlot>,
    filled: Sender<Message>,
    stop: Arc<AtomicBool>,
) {
    loop {
        let Ok(mut slot) = free.recv() else {
            return;
        };
        if stop.load(Ordering::Acquire) {
            return;
        }
        match reader.read_into(&mut slot.record) {
            Ok(true) => {
                if filled.send(Message::Record(slot)).is_err() {
                    return;
                }
            }
            Ok(false) => {
                let _ = filled.send(Message::End);
                return;
            }
            Err(e) => {
                let _ = filled.send(Message::Fault(e));
                return;
            }
        }
    }
}

/// A [`RecordSource`] that parses on the calling thread.
///
/// Useful for small inputs and tests where a background thread buys
/// nothing.
pub struct InlineSource<R: BufRead> {
    reader: FastxReader<R>,
    record: Record,
    holding: bool,
    finished: bool,
}

impl<R: BufRead> InlineSource<R> {
    pub fn new(reader: FastxReader<R>) -> Self {
        Self {
            reader,
            record: Record::new(),
            holding: false,
            finished: false,
        }
    }
}

impl<'a> InlineSource<&'a [u8]> {
    /// Parse records from an in-memory buffer.
    pub fn from_bytes(content: &'a [u8]) -> Self {
        Self::new(FastxReader::new(content))
    }
}

impl<R: BufRead> RecordSource for InlineSource<R> {
    fn pull(&mut self) -> Result<Option<&Record>> {
        self.holding = false;
        if self.finished {
            return Ok(None);
        }
        match self.reader.read_into(&mut self.record) {
            Ok(true) => {
                self.holding = true;
                Ok(Some(&self.record))
            }
            Ok(false) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    fn current(&self) -> Option<&Record> {
        self.holding.then_some(&self.record)
    }

    fn stop(&mut self) {
        self.holding = false;
        self.finished = true;
    }
}
