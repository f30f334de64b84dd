//! Stream chunk buffer
//!
//! Decouples the network reader from the decoder with a bounded
//! producer-consumer channel. A background thread pulls fixed-size chunks
//! from the response body; the consumer side implements `Read` for the
//! format probe and decoder. The channel bound caps buffered memory and
//! provides backpressure when the decoder falls behind.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use crate::config::buffer::{CHANNEL_BOUND, CHUNK_SIZE, CONSUMER_WAIT_TIMEOUT_MS};
use crate::config::network::READ_TIMEOUT_SECS;

/// Spawn the producer thread for `inner`, returning the consumer-side
/// reader and the flag that cancels the producer.
pub fn spawn_producer<R: Read + Send + 'static>(
    inner: R,
) -> io::Result<(ChunkReader, Arc<AtomicBool>)> {
    let (tx, rx) = bounded::<io::Result<Vec<u8>>>(CHANNEL_BOUND);
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop = stop_flag.clone();

    thread::Builder::new()
        .name("stream-producer".to_string())
        .spawn(move || {
            let mut inner = inner;
            let mut chunk = vec![0u8; CHUNK_SIZE];
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                match inner.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        // send blocks when the channel is full (backpressure);
                        // a dropped consumer ends the producer
                        if tx.send(Ok(chunk[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })?;

    Ok((ChunkReader::new(rx), stop_flag))
}

/// Consumer side of the chunk channel.
///
/// Holds at most one chunk at a time. A closed channel reads as EOF; an
/// error chunk surfaces as the corresponding `io::Error`.
pub struct ChunkReader {
    receiver: Receiver<io::Result<Vec<u8>>>,
    current: Vec<u8>,
    pos: usize,
    done: bool,
}

impl ChunkReader {
    fn new(receiver: Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            receiver,
            current: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    /// Block until the first chunk arrives, so dead streams fail fast with
    /// a timeout instead of hanging the format probe.
    pub fn wait_initial(&mut self, timeout: Duration) -> io::Result<()> {
        if self.pos < self.current.len() || self.done {
            return Ok(());
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(chunk)) => {
                self.current = chunk;
                self.pos = 0;
                Ok(())
            }
            Ok(Err(e)) => {
                self.done = true;
                Err(e)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.done = true;
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out waiting for stream data",
            )),
        }
    }

    fn next_chunk(&mut self) -> io::Result<usize> {
        let deadline = Instant::now() + Duration::from_secs(READ_TIMEOUT_SECS);
        loop {
            match self
                .receiver
                .recv_timeout(Duration::from_millis(CONSUMER_WAIT_TIMEOUT_MS))
            {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                    return Ok(self.current.len());
                }
                Ok(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.done = true;
                    return Ok(0);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "no stream data received",
                        ));
                    }
                }
            }
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pos >= self.current.len() {
            if self.done {
                return Ok(0);
            }
            if self.next_chunk()? == 0 {
                return Ok(0);
            }
        }

        let available = &self.current[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}
