// ABOUTME: Pipes runtime — in-process byte channels wiring pipeline stages together

use crate::env::Environment;
use crossbeam_channel::{Receiver, Sender};
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// The read half of an in-process byte channel, exposed as `io::Read`.
/// Mirrors a Go `io.PipeReader`: reading blocks until bytes are sent or the
/// writer half is dropped (which looks like EOF).
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        ChannelReader { rx, buf: Vec::new(), pos: 0 }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0), // sender dropped: EOF
            }
        }
        let n = std::cmp::min(out.len(), self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// The write half of an in-process byte channel, exposed as `io::Write`.
/// A send whose receiver has been dropped is treated as a benign broken
/// pipe: the copy loop sees it as if the write succeeded and stops silently
/// rather than surfacing an ERROR (spec.md §9's resolved open question).
pub struct ChannelWriter {
    tx: Option<Sender<Vec<u8>>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(tx) = &self.tx {
            if tx.send(buf.to_vec()).is_err() {
                // broken pipe: downstream reader is gone. Swallow silently.
                self.tx = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn channel_pair() -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ChannelWriter { tx: Some(tx) }, ChannelReader::new(rx))
}

/// A completion barrier: blocks in `wait()` until `signal()` has been called
/// exactly once, mirroring `sync.WaitGroup` in the original `doAsync`.
#[derive(Clone)]
pub struct Barrier {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Barrier {
    pub fn new() -> Self {
        Barrier { inner: Arc::new((Mutex::new(false), Condvar::new())) }
    }

    pub fn signal(&self) {
        let (lock, cvar) = &*self.inner;
        let mut done = lock.lock().unwrap();
        *done = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut done = lock.lock().unwrap();
        while !*done {
            done = cvar.wait(done).unwrap();
        }
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle to an in-flight pipeline stage (spec.md §3/§4.3): read ends for
/// stdout/stderr, plus a `Wait` completion closure.
pub struct Pipes {
    pub main: Arc<Mutex<ChannelReader>>,
    pub err: Arc<Mutex<ChannelReader>>,
    wait: Barrier,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Pipes {
    pub fn new(main: ChannelReader, err: ChannelReader, wait: Barrier) -> Self {
        Pipes {
            main: Arc::new(Mutex::new(main)),
            err: Arc::new(Mutex::new(err)),
            wait,
            join: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_join_handle(&self, handle: JoinHandle<()>) {
        *self.join.lock().unwrap() = Some(handle);
    }

    /// Blocks until the producing stage has finished writing and closed its
    /// writer ends.
    pub fn wait(&self) {
        self.wait.wait();
        if let Some(handle) = self.join.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn stdout_source(&self) -> PipeSource {
        PipeSource(Arc::clone(&self.main))
    }

    pub fn stderr_source(&self) -> PipeSource {
        PipeSource(Arc::clone(&self.err))
    }

    /// Drains the stdout channel to `sink`, then waits for completion.
    pub fn drain_to(&self, sink: &mut dyn Write) -> io::Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = {
                let mut reader = self.main.lock().unwrap();
                reader.read(&mut buf)?
            };
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])?;
        }
        self.wait();
        Ok(())
    }
}

/// A cloneable `Read` handle onto a `Pipes`' shared stdout channel, used to
/// wire a downstream stage's `Streams::stdin` to its upstream producer.
pub struct PipeSource(Arc<Mutex<ChannelReader>>);

impl Read for PipeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.lock().unwrap().read(buf)
    }
}

/// The triple `(environment, input Pipes, output Pipes)` passed to a
/// builtin's `prepare` function: its enclosed environment plus, when the
/// call sits inside a pipeline, the upstream producer to read from and the
/// downstream consumer's write ends to write to.
#[derive(Clone)]
pub struct Scope {
    pub env: Rc<Environment>,
    pub input: Option<Rc<Pipes>>,
    pub output: Option<Rc<Pipes>>,
}

impl Scope {
    pub fn new(env: Rc<Environment>) -> Self {
        Scope { env, input: None, output: None }
    }

    pub fn with_input(env: Rc<Environment>, input: Rc<Pipes>) -> Self {
        Scope { env, input: Some(input), output: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn channel_pair_carries_bytes_fifo() {
        let (mut w, mut r) = channel_pair();
        w.write_all(b"hello").unwrap();
        w.write_all(b" world").unwrap();
        drop(w);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn dropped_receiver_makes_writes_a_benign_no_op() {
        let (mut w, r) = channel_pair();
        drop(r);
        // Must not panic or error: broken pipe is swallowed.
        assert_eq!(w.write(b"x").unwrap(), 1);
    }

    #[test]
    fn barrier_wait_blocks_until_signalled() {
        let barrier = Barrier::new();
        let barrier2 = barrier.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            barrier2.signal();
        });
        barrier.wait();
        handle.join().unwrap();
    }

    #[test]
    fn pipes_drain_to_collects_all_bytes_then_waits() {
        let (mut w, r) = channel_pair();
        let (mut ew, er) = channel_pair();
        let barrier = Barrier::new();
        let pipes = Pipes::new(r, er, barrier.clone());
        let handle = thread::spawn(move || {
            w.write_all(b"line1\nline2\n").unwrap();
            drop(w);
            drop(ew);
            barrier.signal();
        });
        pipes.set_join_handle(handle);
        let mut out = Vec::new();
        pipes.drain_to(&mut out).unwrap();
        assert_eq!(out, b"line1\nline2\n");
    }
}
