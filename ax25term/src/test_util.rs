use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ax25core::address::Callsign;

use crate::error::TermError;
use crate::terminal::{LinkStatus, Terminal};
use crate::tnc::Tnc;

/// In-memory TNC for dispatcher tests: bytes pushed through the returned
/// sender appear on `read()`, bytes the session writes are captured for
/// inspection.
#[derive(Clone)]
pub(crate) struct ChannelTnc {
    rx: Arc<Mutex<Receiver<Vec<u8>>>>,
    pending: Arc<Mutex<Vec<u8>>>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl ChannelTnc {
    pub fn new() -> (Self, Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                rx: Arc::new(Mutex::new(rx)),
                pending: Arc::new(Mutex::new(Vec::new())),
                written: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(AtomicBool::new(false)),
            },
            tx,
        )
    }

    /// Everything the session has transmitted so far.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl Read for ChannelTnc {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            // shutdown() on any clone reads as EOF, like a closed socket
            if self.closed.load(Ordering::Acquire) {
                return Ok(0);
            }
            {
                let mut pending = self.pending.lock().unwrap();
                if !pending.is_empty() {
                    let n = pending.len().min(buf.len());
                    buf[..n].copy_from_slice(&pending[..n]);
                    pending.drain(..n);
                    return Ok(n);
                }
            }
            let rx = self.rx.lock().unwrap();
            match rx.recv_timeout(Duration::from_millis(20)) {
                Ok(bytes) => self.pending.lock().unwrap().extend_from_slice(&bytes),
                // poll again so a concurrent shutdown() is noticed
                Err(RecvTimeoutError::Timeout) => {}
                // sender gone: report EOF
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
    }
}

impl Write for ChannelTnc {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Tnc for ChannelTnc {
    fn try_clone(&mut self) -> Result<Self, TermError> {
        Ok(self.clone())
    }

    fn shutdown(&mut self) -> Result<(), TermError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Terminal that records every callback for assertions.
#[derive(Clone, Default)]
pub(crate) struct RecordingTerminal {
    statuses: Arc<Mutex<Vec<LinkStatus>>>,
    received: Arc<Mutex<Vec<(Callsign, u8, Vec<u8>)>>>,
    notices: Arc<Mutex<Vec<String>>>,
    pub pager: Arc<AtomicBool>,
}

impl RecordingTerminal {
    pub fn statuses(&self) -> Vec<LinkStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<(Callsign, u8, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Terminal for RecordingTerminal {
    fn rx(&mut self, source: &Callsign, pid: u8, text: &[u8]) {
        self.received
            .lock()
            .unwrap()
            .push((*source, pid, text.to_vec()));
    }

    fn status(&mut self, status: LinkStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn notice(&mut self, text: &str) {
        self.notices.lock().unwrap().push(text.to_string());
    }

    fn pager_pending(&mut self) -> bool {
        self.pager.load(Ordering::Acquire)
    }
}
