//! The session dispatcher.
//!
//! `Session` owns a dispatcher thread which runs the link engine against
//! real time, plus a reader thread which deframes KISS data off the TNC.
//! Both feed one channel, so every state mutation happens on the dispatcher
//! thread; the engine itself never sees concurrency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ax25core::address::{Callsign, DigiPath};
use ax25core::frame::{Ax25Frame, Control, UFormat, MAX_AX25_LEN, MAX_INFO_LEN, PID_NO_LAYER3};
use ax25core::kiss::{KissBuffer, KissCommand, KissFrame};
use ax25core::link::{Link, LinkEvent, LinkState, SendError};

use log::debug;

use crate::config::SessionConfig;
use crate::error::TermError;
use crate::terminal::{LinkStatus, Terminal};
use crate::tnc::Tnc;

/// How long to sleep when the engine has no timer pending.
const IDLE_POLL_MS: u64 = 1_000;

enum SessionEvent {
    /// One deframed AX.25 payload off the wire.
    Wire(Vec<u8>),
    User(UserOp),
    TransportClosed,
}

enum UserOp {
    Connect {
        peer: Callsign,
        path: DigiPath,
    },
    Disconnect,
    /// A plain input line, routed by link and UNPROTO state.
    Line(String),
    UnprotoOnce {
        dest: Callsign,
        path: DigiPath,
        message: String,
    },
    UnprotoEnter {
        dest: Callsign,
        path: DigiPath,
    },
    UnprotoExit,
    SetRetries(u8),
    SetCrlf(bool),
    Status,
    Quit,
}

/// Handle to a running session. Methods enqueue work for the dispatcher
/// thread and return immediately.
pub struct Session {
    event_tx: SyncSender<SessionEvent>,
    connected: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawn the dispatcher and reader threads over the given TNC.
    pub fn start<T: Tnc, U: Terminal>(
        mut tnc: T,
        terminal: U,
        config: SessionConfig,
    ) -> Result<Self, TermError> {
        let read_tnc = tnc.try_clone()?;
        let (event_tx, event_rx) = mpsc::sync_channel(128);
        let connected = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(read_tnc, event_tx.clone());
        let worker = {
            let connected = connected.clone();
            let alive = alive.clone();
            thread::spawn(move || run_dispatcher(tnc, terminal, config, event_rx, connected, alive))
        };
        Ok(Self {
            event_tx,
            connected,
            alive,
            worker: Some(worker),
            reader: Some(reader),
        })
    }

    pub fn connect(&self, peer: Callsign, path: DigiPath) {
        self.send(UserOp::Connect { peer, path });
    }

    pub fn disconnect(&self) {
        self.send(UserOp::Disconnect);
    }

    /// Route one plain input line: an I-frame when connected (or queued
    /// while connecting), a UI frame in persistent UNPROTO mode.
    pub fn line(&self, text: String) {
        self.send(UserOp::Line(text));
    }

    pub fn unproto_once(&self, dest: Callsign, path: DigiPath, message: String) {
        self.send(UserOp::UnprotoOnce {
            dest,
            path,
            message,
        });
    }

    pub fn unproto_enter(&self, dest: Callsign, path: DigiPath) {
        self.send(UserOp::UnprotoEnter { dest, path });
    }

    pub fn unproto_exit(&self) {
        self.send(UserOp::UnprotoExit);
    }

    pub fn set_retries(&self, n2: u8) {
        self.send(UserOp::SetRetries(n2));
    }

    pub fn set_crlf(&self, crlf: bool) {
        self.send(UserOp::SetCrlf(crlf));
    }

    /// Ask the dispatcher to report a status summary via `Terminal::notice`.
    pub fn status(&self) {
        self.send(UserOp::Status);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// False once the dispatcher has stopped, e.g. after transport loss.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Release any link (waiting up to T1 for the peer to confirm), shut the
    /// transport down and join both session threads.
    pub fn quit(mut self) {
        self.send(UserOp::Quit);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        // the dispatcher shut the TNC down on its way out, so the reader's
        // blocked read has returned by now
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }

    fn send(&self, op: UserOp) {
        let _ = self.event_tx.send(SessionEvent::User(op));
    }
}

fn spawn_reader<T: Tnc>(mut tnc: T, event_tx: SyncSender<SessionEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut kiss = KissBuffer::new();
        loop {
            let buf = kiss.buf_remaining();
            let n = match tnc.read(buf) {
                Ok(0) | Err(_) => {
                    let _ = event_tx.send(SessionEvent::TransportClosed);
                    break;
                }
                Ok(n) => n,
            };
            kiss.did_write(n);
            while let Some(frame) = kiss.next_frame() {
                if !matches!(frame.command(), Ok(KissCommand::DataFrame)) {
                    debug!("ignoring KISS control frame from TNC");
                    continue;
                }
                let mut payload = [0u8; MAX_AX25_LEN];
                match frame.decode_payload(&mut payload) {
                    Ok(n) if n > 0 => {
                        if event_tx.send(SessionEvent::Wire(payload[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }
    })
}

fn run_dispatcher<T: Tnc, U: Terminal>(
    mut tnc: T,
    mut terminal: U,
    config: SessionConfig,
    event_rx: Receiver<SessionEvent>,
    connected: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
) {
    let mut link = Link::new(config.mycall, config.link);
    let epoch = Instant::now();
    let mut crlf = config.crlf;
    let mut unproto: Option<(Callsign, DigiPath)> = None;
    let mut quit_deadline: Option<u64> = None;

    loop {
        let now = epoch.elapsed().as_millis() as u64;
        link.pause_keepalive(terminal.pager_pending());
        link.set_now(now);
        if !pump(&mut link, &mut tnc, &mut terminal, &connected) {
            break;
        }

        if let Some(deadline) = quit_deadline {
            if link.state() == LinkState::Disconnected || now >= deadline {
                break;
            }
        }

        let mut wake = link.next_deadline().unwrap_or(now + IDLE_POLL_MS);
        if let Some(deadline) = quit_deadline {
            wake = wake.min(deadline);
        }
        let wait = Duration::from_millis(wake.saturating_sub(now));
        match event_rx.recv_timeout(wait) {
            Ok(SessionEvent::Wire(payload)) => {
                debug!("rx {} octets: {:02x?}", payload.len(), payload);
                match Ax25Frame::parse(&payload) {
                    Ok(frame) => {
                        if let Control::Unnumbered {
                            kind: UFormat::Ui, ..
                        } = frame.control
                        {
                            // connectionless traffic bypasses the link engine
                            terminal.rx(
                                &frame.source,
                                frame.pid.unwrap_or(PID_NO_LAYER3),
                                frame.info.as_bytes(),
                            );
                        } else {
                            link.handle_frame(&frame);
                        }
                    }
                    Err(e) => debug!("discarding malformed frame: {:?}", e),
                }
            }
            Ok(SessionEvent::User(op)) => {
                let now = epoch.elapsed().as_millis() as u64;
                if !handle_user(
                    op,
                    now,
                    &mut link,
                    &mut tnc,
                    &mut terminal,
                    &mut crlf,
                    &mut unproto,
                    &mut quit_deadline,
                ) {
                    break;
                }
            }
            Ok(SessionEvent::TransportClosed) => {
                terminal.status(LinkStatus::TransportDown);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // unblock the reader thread's pending read so it can exit too
    let _ = tnc.shutdown();
    connected.store(false, Ordering::Release);
    alive.store(false, Ordering::Release);
}

/// Returns false when the dispatcher should stop.
#[allow(clippy::too_many_arguments)]
fn handle_user<T: Tnc, U: Terminal>(
    op: UserOp,
    now: u64,
    link: &mut Link,
    tnc: &mut T,
    terminal: &mut U,
    crlf: &mut bool,
    unproto: &mut Option<(Callsign, DigiPath)>,
    quit_deadline: &mut Option<u64>,
) -> bool {
    match op {
        UserOp::Connect { peer, path } => {
            if link.state() == LinkState::Disconnected {
                terminal.status(LinkStatus::Connecting(peer));
                link.connect(peer, path);
            } else {
                terminal.notice("Already connected or connecting; /disconnect first.");
            }
        }
        UserOp::Disconnect => {
            if link.state() == LinkState::Disconnected {
                terminal.notice(&TermError::NotConnected.to_string());
            } else {
                link.disconnect();
            }
        }
        UserOp::Line(text) => {
            if let Some((dest, path)) = *unproto {
                let mut payload = text.into_bytes();
                append_terminator(&mut payload, *crlf);
                return send_ui(tnc, terminal, link.mycall(), dest, path, &payload);
            }
            match link.state() {
                LinkState::Connected | LinkState::AwaitingConnect => {
                    let mut payload = text.into_bytes();
                    append_terminator(&mut payload, *crlf);
                    if let Err(e) = link.send_line(&payload) {
                        terminal.notice(&send_error_text(e));
                    }
                }
                _ => terminal.notice(&TermError::NotConnected.to_string()),
            }
        }
        UserOp::UnprotoOnce {
            dest,
            path,
            message,
        } => {
            return send_ui(tnc, terminal, link.mycall(), dest, path, message.as_bytes());
        }
        UserOp::UnprotoEnter { dest, path } => {
            terminal.notice(&format!(
                "UNPROTO mode: lines go to {} until /upexit.",
                dest
            ));
            *unproto = Some((dest, path));
        }
        UserOp::UnprotoExit => {
            if unproto.take().is_some() {
                terminal.notice("Left UNPROTO mode.");
            } else {
                terminal.notice("Not in UNPROTO mode.");
            }
        }
        UserOp::SetRetries(n2) => {
            link.set_retry_limit(n2);
            terminal.notice(&format!("Retry limit set to {}.", n2));
        }
        UserOp::SetCrlf(enabled) => {
            *crlf = enabled;
            terminal.notice(if enabled {
                "Lines will end with CRLF."
            } else {
                "Lines will end with CR."
            });
        }
        UserOp::Status => {
            let (vs, vr, va) = link.sequence_vars();
            let state = match link.state() {
                LinkState::Disconnected => "DISCONNECTED",
                LinkState::AwaitingConnect => "CONNECTING",
                LinkState::Connected => "CONNECTED",
                LinkState::AwaitingRelease => "DISCONNECTING",
            };
            let peer = link
                .peer()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            let mut text = format!(
                "{} peer={} V(S)={} V(R)={} V(A)={} unacked={} queued={} n2={}",
                state,
                peer,
                vs,
                vr,
                va,
                link.unacked(),
                link.queued(),
                link.retry_limit()
            );
            if let Some((dest, _)) = unproto {
                text.push_str(&format!(" unproto={}", dest));
            }
            terminal.notice(&text);
        }
        UserOp::Quit => {
            match link.state() {
                LinkState::Disconnected => *quit_deadline = Some(now),
                LinkState::AwaitingRelease => *quit_deadline = Some(now + link.t1_ms()),
                _ => {
                    link.disconnect();
                    *quit_deadline = Some(now + link.t1_ms());
                }
            }
        }
    }
    true
}

fn send_error_text(e: SendError) -> String {
    match e {
        SendError::NotLinked => TermError::NotConnected.to_string(),
        SendError::QueueFull => TermError::QueueFull.to_string(),
        SendError::TooLong => TermError::LineTooLong { limit: MAX_INFO_LEN }.to_string(),
    }
}

fn append_terminator(payload: &mut Vec<u8>, crlf: bool) {
    if crlf {
        payload.extend_from_slice(b"\r\n");
    } else {
        payload.push(b'\r');
    }
}

/// Drain engine notifications and outbound frames. Returns false on
/// transport failure.
fn pump<T: Tnc, U: Terminal>(
    link: &mut Link,
    tnc: &mut T,
    terminal: &mut U,
    connected: &Arc<AtomicBool>,
) -> bool {
    while let Some(event) = link.poll_event() {
        match event {
            LinkEvent::Connected => {
                connected.store(true, Ordering::Release);
                if let Some(peer) = link.peer().copied() {
                    terminal.status(LinkStatus::Connected(peer));
                }
            }
            LinkEvent::Data { pid, info } => {
                if let Some(peer) = link.peer().copied() {
                    terminal.rx(&peer, pid, info.as_bytes());
                }
            }
            LinkEvent::Disconnected => {
                connected.store(false, Ordering::Release);
                terminal.status(LinkStatus::Disconnected);
            }
            LinkEvent::PeerDisconnected => {
                connected.store(false, Ordering::Release);
                terminal.status(LinkStatus::PeerDisconnected);
            }
            LinkEvent::PeerRefused => {
                connected.store(false, Ordering::Release);
                terminal.status(LinkStatus::PeerRefused);
            }
            LinkEvent::ConnectTimedOut => {
                connected.store(false, Ordering::Release);
                terminal.status(LinkStatus::ConnectTimedOut {
                    attempts: link.retry_limit(),
                });
            }
            LinkEvent::LinkLost => {
                connected.store(false, Ordering::Release);
                terminal.status(LinkStatus::LinkLost);
            }
            LinkEvent::ProtocolError => {
                connected.store(false, Ordering::Release);
                terminal.status(LinkStatus::ProtocolError);
            }
        }
    }
    while let Some(frame) = link.poll_frame() {
        if write_frame(tnc, &frame).is_err() {
            terminal.status(LinkStatus::TransportDown);
            return false;
        }
    }
    true
}

fn send_ui<T: Tnc, U: Terminal>(
    tnc: &mut T,
    terminal: &mut U,
    mycall: &Callsign,
    dest: Callsign,
    path: DigiPath,
    payload: &[u8],
) -> bool {
    let frame = match Ax25Frame::ui(*mycall, dest, path, payload) {
        Ok(frame) => frame,
        Err(_) => {
            terminal.notice(&TermError::LineTooLong { limit: MAX_INFO_LEN }.to_string());
            return true;
        }
    };
    if write_frame(tnc, &frame).is_err() {
        terminal.status(LinkStatus::TransportDown);
        return false;
    }
    terminal.status(LinkStatus::UnprotoSent(dest));
    true
}

fn write_frame<T: Tnc>(tnc: &mut T, frame: &Ax25Frame) -> std::io::Result<()> {
    let mut buf = [0u8; MAX_AX25_LEN];
    let n = frame.encode(&mut buf);
    debug!("tx {} octets: {:02x?}", n, &buf[..n]);
    // cannot exceed the KISS payload limit: encode() caps at MAX_AX25_LEN
    let kiss = KissFrame::new_data_frame(&buf[..n]).unwrap();
    tnc.write_all(kiss.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ChannelTnc, RecordingTerminal};
    use ax25core::frame::Info;

    fn call(s: &str) -> Callsign {
        Callsign::parse(s).unwrap()
    }

    /// Deframe and parse every complete frame the session has written.
    fn written_frames(tnc: &ChannelTnc) -> Vec<Ax25Frame> {
        let bytes = tnc.written();
        let mut kiss = KissBuffer::new();
        let mut frames = vec![];
        for chunk in bytes.chunks(ax25core::kiss::MAX_FRAME_LEN / 2) {
            kiss.buf_remaining()[..chunk.len()].copy_from_slice(chunk);
            kiss.did_write(chunk.len());
            while let Some(frame) = kiss.next_frame() {
                let mut payload = [0u8; MAX_AX25_LEN];
                if let Ok(n) = frame.decode_payload(&mut payload) {
                    if let Ok(parsed) = Ax25Frame::parse(&payload[..n]) {
                        frames.push(parsed);
                    }
                }
            }
        }
        frames
    }

    fn wait_until(mut predicate: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if predicate() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached within two seconds");
    }

    fn inject(injector: &mpsc::Sender<Vec<u8>>, frame: &Ax25Frame) {
        let mut buf = [0u8; MAX_AX25_LEN];
        let n = frame.encode(&mut buf);
        let kiss = KissFrame::new_data_frame(&buf[..n]).unwrap();
        injector.send(kiss.as_bytes().to_vec()).unwrap();
    }

    #[test]
    fn unproto_one_shot_emits_a_ui_frame() {
        let (tnc, _injector) = ChannelTnc::new();
        let terminal = RecordingTerminal::default();
        let session = Session::start(
            tnc.clone(),
            terminal.clone(),
            SessionConfig::new(call("KC3SMW-0")),
        )
        .unwrap();

        let mut path = DigiPath::new();
        path.push(call("WIDE1-1")).unwrap();
        session.unproto_once(call("CQ"), path, "CQ CQ de KC3SMW".into());

        wait_until(|| !written_frames(&tnc).is_empty());
        let frames = written_frames(&tnc);
        assert_eq!(frames.len(), 1);
        let ui = &frames[0];
        assert_eq!(ui.dest, call("CQ"));
        assert_eq!(ui.source, call("KC3SMW-0"));
        assert_eq!(ui.path.len(), 1);
        assert!(matches!(
            ui.control,
            Control::Unnumbered {
                kind: UFormat::Ui,
                poll_final: false
            }
        ));
        assert_eq!(ui.pid, Some(PID_NO_LAYER3));
        assert_eq!(ui.info.as_bytes(), b"CQ CQ de KC3SMW");

        assert!(terminal
            .statuses()
            .contains(&LinkStatus::UnprotoSent(call("CQ"))));
        session.quit();
    }

    #[test]
    fn handshake_then_line_exchange() {
        let (tnc, injector) = ChannelTnc::new();
        let terminal = RecordingTerminal::default();
        let session = Session::start(
            tnc.clone(),
            terminal.clone(),
            SessionConfig::new(call("KC3SMW-0")),
        )
        .unwrap();

        session.connect(call("KC3SMW-7"), DigiPath::new());
        wait_until(|| {
            written_frames(&tnc).iter().any(|f| {
                matches!(
                    f.control,
                    Control::Unnumbered {
                        kind: UFormat::Sabme,
                        ..
                    }
                )
            })
        });

        let ua = Ax25Frame {
            dest: call("KC3SMW-0"),
            source: call("KC3SMW-7"),
            path: DigiPath::new(),
            command: false,
            control: Control::Unnumbered {
                kind: UFormat::Ua,
                poll_final: true,
            },
            pid: None,
            info: Info::empty(),
        };
        inject(&injector, &ua);

        wait_until(|| session.is_connected());
        assert!(terminal
            .statuses()
            .contains(&LinkStatus::Connected(call("KC3SMW-7"))));

        session.line("hello".into());
        wait_until(|| {
            written_frames(&tnc)
                .iter()
                .any(|f| matches!(f.control, Control::Info { .. }))
        });
        let frames = written_frames(&tnc);
        let i_frame = frames
            .iter()
            .find(|f| matches!(f.control, Control::Info { .. }))
            .unwrap();
        assert_eq!(
            i_frame.control,
            Control::Info {
                ns: 0,
                nr: 0,
                poll: false
            }
        );
        assert_eq!(i_frame.info.as_bytes(), b"hello\r");

        // delivery in the other direction reaches the terminal
        let reply = Ax25Frame {
            dest: call("KC3SMW-0"),
            source: call("KC3SMW-7"),
            path: DigiPath::new(),
            command: true,
            control: Control::Info {
                ns: 0,
                nr: 1,
                poll: false,
            },
            pid: Some(PID_NO_LAYER3),
            info: Info::new(b"hi\r").unwrap(),
        };
        inject(&injector, &reply);
        wait_until(|| !terminal.received().is_empty());
        let received = terminal.received();
        assert_eq!(received[0].0, call("KC3SMW-7"));
        assert_eq!(received[0].2, b"hi\r");

        session.quit();
    }

    #[test]
    fn inbound_ui_reaches_terminal_while_disconnected() {
        let (tnc, injector) = ChannelTnc::new();
        let terminal = RecordingTerminal::default();
        let session = Session::start(
            tnc.clone(),
            terminal.clone(),
            SessionConfig::new(call("KC3SMW-0")),
        )
        .unwrap();

        let beacon = Ax25Frame::ui(
            call("N0CALL-4"),
            call("BEACON"),
            DigiPath::new(),
            b"ON AIR",
        )
        .unwrap();
        inject(&injector, &beacon);

        wait_until(|| !terminal.received().is_empty());
        let received = terminal.received();
        assert_eq!(received[0].0, call("N0CALL-4"));
        assert_eq!(received[0].2, b"ON AIR");
        session.quit();
    }

    #[test]
    fn transport_loss_is_reported() {
        let (tnc, injector) = ChannelTnc::new();
        let terminal = RecordingTerminal::default();
        let session = Session::start(
            tnc.clone(),
            terminal.clone(),
            SessionConfig::new(call("KC3SMW-0")),
        )
        .unwrap();

        drop(injector);
        wait_until(|| !session.is_alive());
        assert!(terminal.statuses().contains(&LinkStatus::TransportDown));
    }
}
