//! The AX.25 v2.x connected-mode link engine (LAPB, modulo 8).
//!
//! `Link` owns the state for one peer: the connection phase, the V(S)/V(R)/
//! V(A) sequence variables, the retransmit timer T1, the idle keepalive T3
//! and the queues of unacknowledged and not-yet-sent information frames.
//!
//! The engine performs no I/O and keeps no clock of its own. The caller
//! feeds it decoded frames (`handle_frame`), user operations and the current
//! monotonic time in milliseconds (`set_now`), then drains frames to
//! transmit with `poll_frame` and notifications with `poll_event`.
//! `next_deadline` reports when `set_now` next needs to be called.

use crate::address::{Callsign, DigiPath};
use crate::frame::{Ax25Frame, Control, Info, SFormat, UFormat, PID_NO_LAYER3};

use log::debug;

/// Largest permitted outstanding-frame window in the modulo-8 sequence space.
pub const MAX_WINDOW: u8 = 7;

/// How a received FRMR is handled.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FrmrPolicy {
    /// Release the link and report a protocol error.
    Fatal,
    /// Log it and re-establish the link with a fresh SABM.
    Reset,
}

/// Tunable protocol parameters.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LinkConfig {
    /// Attempt limit n2 for connects, retransmissions and releases.
    pub retry_limit: u8,
    /// Response timer T1 in milliseconds.
    pub t1_ms: u64,
    /// Idle keepalive timer T3 in milliseconds.
    pub t3_ms: u64,
    /// Outstanding I-frame window k.
    pub window: u8,
    /// How long to sit on an acknowledgement hoping to coalesce it.
    pub ack_delay_ms: u64,
    pub frmr: FrmrPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            t1_ms: 4_000,
            t3_ms: 180_000,
            window: 4,
            ack_delay_ms: 100,
            frmr: FrmrPolicy::Fatal,
        }
    }
}

/// Connection phase of the link.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkState {
    /// No link and none being established.
    Disconnected,
    /// SABM(E) sent, waiting for UA.
    AwaitingConnect,
    /// Information transfer is running.
    Connected,
    /// DISC sent, waiting for UA or DM.
    AwaitingRelease,
}

/// Notifications surfaced to the layer above.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkEvent {
    Connected,
    /// A locally requested release completed.
    Disconnected,
    /// The peer released the link with DISC or DM.
    PeerDisconnected,
    /// The peer answered our connect request with DM.
    PeerRefused,
    /// The connect retry budget ran out.
    ConnectTimedOut,
    /// The retransmission retry budget ran out while connected.
    LinkLost,
    /// The peer rejected a frame we consider well-formed.
    ProtocolError,
    /// An in-sequence information frame arrived.
    Data { pid: u8, info: Info },
}

/// Reasons `send_line` can refuse a payload.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SendError {
    NotLinked,
    QueueFull,
    TooLong,
}

const QUEUE_DEPTH: usize = 16;

/// Fixed-capacity FIFO in the style of a circular buffer.
struct Ring<T, const N: usize> {
    slots: [Option<T>; N],
    next: usize,
    curr: usize,
}

impl<T, const N: usize> Ring<T, N> {
    fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            next: 0,
            curr: 0,
        }
    }

    /// Returns false when the ring is full and the value was not stored.
    fn push(&mut self, value: T) -> bool {
        if self.slots[self.next].is_some() {
            return false;
        }
        self.slots[self.next] = Some(value);
        self.next = (self.next + 1) % N;
        true
    }

    fn pop(&mut self) -> Option<T> {
        let value = self.slots[self.curr].take()?;
        self.curr = (self.curr + 1) % N;
        Some(value)
    }

    fn is_empty(&self) -> bool {
        self.slots[self.curr].is_none()
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.next = 0;
        self.curr = 0;
    }
}

fn seq(n: u8) -> u8 {
    n & 7
}

/// (a - b) in the modulo-8 sequence space.
fn seq_diff(a: u8, b: u8) -> u8 {
    a.wrapping_sub(b) & 7
}

pub struct Link {
    mycall: Callsign,
    config: LinkConfig,
    state: LinkState,
    peer: Option<Callsign>,
    path: DigiPath,

    /// Send, receive and acknowledge state variables, each 0..7.
    vs: u8,
    vr: u8,
    va: u8,

    /// Peer sent RNR and has not released it with RR yet.
    peer_busy: bool,

    /// The initial connect attempt used SABME and is still outstanding.
    sabme_phase: bool,

    /// Attempts consumed for the operation T1 is currently guarding.
    retries: u8,

    now: u64,
    t1: Option<u64>,
    t3: Option<u64>,
    /// Remaining T3 time parked while keepalives are paused.
    t3_remaining: Option<u64>,
    keepalive_paused: bool,
    /// Deadline for a coalesced RR acknowledging received I-frames.
    ack_due: Option<u64>,

    /// Unacknowledged I-frame payloads, indexed by their N(S).
    sent: [Option<Info>; 8],

    /// Payloads accepted but not yet transmitted: queued during connection
    /// establishment, while the peer is busy, or while the window is closed.
    queued: Ring<Info, QUEUE_DEPTH>,

    out: Ring<Ax25Frame, QUEUE_DEPTH>,
    events: Ring<LinkEvent, QUEUE_DEPTH>,
}

impl Link {
    pub fn new(mycall: Callsign, config: LinkConfig) -> Self {
        Self {
            mycall,
            config,
            state: LinkState::Disconnected,
            peer: None,
            path: DigiPath::new(),
            vs: 0,
            vr: 0,
            va: 0,
            peer_busy: false,
            sabme_phase: false,
            retries: 0,
            now: 0,
            t1: None,
            t3: None,
            t3_remaining: None,
            keepalive_paused: false,
            ack_due: None,
            sent: [None; 8],
            queued: Ring::new(),
            out: Ring::new(),
            events: Ring::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn peer(&self) -> Option<&Callsign> {
        self.peer.as_ref()
    }

    pub fn mycall(&self) -> &Callsign {
        &self.mycall
    }

    pub fn retry_limit(&self) -> u8 {
        self.config.retry_limit
    }

    pub fn set_retry_limit(&mut self, n2: u8) {
        self.config.retry_limit = n2;
    }

    pub fn t1_ms(&self) -> u64 {
        self.config.t1_ms
    }

    pub fn sequence_vars(&self) -> (u8, u8, u8) {
        (self.vs, self.vr, self.va)
    }

    /// Number of transmitted I-frames not yet acknowledged.
    pub fn unacked(&self) -> u8 {
        seq_diff(self.vs, self.va)
    }

    /// Number of payloads waiting for the link or window to open.
    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Next frame ready for transmission, if any.
    pub fn poll_frame(&mut self) -> Option<Ax25Frame> {
        self.out.pop()
    }

    /// Next notification for the layer above, if any.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events.pop()
    }

    /// Earliest instant at which `set_now` will have work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let mut deadline: Option<u64> = None;
        for t in [self.ack_due, self.t1, self.t3] {
            deadline = match (deadline, t) {
                (None, t) => t,
                (d, None) => d,
                (Some(a), Some(b)) => Some(a.min(b)),
            };
        }
        deadline
    }

    /// Advance the engine's clock, firing any timers that have come due.
    pub fn set_now(&mut self, now_ms: u64) {
        if now_ms > self.now {
            self.now = now_ms;
        }
        if let Some(due) = self.ack_due {
            if self.now >= due {
                self.ack_due = None;
                if self.state == LinkState::Connected {
                    self.push_supervisory(SFormat::Rr, false, false);
                }
            }
        }
        if let Some(due) = self.t1 {
            if self.now >= due {
                self.t1 = None;
                self.t1_expired();
            }
        }
        if let Some(due) = self.t3 {
            if self.now >= due {
                self.t3 = None;
                self.t3_expired();
            }
        }
    }

    /// Suspend or resume the T3 keepalive, preserving its remaining time.
    ///
    /// Used while remote pager output is pending so that we do not poke an
    /// RR poll into the middle of a paginated transfer.
    pub fn pause_keepalive(&mut self, paused: bool) {
        if paused == self.keepalive_paused {
            return;
        }
        self.keepalive_paused = paused;
        if paused {
            if let Some(due) = self.t3.take() {
                self.t3_remaining = Some(due.saturating_sub(self.now));
            }
        } else if let Some(remaining) = self.t3_remaining.take() {
            self.t3 = Some(self.now + remaining);
        }
    }

    /// Begin establishing a link. The first attempt is SABME; retries and
    /// mod-8 negotiation fall back to SABM.
    pub fn connect(&mut self, peer: Callsign, path: DigiPath) {
        if self.state != LinkState::Disconnected {
            debug!("connect requested in {:?}, ignoring", self.state);
            return;
        }
        self.peer = Some(peer);
        self.path = path;
        self.reset_sequence();
        self.sabme_phase = true;
        self.retries = 1;
        self.push_unnumbered(UFormat::Sabme, true, true);
        self.start_t1();
        self.state = LinkState::AwaitingConnect;
    }

    /// Release the link. Safe to call repeatedly; at most one DISC results.
    pub fn disconnect(&mut self) {
        match self.state {
            LinkState::Connected => self.release(),
            LinkState::AwaitingConnect => {
                // nothing established yet; abandon quietly
                self.t1 = None;
                self.state = LinkState::Disconnected;
                self.push_event(LinkEvent::Disconnected);
            }
            LinkState::AwaitingRelease | LinkState::Disconnected => {}
        }
    }

    /// Accept one information payload for ordered delivery to the peer.
    ///
    /// Transmitted immediately if the link is up and the window open;
    /// otherwise queued until it can go out. While no connection is
    /// established or pending this refuses with `NotLinked`.
    pub fn send_line(&mut self, payload: &[u8]) -> Result<(), SendError> {
        let info = Info::new(payload).map_err(|_| SendError::TooLong)?;
        match self.state {
            LinkState::Connected => {
                if self.queued.is_empty() && !self.peer_busy && self.window_open() {
                    self.transmit_info(info);
                    Ok(())
                } else if self.queued.push(info) {
                    Ok(())
                } else {
                    Err(SendError::QueueFull)
                }
            }
            LinkState::AwaitingConnect => {
                if self.queued.push(info) {
                    Ok(())
                } else {
                    Err(SendError::QueueFull)
                }
            }
            _ => Err(SendError::NotLinked),
        }
    }

    /// Process one frame decoded off the air.
    pub fn handle_frame(&mut self, frame: &Ax25Frame) {
        if frame.dest != self.mycall {
            return;
        }
        if let Control::Unnumbered {
            kind: UFormat::Ui, ..
        } = frame.control
        {
            // connectionless traffic is the dispatcher's business
            return;
        }
        if !self.frame_is_relevant(frame) {
            // another station wants us while we are occupied
            if let Control::Unnumbered {
                kind: UFormat::Sabm | UFormat::Sabme,
                poll_final,
            } = frame.control
            {
                self.reply_dm(frame, poll_final);
            }
            return;
        }
        match self.state {
            LinkState::Disconnected => self.frame_while_disconnected(frame),
            LinkState::AwaitingConnect => self.frame_while_connecting(frame),
            LinkState::Connected => self.frame_while_connected(frame),
            LinkState::AwaitingRelease => self.frame_while_releasing(frame),
        }
    }

    fn frame_is_relevant(&self, frame: &Ax25Frame) -> bool {
        match (self.state, self.peer.as_ref()) {
            (LinkState::Disconnected, _) => true,
            (_, Some(peer)) => frame.source == *peer,
            (_, None) => false,
        }
    }

    fn frame_while_disconnected(&mut self, frame: &Ax25Frame) {
        match frame.control {
            Control::Unnumbered {
                kind: UFormat::Sabm | UFormat::Sabme,
                poll_final,
            } => {
                // incoming connection
                self.peer = Some(frame.source);
                self.path = frame.path.reversed();
                self.reset_sequence();
                self.push_unnumbered(UFormat::Ua, false, poll_final);
                self.state = LinkState::Connected;
                self.t1 = None;
                self.start_t3();
                self.push_event(LinkEvent::Connected);
            }
            Control::Unnumbered {
                kind: UFormat::Disc,
                poll_final,
            } => self.reply_dm(frame, poll_final),
            Control::Unnumbered { .. } => {
                // DM, UA, FRMR: responses carry no obligation here
            }
            _ if frame.command => {
                let pf = frame.control.poll_final();
                self.reply_dm(frame, pf);
            }
            _ => {}
        }
    }

    fn frame_while_connecting(&mut self, frame: &Ax25Frame) {
        match frame.control {
            Control::Unnumbered {
                kind: UFormat::Ua,
                poll_final: true,
            } => self.establish(),
            Control::Unnumbered {
                kind: UFormat::Ua,
                poll_final: false,
            } => debug!("UA without F while connecting, ignoring"),
            Control::Unnumbered {
                kind: kind @ (UFormat::Dm | UFormat::Frmr),
                ..
            } => {
                if self.sabme_phase {
                    // mod-8 peer balked at SABME; retry immediately with
                    // SABM and leave the attempt budget untouched
                    self.sabme_phase = false;
                    self.push_unnumbered(UFormat::Sabm, true, true);
                    self.start_t1();
                } else if kind == UFormat::Dm {
                    self.fail_link(LinkEvent::PeerRefused);
                } else {
                    self.fail_link(LinkEvent::ProtocolError);
                }
            }
            _ => debug!("ignoring {:?} while connecting", frame.control),
        }
    }

    fn frame_while_connected(&mut self, frame: &Ax25Frame) {
        match frame.control {
            Control::Info { ns, nr, poll } => {
                self.process_ack(nr);
                if ns == self.vr {
                    self.vr = seq(self.vr + 1);
                    self.push_event(LinkEvent::Data {
                        pid: frame.pid.unwrap_or(PID_NO_LAYER3),
                        info: frame.info,
                    });
                    if poll {
                        self.ack_due = None;
                        self.push_supervisory(SFormat::Rr, false, true);
                    } else if self.ack_due.is_none() {
                        self.ack_due = Some(self.now + self.config.ack_delay_ms);
                    }
                } else {
                    debug!("I-frame N(S)={} but V(R)={}, rejecting", ns, self.vr);
                    self.push_supervisory(SFormat::Rej, false, poll);
                }
            }
            Control::Supervisory {
                kind,
                nr,
                poll_final,
            } => {
                if frame.command && poll_final {
                    self.ack_due = None;
                    self.push_supervisory(SFormat::Rr, false, true);
                }
                match kind {
                    SFormat::Rr => {
                        let was_busy = self.peer_busy;
                        self.peer_busy = false;
                        self.process_ack(nr);
                        if was_busy {
                            self.flush_queued();
                        }
                    }
                    SFormat::Rnr => {
                        self.peer_busy = true;
                        self.process_ack(nr);
                    }
                    SFormat::Rej => {
                        self.process_ack(nr);
                        self.retransmit_outstanding();
                    }
                }
            }
            Control::Unnumbered { kind, poll_final } => match kind {
                UFormat::Disc => {
                    self.push_unnumbered(UFormat::Ua, false, poll_final);
                    self.drop_link(LinkEvent::PeerDisconnected);
                }
                UFormat::Dm => self.drop_link(LinkEvent::PeerDisconnected),
                UFormat::Sabm | UFormat::Sabme => {
                    // remote link reset
                    debug!("link reset by peer");
                    self.reset_sequence();
                    self.push_unnumbered(UFormat::Ua, false, poll_final);
                    self.t1 = None;
                    self.start_t3();
                }
                UFormat::Frmr => match self.config.frmr {
                    FrmrPolicy::Fatal => {
                        self.push_event(LinkEvent::ProtocolError);
                        self.release();
                    }
                    FrmrPolicy::Reset => {
                        debug!("FRMR received, re-establishing link");
                        self.reset_sequence();
                        self.sabme_phase = false;
                        self.retries = 1;
                        self.push_unnumbered(UFormat::Sabm, true, true);
                        self.start_t1();
                        self.state = LinkState::AwaitingConnect;
                    }
                },
                UFormat::Ua => debug!("unexpected UA while connected"),
                UFormat::Ui => {}
            },
        }
    }

    fn frame_while_releasing(&mut self, frame: &Ax25Frame) {
        match frame.control {
            Control::Unnumbered {
                kind: UFormat::Ua | UFormat::Dm,
                ..
            } => {
                self.t1 = None;
                self.state = LinkState::Disconnected;
                self.push_event(LinkEvent::Disconnected);
            }
            Control::Unnumbered {
                kind: UFormat::Disc,
                poll_final,
            } => {
                // both sides are tearing down; agree enthusiastically
                self.push_unnumbered(UFormat::Ua, false, poll_final);
                self.t1 = None;
                self.state = LinkState::Disconnected;
                self.push_event(LinkEvent::Disconnected);
            }
            _ => {}
        }
    }

    fn t1_expired(&mut self) {
        match self.state {
            LinkState::AwaitingConnect => {
                if self.retries < self.config.retry_limit {
                    self.retries += 1;
                    self.sabme_phase = false;
                    self.push_unnumbered(UFormat::Sabm, true, true);
                    self.start_t1();
                } else {
                    self.fail_link(LinkEvent::ConnectTimedOut);
                }
            }
            LinkState::Connected => {
                self.retries += 1;
                if self.retries > self.config.retry_limit {
                    self.drop_link(LinkEvent::LinkLost);
                    return;
                }
                if self.va != self.vs {
                    // nudge the peer with the oldest outstanding frame
                    if let Some(info) = self.sent[self.va as usize] {
                        let ns = self.va;
                        self.push_info_frame(ns, info);
                    }
                } else {
                    self.push_supervisory(SFormat::Rr, true, true);
                }
                self.start_t1();
            }
            LinkState::AwaitingRelease => {
                if self.retries < self.config.retry_limit {
                    self.retries += 1;
                    self.push_unnumbered(UFormat::Disc, true, true);
                    self.start_t1();
                } else {
                    self.t1 = None;
                    self.state = LinkState::Disconnected;
                    self.push_event(LinkEvent::Disconnected);
                }
            }
            LinkState::Disconnected => {}
        }
    }

    fn t3_expired(&mut self) {
        if self.state != LinkState::Connected || self.t1.is_some() {
            return;
        }
        // poll the peer to confirm the link is still alive
        self.retries = 0;
        self.push_supervisory(SFormat::Rr, true, true);
        self.start_t1();
    }

    /// Apply an incoming N(R): everything before it is acknowledged.
    fn process_ack(&mut self, nr: u8) {
        if seq_diff(nr, self.va) > seq_diff(self.vs, self.va) {
            debug!(
                "N(R)={} outside V(A)={}..V(S)={}, ignoring",
                nr, self.va, self.vs
            );
            return;
        }
        let mut progressed = false;
        while self.va != nr {
            self.sent[self.va as usize] = None;
            self.va = seq(self.va + 1);
            progressed = true;
        }
        if progressed {
            self.retries = 0;
        }
        if self.va == self.vs {
            self.t1 = None;
            if self.state == LinkState::Connected {
                self.start_t3();
            }
        } else if progressed {
            self.t1 = Some(self.now + self.config.t1_ms);
        }
        if progressed && self.state == LinkState::Connected {
            self.flush_queued();
        }
    }

    fn establish(&mut self) {
        self.state = LinkState::Connected;
        self.sabme_phase = false;
        self.vs = 0;
        self.vr = 0;
        self.va = 0;
        self.retries = 0;
        self.peer_busy = false;
        self.t1 = None;
        self.start_t3();
        self.push_event(LinkEvent::Connected);
        self.flush_queued();
    }

    /// Send DISC and wait for the peer to confirm.
    fn release(&mut self) {
        self.sent = [None; 8];
        self.queued.clear();
        self.ack_due = None;
        self.peer_busy = false;
        self.retries = 1;
        self.push_unnumbered(UFormat::Disc, true, true);
        self.start_t1();
        self.state = LinkState::AwaitingRelease;
    }

    /// Immediate transition to Disconnected with an explanatory event.
    fn drop_link(&mut self, event: LinkEvent) {
        self.clear_timers();
        self.sent = [None; 8];
        self.queued.clear();
        self.peer_busy = false;
        self.retries = 0;
        self.state = LinkState::Disconnected;
        self.push_event(event);
    }

    /// A connect attempt ends without a link.
    fn fail_link(&mut self, event: LinkEvent) {
        self.clear_timers();
        self.queued.clear();
        self.sabme_phase = false;
        self.retries = 0;
        self.state = LinkState::Disconnected;
        self.push_event(event);
    }

    fn reset_sequence(&mut self) {
        self.vs = 0;
        self.vr = 0;
        self.va = 0;
        self.sent = [None; 8];
        self.queued.clear();
        self.peer_busy = false;
        self.retries = 0;
        self.ack_due = None;
    }

    fn clear_timers(&mut self) {
        self.t1 = None;
        self.t3 = None;
        self.t3_remaining = None;
        self.ack_due = None;
    }

    fn window_open(&self) -> bool {
        self.unacked() < self.config.window.min(MAX_WINDOW)
    }

    /// Move queued payloads into the window while it has room.
    fn flush_queued(&mut self) {
        while self.window_open() && !self.peer_busy {
            match self.queued.pop() {
                Some(info) => self.transmit_info(info),
                None => break,
            }
        }
    }

    fn transmit_info(&mut self, info: Info) {
        let ns = self.vs;
        self.sent[ns as usize] = Some(info);
        self.vs = seq(self.vs + 1);
        // this frame carries N(R), so any pending acknowledgement rides along
        self.ack_due = None;
        self.push_info_frame(ns, info);
        if self.t1.is_none() {
            self.retries = 0;
            self.start_t1();
        }
    }

    /// Resend every I-frame from V(A) onward, oldest first.
    fn retransmit_outstanding(&mut self) {
        let mut ns = self.va;
        while ns != self.vs {
            if let Some(info) = self.sent[ns as usize] {
                self.push_info_frame(ns, info);
            }
            ns = seq(ns + 1);
        }
        if self.va != self.vs {
            self.start_t1();
        }
    }

    fn start_t1(&mut self) {
        self.t1 = Some(self.now + self.config.t1_ms);
        self.t3 = None;
        self.t3_remaining = None;
    }

    fn start_t3(&mut self) {
        if self.keepalive_paused {
            self.t3 = None;
            self.t3_remaining = Some(self.config.t3_ms);
        } else {
            self.t3 = Some(self.now + self.config.t3_ms);
            self.t3_remaining = None;
        }
    }

    fn push_info_frame(&mut self, ns: u8, info: Info) {
        let control = Control::Info {
            ns,
            nr: self.vr,
            poll: false,
        };
        self.push_to_peer(control, true, Some(PID_NO_LAYER3), info);
    }

    fn push_supervisory(&mut self, kind: SFormat, command: bool, poll_final: bool) {
        let control = Control::Supervisory {
            kind,
            nr: self.vr,
            poll_final,
        };
        self.push_to_peer(control, command, None, Info::empty());
    }

    fn push_unnumbered(&mut self, kind: UFormat, command: bool, poll_final: bool) {
        let control = Control::Unnumbered { kind, poll_final };
        self.push_to_peer(control, command, None, Info::empty());
    }

    fn push_to_peer(&mut self, control: Control, command: bool, pid: Option<u8>, info: Info) {
        let Some(peer) = self.peer else {
            return;
        };
        let frame = Ax25Frame {
            dest: peer,
            source: self.mycall,
            path: self.path,
            command,
            control,
            pid,
            info,
        };
        if !self.out.push(frame) {
            debug!("outbound frame queue overflow, dropping frame");
        }
    }

    fn reply_dm(&mut self, frame: &Ax25Frame, final_bit: bool) {
        let dm = Ax25Frame {
            dest: frame.source,
            source: self.mycall,
            path: frame.path.reversed(),
            command: false,
            control: Control::Unnumbered {
                kind: UFormat::Dm,
                poll_final: final_bit,
            },
            pid: None,
            info: Info::empty(),
        };
        if !self.out.push(dm) {
            debug!("outbound frame queue overflow, dropping DM");
        }
    }

    fn push_event(&mut self, event: LinkEvent) {
        if !self.events.push(event) {
            debug!("event queue overflow, dropping {:?}", event);
        }
    }
}
