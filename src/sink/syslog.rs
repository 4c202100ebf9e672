//! # Syslog Sink
//!
//! Delivers records to a syslog daemon over udp, tcp or unix-domain
//! transports, or to the platform's local syslog socket when no network is
//! configured. Frames follow RFC3164: `<PRI>` from the configured facility
//! and the per-level severity, a timestamp, the host name on remote
//! transports, and the configured tag with the process id.
//!
//! A dedicated worker owns the transport and reconnects with a bounded
//! doubling backoff; messages arriving while the transport is down stay
//! queued until the bounded queue fills, after which they are dropped and
//! counted through the error hook.

use std::io::Write;
use std::net::{TcpStream, UdpSocket};
#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use crate::config::{Options, SinkFormat, SyslogOpt};
use crate::entry::Entry;
use crate::hooks;
use crate::level::Level;
use crate::sink::{render, Hook, SinkFlags, SinkState};
use crate::utils::error::{Error, Result};

/// First reconnect delay after a transport failure.
const BACKOFF_START: Duration = Duration::from_millis(200);
/// Reconnect delay cap; also bounds how long an enqueue may block.
const BACKOFF_CAP: Duration = Duration::from_secs(5);
/// Worker idle tick.
const IDLE: Duration = Duration::from_millis(250);
/// Bounded frame queue depth.
const QUEUE_CAPACITY: usize = 512;
/// RFC3164 timestamp layout (space-padded day).
const STAMP: &str = "%b %e %H:%M:%S";

/// Syslog facility codes (RFC3164 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Facility {
    Kern = 0,
    User = 1,
    Mail = 2,
    Daemon = 3,
    Auth = 4,
    Syslog = 5,
    Lpr = 6,
    News = 7,
    Uucp = 8,
    Cron = 9,
    Authpriv = 10,
    Ftp = 11,
    Local0 = 16,
    Local1 = 17,
    Local2 = 18,
    Local3 = 19,
    Local4 = 20,
    Local5 = 21,
    Local6 = 22,
    Local7 = 23,
}

impl Facility {
    /// Parse a facility name, case-insensitive. Returns `None` for
    /// unrecognized names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "kern" => Some(Facility::Kern),
            "user" => Some(Facility::User),
            "mail" => Some(Facility::Mail),
            "daemon" => Some(Facility::Daemon),
            "auth" => Some(Facility::Auth),
            "syslog" => Some(Facility::Syslog),
            "lpr" => Some(Facility::Lpr),
            "news" => Some(Facility::News),
            "uucp" => Some(Facility::Uucp),
            "cron" => Some(Facility::Cron),
            "authpriv" => Some(Facility::Authpriv),
            "ftp" => Some(Facility::Ftp),
            "local0" => Some(Facility::Local0),
            "local1" => Some(Facility::Local1),
            "local2" => Some(Facility::Local2),
            "local3" => Some(Facility::Local3),
            "local4" => Some(Facility::Local4),
            "local5" => Some(Facility::Local5),
            "local6" => Some(Facility::Local6),
            "local7" => Some(Facility::Local7),
            _ => None,
        }
    }

    /// The facility name as it appears in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Kern => "kern",
            Facility::User => "user",
            Facility::Mail => "mail",
            Facility::Daemon => "daemon",
            Facility::Auth => "auth",
            Facility::Syslog => "syslog",
            Facility::Lpr => "lpr",
            Facility::News => "news",
            Facility::Uucp => "uucp",
            Facility::Cron => "cron",
            Facility::Authpriv => "authpriv",
            Facility::Ftp => "ftp",
            Facility::Local0 => "local0",
            Facility::Local1 => "local1",
            Facility::Local2 => "local2",
            Facility::Local3 => "local3",
            Facility::Local4 => "local4",
            Facility::Local5 => "local5",
            Facility::Local6 => "local6",
            Facility::Local7 => "local7",
        }
    }
}

/// Syslog severity codes (RFC3164 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Severity {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Severity {
    /// Parse a severity name, case-insensitive. Returns `None` for
    /// unrecognized names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "emerg" | "emergency" => Some(Severity::Emerg),
            "alert" => Some(Severity::Alert),
            "crit" | "critical" => Some(Severity::Crit),
            "err" | "error" => Some(Severity::Err),
            "warn" | "warning" => Some(Severity::Warning),
            "notice" => Some(Severity::Notice),
            "info" => Some(Severity::Info),
            "debug" => Some(Severity::Debug),
            _ => None,
        }
    }

    /// The fixed entry-level to severity dispatch.
    pub const fn from_level(level: Level) -> Self {
        match level {
            Level::Panic => Severity::Emerg,
            Level::Fatal => Severity::Crit,
            Level::Error => Severity::Err,
            Level::Warn => Severity::Warning,
            Level::Info => Severity::Info,
            // Nil never reaches a sink.
            Level::Debug | Level::Nil => Severity::Debug,
        }
    }
}

/// PRI value of one frame.
const fn priority(facility: Facility, severity: Severity) -> u8 {
    (facility as u8) << 3 | severity as u8
}

enum Transport {
    Udp(UdpSocket),
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    #[cfg(unix)]
    UnixGram(UnixDatagram),
}

impl Transport {
    /// Resolve the configured transport.
    ///
    /// Empty network and host route to the platform's local syslog socket.
    fn dial(network: &str, host: &str) -> Result<Transport> {
        match network {
            "udp" => {
                let socket = UdpSocket::bind("0.0.0.0:0")
                    .and_then(|s| s.connect(host).map(|_| s))
                    .map_err(|e| Error::TransportUnavailable(format!("udp {}: {}", host, e)))?;
                Ok(Transport::Udp(socket))
            }
            "tcp" => {
                let stream = TcpStream::connect(host)
                    .map_err(|e| Error::TransportUnavailable(format!("tcp {}: {}", host, e)))?;
                Ok(Transport::Tcp(stream))
            }
            #[cfg(unix)]
            "unix" => {
                let stream = UnixStream::connect(host)
                    .map_err(|e| Error::TransportUnavailable(format!("unix {}: {}", host, e)))?;
                Ok(Transport::Unix(stream))
            }
            #[cfg(unix)]
            "unixgram" => {
                let socket = UnixDatagram::unbound()
                    .and_then(|s| s.connect(host).map(|_| s))
                    .map_err(|e| {
                        Error::TransportUnavailable(format!("unixgram {}: {}", host, e))
                    })?;
                Ok(Transport::UnixGram(socket))
            }
            "" => local_syslog(),
            other => Err(Error::TransportUnavailable(format!(
                "unsupported network {:?}",
                other
            ))),
        }
    }

    /// Whether frames on this transport omit the host name.
    fn is_stream(&self) -> bool {
        match self {
            Transport::Tcp(_) => true,
            Transport::Udp(_) => false,
            #[cfg(unix)]
            Transport::Unix(_) => true,
            #[cfg(unix)]
            Transport::UnixGram(_) => false,
        }
    }

    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        match self {
            Transport::Udp(socket) => socket.send(frame).map(|_| ()),
            Transport::Tcp(stream) => stream.write_all(frame).and_then(|_| stream.flush()),
            #[cfg(unix)]
            Transport::Unix(stream) => stream.write_all(frame).and_then(|_| stream.flush()),
            #[cfg(unix)]
            Transport::UnixGram(socket) => socket.send(frame).map(|_| ()),
        }
    }
}

/// Connect to the platform's local syslog socket.
#[cfg(unix)]
fn local_syslog() -> Result<Transport> {
    const PATHS: &[&str] = &["/dev/log", "/var/run/syslog", "/var/run/log"];
    for path in PATHS {
        if let Ok(socket) = UnixDatagram::unbound().and_then(|s| s.connect(path).map(|_| s)) {
            return Ok(Transport::UnixGram(socket));
        }
        if let Ok(stream) = UnixStream::connect(path) {
            return Ok(Transport::Unix(stream));
        }
    }
    Err(Error::TransportUnavailable(
        "no local syslog socket found".to_string(),
    ))
}

#[cfg(not(unix))]
fn local_syslog() -> Result<Transport> {
    Err(Error::TransportUnavailable(
        "local syslog requires a unix platform".to_string(),
    ))
}

#[cfg(unix)]
fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer outlives the call and its length is passed along.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc == 0 {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..end]).into_owned()
    } else {
        "localhost".to_string()
    }
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// One queued syslog message.
struct Frame {
    severity: Severity,
    body: Vec<u8>,
}

/// Assemble one RFC3164 frame.
///
/// The host name is included only for remote datagram/stream transports;
/// local transports follow the platform convention and omit it. Stream
/// transports terminate each frame with a newline.
fn build_frame(
    facility: Facility,
    severity: Severity,
    tag: &str,
    host: Option<&str>,
    body: &[u8],
    newline: bool,
) -> Vec<u8> {
    let stamp = Local::now().format(STAMP);
    let trimmed = match body.last() {
        Some(b'\n') => &body[..body.len() - 1],
        _ => body,
    };
    let mut frame = match host {
        Some(host) => format!(
            "<{}>{} {} {}[{}]: ",
            priority(facility, severity),
            stamp,
            host,
            tag,
            std::process::id()
        ),
        None => format!(
            "<{}>{} {}[{}]: ",
            priority(facility, severity),
            stamp,
            tag,
            std::process::id()
        ),
    }
    .into_bytes();
    frame.extend_from_slice(trimmed);
    if newline {
        frame.push(b'\n');
    }
    frame
}

/// Syslog sink with one background transport worker.
pub struct SyslogSink {
    levels: Vec<Level>,
    flags: SinkFlags,
    format: SinkFormat,
    facility: Facility,
    tag: String,
    severity_override: Option<Severity>,
    state: AtomicU8,
    pending: Mutex<Option<Transport>>,
    network: String,
    host: String,
    tx: Mutex<Option<Sender<Frame>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyslogSink {
    /// Resolve the transport from a validated options fragment.
    ///
    /// The transport is dialed eagerly so that a dead target fails the
    /// configuration instead of the first log call. The sink starts in
    /// `Created`; call `start` to spawn the worker.
    pub fn open(opt: &SyslogOpt) -> Result<Self> {
        let transport = Transport::dial(&opt.network, &opt.host)?;
        let facility = if opt.facility.is_empty() {
            Facility::User
        } else {
            Facility::from_name(&opt.facility).ok_or_else(|| {
                Error::SinkConstructFailed(format!("unknown facility {:?}", opt.facility))
            })?
        };
        let severity_override = if opt.severity_override.is_empty() {
            None
        } else {
            Some(Severity::from_name(&opt.severity_override).ok_or_else(|| {
                Error::SinkConstructFailed(format!(
                    "unknown severity {:?}",
                    opt.severity_override
                ))
            })?)
        };
        let tag = if opt.tag.is_empty() {
            default_tag()
        } else {
            opt.tag.clone()
        };
        Ok(SyslogSink {
            levels: Options::expand_levels(&opt.levels),
            flags: SinkFlags::from(opt),
            format: opt.format,
            facility,
            tag,
            severity_override,
            state: AtomicU8::new(SinkState::Created as u8),
            pending: Mutex::new(Some(transport)),
            network: opt.network.clone(),
            host: opt.host.clone(),
            tx: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    /// Spawn the transport worker and transition to `Running`.
    pub fn start(&self) {
        let created = SinkState::Created as u8;
        let running = SinkState::Running as u8;
        if self
            .state
            .compare_exchange(created, running, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Some(transport) = self.pending.lock().take() else {
            return;
        };
        let (tx, rx) = bounded::<Frame>(QUEUE_CAPACITY);
        let worker = Worker {
            facility: self.facility,
            tag: self.tag.clone(),
            network: self.network.clone(),
            host: self.host.clone(),
        };
        let spawned = std::thread::Builder::new()
            .name("fanlog-syslog".to_string())
            .spawn(move || worker.run(transport, rx));
        match spawned {
            Ok(handle) => {
                *self.tx.lock() = Some(tx);
                *self.worker.lock() = Some(handle);
            }
            Err(e) => {
                self.state.store(SinkState::Closed as u8, Ordering::Release);
                hooks::report_error(&Error::SinkConstructFailed(format!(
                    "syslog worker thread: {}",
                    e
                )));
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn enqueue(&self, severity: Severity, body: Vec<u8>) -> Result<()> {
        let frame = Frame { severity, body };
        match self.state() {
            SinkState::Running => match self.tx.lock().clone() {
                Some(tx) => match tx.send_timeout(frame, BACKOFF_CAP) {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => Err(Error::TransportUnavailable(
                        "syslog queue full, message dropped".to_string(),
                    )),
                    Err(SendTimeoutError::Disconnected(_)) => Err(Error::SinkClosed),
                },
                None => Err(Error::SinkClosing),
            },
            SinkState::Created | SinkState::Draining => match self.tx.lock().clone() {
                Some(tx) => match tx.try_send(frame) {
                    Ok(()) => Ok(()),
                    Err(TrySendError::Full(_)) => Err(Error::SinkClosing),
                    Err(TrySendError::Disconnected(_)) => Err(Error::SinkClosed),
                },
                None => Err(Error::SinkClosing),
            },
            SinkState::Closed => Err(Error::SinkClosed),
        }
    }
}

impl Hook for SyslogSink {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn fire(&self, entry: &Entry) -> Result<()> {
        let Some(payload) = render(entry, &self.flags, self.format, None)? else {
            return Ok(());
        };
        let severity = self
            .severity_override
            .unwrap_or_else(|| Severity::from_level(entry.level));
        self.enqueue(severity, payload)
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        let severity = self.severity_override.unwrap_or(Severity::Info);
        self.enqueue(severity, payload.to_vec())
    }

    fn close(&self) -> Result<()> {
        let prev = self.state.swap(SinkState::Draining as u8, Ordering::AcqRel);
        if SinkState::from_u8(prev) == SinkState::Closed {
            self.state.store(SinkState::Closed as u8, Ordering::Release);
            return Ok(());
        }
        self.tx.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.state.store(SinkState::Closed as u8, Ordering::Release);
        Ok(())
    }
}

impl Drop for SyslogSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn default_tag() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "fanlog".to_string())
}

/// Background transport owner: sends frames, reconnects with a doubling
/// backoff capped at five seconds, and reports one error per backoff window.
struct Worker {
    facility: Facility,
    tag: String,
    network: String,
    host: String,
}

impl Worker {
    fn run(self, transport: Transport, rx: Receiver<Frame>) {
        use std::collections::VecDeque;

        let remote = matches!(self.network.as_str(), "udp" | "tcp");
        let host = remote.then(hostname);
        let mut transport = Some(transport);
        let mut backoff = BACKOFF_START;
        let mut next_attempt = Instant::now();
        // Frames pulled off the channel but not yet delivered; bounded by
        // the channel capacity plus one redelivery slot.
        let mut held: VecDeque<Frame> = VecDeque::new();

        loop {
            let Some(active) = transport.as_mut() else {
                // Transport down: keep the queue visible so shutdown stays
                // observable, then wait out the backoff window.
                let mut closed = false;
                while held.len() < QUEUE_CAPACITY {
                    match rx.try_recv() {
                        Ok(frame) => held.push_back(frame),
                        Err(crossbeam_channel::TryRecvError::Empty) => break,
                        Err(crossbeam_channel::TryRecvError::Disconnected) => {
                            closed = true;
                            break;
                        }
                    }
                }
                let now = Instant::now();
                if now >= next_attempt {
                    match Transport::dial(&self.network, &self.host) {
                        Ok(dialed) => {
                            transport = Some(dialed);
                            backoff = BACKOFF_START;
                        }
                        Err(err) => {
                            hooks::report_error(&err);
                            if closed {
                                // Shutdown with an unreachable target:
                                // drop what is left.
                                break;
                            }
                            next_attempt = now + backoff;
                            backoff = (backoff * 2).min(BACKOFF_CAP);
                        }
                    }
                } else if closed && held.is_empty() {
                    break;
                } else {
                    std::thread::sleep((next_attempt - now).min(IDLE));
                }
                continue;
            };

            let frame = match held.pop_front() {
                Some(frame) => frame,
                None => match rx.recv_timeout(IDLE) {
                    Ok(frame) => frame,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        // Drain what is left best-effort, then release.
                        for frame in rx.try_iter() {
                            let bytes = build_frame(
                                self.facility,
                                frame.severity,
                                &self.tag,
                                host.as_deref(),
                                &frame.body,
                                active.is_stream(),
                            );
                            if active.send(&bytes).is_err() {
                                break;
                            }
                        }
                        break;
                    }
                },
            };

            let bytes = build_frame(
                self.facility,
                frame.severity,
                &self.tag,
                host.as_deref(),
                &frame.body,
                active.is_stream(),
            );
            if let Err(e) = active.send(&bytes) {
                hooks::report_error(&Error::TransportUnavailable(format!(
                    "{} {}: {}",
                    self.network, self.host, e
                )));
                transport = None;
                next_attempt = Instant::now() + backoff;
                held.push_front(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_round_trip() {
        for name in ["kern", "user", "daemon", "local0", "local7"] {
            let facility = Facility::from_name(name).expect("known facility");
            assert_eq!(facility.as_str(), name);
        }
        assert_eq!(Facility::from_name("LOCAL3"), Some(Facility::Local3));
        assert_eq!(Facility::from_name("local9"), None);
    }

    #[test]
    fn test_severity_from_level() {
        assert_eq!(Severity::from_level(Level::Panic), Severity::Emerg);
        assert_eq!(Severity::from_level(Level::Fatal), Severity::Crit);
        assert_eq!(Severity::from_level(Level::Error), Severity::Err);
        assert_eq!(Severity::from_level(Level::Warn), Severity::Warning);
        assert_eq!(Severity::from_level(Level::Info), Severity::Info);
        assert_eq!(Severity::from_level(Level::Debug), Severity::Debug);
    }

    #[test]
    fn test_priority_encoding() {
        // LOCAL0 = 16, CRIT = 2 -> 16*8 + 2 = 130
        assert_eq!(priority(Facility::Local0, Severity::Crit), 130);
        assert_eq!(priority(Facility::Kern, Severity::Emerg), 0);
        assert_eq!(priority(Facility::User, Severity::Debug), 15);
    }

    #[test]
    fn test_build_frame_remote() {
        let frame = build_frame(
            Facility::Local0,
            Severity::Crit,
            "myapp",
            Some("testhost"),
            b"die\n",
            false,
        );
        let text = String::from_utf8(frame).expect("utf8");
        assert!(text.starts_with("<130>"));
        assert!(text.contains(" testhost myapp["));
        assert!(text.ends_with("]: die"));
    }

    #[test]
    fn test_build_frame_local_omits_host_and_keeps_newline() {
        let frame = build_frame(
            Facility::User,
            Severity::Info,
            "myapp",
            None,
            b"hello",
            true,
        );
        let text = String::from_utf8(frame).expect("utf8");
        assert!(!text.contains("testhost"));
        assert!(text.contains(" myapp["));
        assert!(text.ends_with(": hello\n"));
    }

    #[test]
    fn test_udp_sink_delivers_datagram() {
        let server = UdpSocket::bind("127.0.0.1:0").expect("bind listener");
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        let addr = server.local_addr().expect("addr");

        let opt = SyslogOpt {
            network: "udp".to_string(),
            host: addr.to_string(),
            facility: "local0".to_string(),
            tag: "myapp".to_string(),
            ..SyslogOpt::default()
        };
        let sink = SyslogSink::open(&opt).expect("open");
        sink.start();

        let entry = Entry::new(Level::Fatal, "die");
        sink.fire(&entry).expect("fire");
        sink.close().expect("close");

        let mut buf = [0u8; 1024];
        let (n, _) = server.recv_from(&mut buf).expect("datagram");
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        // LOCAL0/CRIT
        assert!(text.starts_with("<130>"), "unexpected frame: {}", text);
        assert!(text.contains("myapp["));
        assert!(text.contains("die"));
    }

    #[test]
    fn test_write_after_close_rejected() {
        let server = UdpSocket::bind("127.0.0.1:0").expect("bind listener");
        let opt = SyslogOpt {
            network: "udp".to_string(),
            host: server.local_addr().expect("addr").to_string(),
            ..SyslogOpt::default()
        };
        let sink = SyslogSink::open(&opt).expect("open");
        sink.start();
        sink.close().expect("close");
        assert_eq!(sink.write(b"late"), Err(Error::SinkClosed));
    }

    #[test]
    fn test_open_rejects_dead_tcp_target() {
        // Port 1 on localhost is essentially never listening.
        let opt = SyslogOpt {
            network: "tcp".to_string(),
            host: "127.0.0.1:1".to_string(),
            ..SyslogOpt::default()
        };
        assert!(matches!(
            SyslogSink::open(&opt),
            Err(Error::TransportUnavailable(_))
        ));
    }
}
