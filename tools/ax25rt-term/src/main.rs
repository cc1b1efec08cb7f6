use std::fs::File;
use std::io::{self, BufRead, Write as _};
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ax25term::commands::{self, Command};
use ax25term::config::SessionConfig;
use ax25term::session::Session;
use ax25term::terminal::{LinkStatus, Terminal};
use ax25term::tnc;
use ax25term::{Callsign, DigiPath};
use clap::Parser;
use log::LevelFilter;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8001;

#[derive(Parser)]
#[command(
    name = "ax25rt-term",
    version,
    about = "Interactive AX.25 packet terminal speaking KISS to a TNC over TCP"
)]
struct Args {
    #[arg(value_parser = valid_callsign, help = "Your callsign, e.g. KC3SMW-0")]
    mycall: Callsign,
    #[arg(value_parser = valid_callsign, help = "Station to connect to immediately")]
    target: Option<Callsign>,
    #[arg(help = "TNC host, as HOST or HOST:PORT [default: 127.0.0.1]")]
    host: Option<String>,
    #[arg(help = "TNC TCP port [default: 8001]")]
    port: Option<u16>,
}

fn valid_callsign(s: &str) -> Result<Callsign, String> {
    Callsign::parse(s).map_err(|e| e.to_string())
}

fn endpoint(args: &Args) -> Result<(String, u16), String> {
    let Some(host) = &args.host else {
        return Ok((DEFAULT_HOST.to_string(), args.port.unwrap_or(DEFAULT_PORT)));
    };
    match host.split_once(':') {
        Some((name, port)) => {
            if args.port.is_some() {
                return Err("give the port either in HOST:PORT or separately, not both".into());
            }
            let port: u16 = port
                .parse()
                .map_err(|_| format!("'{port}' is not a valid port number"))?;
            Ok((name.to_string(), port))
        }
        None => Ok((host.clone(), args.port.unwrap_or(DEFAULT_PORT))),
    }
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .format_timestamp(None)
        .init();
    // /debug raises this back to Debug for frame traces
    log::set_max_level(LevelFilter::Info);

    let (host, port) = match endpoint(&args) {
        Ok(ep) => ep,
        Err(e) => {
            eprintln!("{e}");
            exit(2);
        }
    };

    let stream = match tnc::connect_tcp(&host, port) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };
    println!("Connected to KISS TNC at {host}:{port} as {}", args.mycall);

    let session_log = open_session_log();
    let pager = Arc::new(AtomicBool::new(false));
    let terminal = ConsoleTerminal {
        pager: pager.clone(),
        log: session_log.clone(),
    };
    let session = match Session::start(stream, terminal, SessionConfig::new(args.mycall)) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };

    if let Some(target) = args.target {
        session.connect(target, DigiPath::new());
    }

    input_loop(&session, &pager, &session_log);

    let graceful = session.is_alive();
    session.quit();
    exit(if graceful { 0 } else { 1 });
}

fn input_loop(session: &Session, pager: &Arc<AtomicBool>, session_log: &Option<Arc<Mutex<File>>>) {
    let mut echo = false;
    let mut debug = false;
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        // any input satisfies a pending remote pager prompt
        pager.store(false, Ordering::Release);
        if echo {
            println!("> {line}");
        }
        append_log(session_log, &format!("> {line}\n"));
        if !session.is_alive() {
            return;
        }
        if !line.starts_with('/') {
            session.line(line);
            continue;
        }
        match commands::parse(&line) {
            Ok(Command::Connect { peer, path }) => session.connect(peer, path),
            Ok(Command::Disconnect) => session.disconnect(),
            Ok(Command::UnprotoOnce {
                dest,
                path,
                message,
            }) => session.unproto_once(dest, path, message),
            Ok(Command::UnprotoEnter { dest, path }) => session.unproto_enter(dest, path),
            Ok(Command::UnprotoExit) => session.unproto_exit(),
            Ok(Command::Retries(n)) => session.set_retries(n),
            Ok(Command::Echo(enabled)) => {
                echo = enabled;
                println!("Local echo {}.", if echo { "on" } else { "off" });
            }
            Ok(Command::Crlf(enabled)) => session.set_crlf(enabled),
            Ok(Command::Debug) => {
                debug = !debug;
                log::set_max_level(if debug {
                    LevelFilter::Debug
                } else {
                    LevelFilter::Info
                });
                println!("Frame tracing {}.", if debug { "on" } else { "off" });
            }
            Ok(Command::Status) => session.status(),
            Ok(Command::Clear) => {
                print!("\x1b[2J\x1b[H");
                let _ = io::stdout().flush();
            }
            Ok(Command::Help) => print_help(),
            Ok(Command::Quit) => return,
            Ok(Command::Unknown) => {
                // remote nodes have slash-commands of their own
                if session.is_connected() {
                    session.line(line);
                } else {
                    println!("no ***");
                }
            }
            Err(e) => println!("{e}"),
        }
    }
}

fn print_help() {
    println!(
        "Commands:\n\
         /connect CALL [via DIGI1,DIGI2]   establish a link (/c)\n\
         /disconnect                       release the link (/d)\n\
         /unproto DEST [via ...] [msg]     send UI, or enter UNPROTO mode (/u)\n\
         /upexit                           leave UNPROTO mode (/ex)\n\
         /retries N                        set the retry limit (1-10)\n\
         /echo on|off                      local echo of typed lines\n\
         /crlf on|off                      line terminator CRLF instead of CR\n\
         /debug                            toggle frame tracing\n\
         /status                           show link state\n\
         /clear                            clear the screen\n\
         /quit                             disconnect and exit (/q)"
    );
}

fn open_session_log() -> Option<Arc<Mutex<File>>> {
    let name = chrono::Local::now()
        .format("session-%Y%m%d-%H%M%S.log")
        .to_string();
    match File::create(&name) {
        Ok(file) => Some(Arc::new(Mutex::new(file))),
        Err(e) => {
            eprintln!("session log disabled: {e}");
            None
        }
    }
}

fn append_log(log: &Option<Arc<Mutex<File>>>, text: &str) {
    if let Some(log) = log {
        let _ = log.lock().unwrap().write_all(text.as_bytes());
    }
}

/// Console front end run on the dispatcher thread.
struct ConsoleTerminal {
    pager: Arc<AtomicBool>,
    log: Option<Arc<Mutex<File>>>,
}

impl Terminal for ConsoleTerminal {
    fn rx(&mut self, source: &Callsign, pid: u8, text: &[u8]) {
        if pid != 0xF0 {
            log::debug!("PID {pid:#04x} from {source}");
        }
        let rendered = render(&String::from_utf8_lossy(text));
        print!("{rendered}");
        let _ = io::stdout().flush();
        append_log(&self.log, &rendered);
        self.pager
            .store(pager_prompt(&rendered), Ordering::Release);
    }

    fn status(&mut self, status: LinkStatus) {
        let line = describe(&status);
        println!("{line}");
        append_log(&self.log, &format!("{line}\n"));
    }

    fn notice(&mut self, text: &str) {
        println!("{text}");
    }

    fn pager_pending(&mut self) -> bool {
        self.pager.load(Ordering::Acquire)
    }
}

/// Map packet line endings onto the local convention.
fn render(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Does the tail of this text look like a BBS "press enter to continue"
/// prompt? Purely heuristic; the engine only consumes the boolean.
fn pager_prompt(text: &str) -> bool {
    let lower = text.trim_end().to_ascii_lowercase();
    ["press enter", "press <cr>", "<a>bort", "more (y/n", "continue?"]
        .iter()
        .any(|pattern| lower.contains(pattern))
}

fn describe(status: &LinkStatus) -> String {
    match status {
        LinkStatus::Connecting(peer) => format!("[LINK] Connecting to {peer}..."),
        LinkStatus::Connected(peer) => format!("[LINK] CONNECTED to {peer}"),
        LinkStatus::Disconnected => "[LINK] Disconnected.".into(),
        LinkStatus::PeerDisconnected => "[LINK] Peer requested DISC.".into(),
        LinkStatus::PeerRefused => "[LINK] Connection refused by peer.".into(),
        LinkStatus::ConnectTimedOut { attempts } => {
            format!("[LINK] Connect timed out after {attempts} attempts.")
        }
        LinkStatus::LinkLost => "[LINK] Link lost; retries exhausted.".into(),
        LinkStatus::ProtocolError => "[LINK] Protocol error reported by peer.".into(),
        LinkStatus::TransportDown => "[LINK] TNC connection lost.".into(),
        LinkStatus::UnprotoSent(dest) => format!("[UNPROTO] Sent to {dest}."),
    }
}
