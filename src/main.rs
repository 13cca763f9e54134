mod db;
mod entities;
mod ipc;
mod slots;
mod timetable;

use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TIMETABLED_LOG";

fn init_logging() {
    // stdout carries the protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn write_bad_json(stdout: &mut io::Stdout, message: String) {
    // Can't reply without id.
    let resp = serde_json::json!({
        "ok": false,
        "error": { "code": "bad_json", "message": message }
    });
    let _ = writeln!(stdout, "{}", resp);
    let _ = stdout.flush();
}

fn main() {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "timetabled starting");

    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "request line is not utf-8");
                write_bad_json(&mut stdout, format!("request line is not valid UTF-8: {e}"));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "bad request line");
                write_bad_json(&mut stdout, e.to_string());
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, shutting down");
}
