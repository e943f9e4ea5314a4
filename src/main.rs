use std::io::{self, BufRead, Write};

use educad::config::{DaemonConfig, LogFormat};
use educad::ipc::{self, AppState};
use educad::persist::MemorySnapshotStore;
use educad::registry::Registry;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &DaemonConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the protocol; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    };
    if let Err(e) = installed {
        eprintln!("tracing init failed: {e}");
    }
}

fn write_line(stdout: &mut impl Write, resp: &serde_json::Value) {
    let line = serde_json::to_string(resp).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    let _ = writeln!(stdout, "{}", line);
    let _ = stdout.flush();
}

fn main() {
    let config = DaemonConfig::from_env();
    init_tracing(&config);

    let registry = match Registry::open(Box::new(MemorySnapshotStore::new())) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to open in-memory registry");
            std::process::exit(1);
        }
    };
    let mut state = AppState::new(registry);

    if let Some(path) = config.workspace.as_deref() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            warn!(workspace = %path.display(), error = %e.message, "workspace auto-select failed");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "educad ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                write_line(
                    &mut stdout,
                    &json!({
                        "id": null,
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                );
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
    }
}
