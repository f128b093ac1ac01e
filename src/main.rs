use std::env;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGPIPE};
use signal_hook::iterator::Signals;

use depot::utils::log::{self, LogLevel};
use depot::{cli, log_debug, log_error, net::listener, Depot};

/// Set when a write to a dead peer raised a broken pipe. The signal is
/// recorded and otherwise ignored; the failed write itself is swallowed
/// at the call site.
static BROKEN_PIPE_SEEN: AtomicBool = AtomicBool::new(false);

fn main() {
    if let Ok(level) = env::var("DEPOT_LOG") {
        if let Some(level) = LogLevel::parse(&level) {
            log::set_global_log_level(level);
        }
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let config = match cli::parse(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(err.exit_code());
        }
    };

    let depot = Arc::new(Depot::new(config.name, config.goods));

    // A depot that cannot listen keeps running; it just never hears from
    // anyone and never dials out.
    if let Err(err) = listener::start(Arc::clone(&depot)) {
        log_error!("Listener", "{err:#}");
    }

    supervise(&depot);
}

/// Own the process for its whole life: block on signals, dumping state on
/// SIGHUP and surviving SIGPIPE from writes to dead peers.
fn supervise(depot: &Depot) {
    let mut signals = match Signals::new([SIGHUP, SIGPIPE]) {
        Ok(signals) => signals,
        Err(err) => {
            log_error!("Supervisor", "cannot install signal handlers: {err}");
            loop {
                std::thread::park();
            }
        }
    };

    for signal in signals.forever() {
        match signal {
            SIGHUP => print_depot_data(depot),
            SIGPIPE => {
                BROKEN_PIPE_SEEN.store(true, Ordering::Relaxed);
                log_debug!("Supervisor", "broken pipe on a peer write");
            }
            _ => {}
        }
    }
}

/// The SIGHUP dump: non-zero goods and identified neighbours, both
/// sorted, headers always present.
fn print_depot_data(depot: &Depot) {
    let snapshot = depot.snapshot_for_display();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = out.write_all(snapshot.render().as_bytes());
    let _ = out.flush();
}
