use std::io::{self, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use anyhow::Context;

use crate::depot::Depot;
use crate::net::connection;
use crate::{log_debug, log_error};

/// Bind an ephemeral loopback port, record it as this depot's own port,
/// announce it on stdout, then accept connections forever on a dedicated
/// thread. Returns the bound port.
pub fn start(depot: Arc<Depot>) -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("binding listener socket")?;
    let port = listener
        .local_addr()
        .context("reading listener address")?
        .port();
    depot.set_self_port(port.to_string());

    let mut stdout = io::stdout();
    writeln!(stdout, "{port}")
        .and_then(|_| stdout.flush())
        .context("announcing port")?;

    thread::spawn(move || accept_loop(listener, depot));
    Ok(port)
}

fn accept_loop(listener: TcpListener, depot: Arc<Depot>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(err) = connection::start_peer(&depot, stream) {
                    log_error!("Listener", "failed to start peer workers: {err:#}");
                }
            }
            Err(err) => log_debug!("Listener", "accept failed: {err}"),
        }
    }
}
