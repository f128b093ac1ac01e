use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;

use crate::depot::Depot;
use crate::net::connection;
use crate::protocol::defer;
use crate::protocol::message::Command;
use crate::{log_debug, log_error};

/// Decode one inbound line and run its handler. Malformed lines are
/// dropped without reply. An `IM` here arrives after the handshake (or
/// from a fired deferral) and has no placeholder left to identify, so it
/// is ignored too.
pub fn dispatch_line(depot: &Arc<Depot>, line: &str) {
    let Some(command) = Command::parse(line) else {
        log_debug!("Protocol", "dropping malformed line {line:?}");
        return;
    };

    match command {
        Command::Connect { port } => on_connect(depot, &port),
        Command::Deliver { quantity, kind } => depot.upsert_resource(&kind, quantity),
        Command::Withdraw { quantity, kind } => depot.upsert_resource(&kind, -quantity),
        Command::Transfer {
            quantity,
            kind,
            dest,
        } => on_transfer(depot, quantity, &kind, &dest),
        Command::Defer { key, operation } => defer::on_defer(depot, key, operation),
        Command::Execute { key } => defer::on_execute(depot, key),
        Command::Im { .. } => log_debug!("Protocol", "ignoring IM outside handshake"),
    }
}

/// Dial a not-yet-connected depot by port and start its peer workers.
/// A port we already know (our own included) is left alone; a failed
/// dial leaves no peer entry behind.
fn on_connect(depot: &Arc<Depot>, port: &str) {
    if depot.lock().find_peer_by_port(port).is_some() {
        return;
    }

    let Ok(port_num) = port.parse::<u16>() else {
        log_debug!("Connection", "connect to unusable port {port:?}");
        return;
    };

    let stream = match TcpStream::connect(("localhost", port_num)) {
        Ok(stream) => stream,
        Err(err) => {
            log_debug!("Connection", "dial to port {port} failed: {err}");
            return;
        }
    };

    if let Err(err) = connection::start_peer(depot, stream) {
        log_error!("Connection", "failed to start peer workers: {err:#}");
    }
}

/// Move stock toward a known peer: decrement the local quantity and emit
/// the matching `Deliver` on the destination's socket. Both happen under
/// the state lock so concurrent handlers observe them together.
fn on_transfer(depot: &Arc<Depot>, quantity: i64, kind: &str, dest: &str) {
    let mut data = depot.lock();
    if data.self_name() == dest {
        return;
    }
    let Some(peer) = data.find_peer_by_name(dest) else {
        return;
    };

    data.upsert_resource(kind, -quantity);

    let line = format!("Deliver:{quantity}:{kind}\n");
    if let Some(writer) = data.peer(peer).writer.as_ref() {
        let mut writer = writer;
        if let Err(err) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            log_debug!("Connection", "deliver to {dest} failed: {err}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn depot_with(name: &str, goods: &[(&str, i64)]) -> Arc<Depot> {
        Arc::new(Depot::new(
            name.to_string(),
            goods.iter().map(|(n, q)| (n.to_string(), *q)).collect(),
        ))
    }

    fn quantity_of(depot: &Depot, good: &str) -> i64 {
        depot
            .lock()
            .resources
            .iter()
            .find(|r| r.name == good)
            .map(|r| r.quantity)
            .unwrap_or(0)
    }

    #[test]
    fn deliver_and_withdraw_adjust_inventory() {
        let depot = depot_with("A", &[("apple", 3)]);
        dispatch_line(&depot, "Deliver:5:apple");
        dispatch_line(&depot, "Withdraw:2:apple");
        assert_eq!(quantity_of(&depot, "apple"), 6);
    }

    #[test]
    fn withdraw_may_drive_stock_negative() {
        let depot = depot_with("A", &[]);
        dispatch_line(&depot, "Withdraw:4:banana");
        assert_eq!(quantity_of(&depot, "banana"), -4);
    }

    #[test]
    fn malformed_lines_change_nothing() {
        let depot = depot_with("A", &[("apple", 3)]);
        dispatch_line(&depot, "Deliver:0:apple");
        dispatch_line(&depot, "Deliver:5:apple:junk");
        dispatch_line(&depot, "Hello");
        dispatch_line(&depot, "");
        assert_eq!(quantity_of(&depot, "apple"), 3);
    }

    #[test]
    fn transfer_to_self_is_a_noop() {
        let depot = depot_with("A", &[("apple", 10)]);
        dispatch_line(&depot, "Transfer:4:apple:A");
        assert_eq!(quantity_of(&depot, "apple"), 10);
    }

    #[test]
    fn transfer_to_unknown_peer_is_a_noop() {
        let depot = depot_with("A", &[("apple", 10)]);
        dispatch_line(&depot, "Transfer:4:apple:Nowhere");
        assert_eq!(quantity_of(&depot, "apple"), 10);
    }

    #[test]
    fn im_after_handshake_is_ignored() {
        let depot = depot_with("A", &[]);
        dispatch_line(&depot, "IM:4567:B");
        assert_eq!(depot.snapshot_for_display().neighbours, Vec::<String>::new());
    }
}
