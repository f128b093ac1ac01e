//! End-to-end scenarios driving an in-process depot over real sockets.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use depot::net::listener;
use depot::Depot;

fn start_depot(name: &str, goods: &[(&str, i64)]) -> (Arc<Depot>, u16) {
    let depot = Arc::new(Depot::new(
        name.to_string(),
        goods.iter().map(|(n, q)| (n.to_string(), *q)).collect(),
    ));
    let port = listener::start(Arc::clone(&depot)).expect("listener should bind");
    (depot, port)
}

fn quantity_of(depot: &Depot, good: &str) -> i64 {
    depot
        .snapshot_for_display()
        .goods
        .iter()
        .find(|(name, _)| name == good)
        .map(|(_, quantity)| *quantity)
        .unwrap_or(0)
}

fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

/// Connect to a depot and complete the handshake under `name`.
fn connect_as(port: u16, name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("dial depot");
    stream
        .write_all(format!("IM:9999:{name}\n").as_bytes())
        .expect("send handshake");
    stream
}

/// Send a sentinel deliver and wait until it lands. Lines from one peer
/// are processed in order, so everything sent before the sentinel has
/// been handled once it shows up.
fn drain_peer(depot: &Depot, stream: &mut TcpStream, marker: &str) {
    stream
        .write_all(format!("Deliver:1:{marker}\n").as_bytes())
        .expect("send marker");
    wait_for("marker delivery", || quantity_of(depot, marker) == 1);
}

#[test]
fn announces_port_and_introduces_itself() {
    let (depot, port) = start_depot("A", &[]);
    assert_ne!(port, 0);

    // a fresh depot dumps bare headers
    assert_eq!(depot.snapshot_for_display().render(), "Goods:\nNeighbours:\n");

    // the depot speaks first: IM with its own port and name
    let stream = connect_as(port, "B");
    let mut reader = BufReader::new(stream);
    let mut greeting = String::new();
    reader.read_line(&mut greeting).expect("read greeting");
    assert_eq!(greeting, format!("IM:{port}:A\n"));
}

#[test]
fn deliver_then_withdraw_adjusts_stock() {
    let (depot, port) = start_depot("A", &[("apple", 3)]);
    let mut peer = connect_as(port, "B");
    peer.write_all(b"Deliver:5:apple\nWithdraw:2:apple\n")
        .expect("send adjustments");

    wait_for("apple to reach 6", || quantity_of(&depot, "apple") == 6);
    assert_eq!(depot.snapshot_for_display().neighbours, vec!["B".to_string()]);
}

#[test]
fn deliver_creates_resource_on_first_reference() {
    let (depot, port) = start_depot("A", &[]);
    let mut peer = connect_as(port, "B");
    peer.write_all(b"Deliver:4:banana\n").expect("send deliver");

    wait_for("banana to appear", || quantity_of(&depot, "banana") == 4);
}

#[test]
fn transfer_moves_stock_to_a_connected_depot() {
    let (depot_a, port_a) = start_depot("A", &[("apple", 10)]);
    let (depot_b, port_b) = start_depot("B", &[]);

    let mut ctl = connect_as(port_a, "Ctl");
    ctl.write_all(format!("Connect:{port_b}\n").as_bytes())
        .expect("send connect");

    wait_for("A to learn B's name", || {
        depot_a
            .snapshot_for_display()
            .neighbours
            .contains(&"B".to_string())
    });
    wait_for("B to learn A's name", || {
        depot_b
            .snapshot_for_display()
            .neighbours
            .contains(&"A".to_string())
    });

    // a second Connect to a known port must not add another peer
    ctl.write_all(format!("Connect:{port_b}\n").as_bytes())
        .expect("send duplicate connect");
    drain_peer(&depot_a, &mut ctl, "marker");
    let neighbours = depot_a.snapshot_for_display().neighbours;
    assert_eq!(neighbours.iter().filter(|n| *n == "B").count(), 1);

    ctl.write_all(b"Transfer:3:apple:B\n").expect("send transfer");
    wait_for("B to receive apples", || quantity_of(&depot_b, "apple") == 3);
    assert_eq!(quantity_of(&depot_a, "apple"), 7);

    // exactly one deliver: the quantities stay put
    thread::sleep(Duration::from_millis(100));
    assert_eq!(quantity_of(&depot_b, "apple"), 3);
    assert_eq!(quantity_of(&depot_a, "apple"), 7);
}

#[test]
fn transfer_to_self_changes_nothing() {
    let (depot, port) = start_depot("A", &[("apple", 10)]);
    let mut ctl = connect_as(port, "Ctl");
    ctl.write_all(b"Transfer:4:apple:A\n").expect("send transfer");

    drain_peer(&depot, &mut ctl, "marker");
    assert_eq!(quantity_of(&depot, "apple"), 10);
}

#[test]
fn defer_and_execute_over_the_wire() {
    let (depot, port) = start_depot("A", &[]);
    let mut peer = connect_as(port, "B");
    peer.write_all(
        b"Defer:7:Deliver:1:x\nDefer:7:Deliver:2:x\nDefer:8:Deliver:100:x\nExecute:7\n",
    )
    .expect("send deferrals");

    wait_for("key 7 to fire", || quantity_of(&depot, "x") == 3);

    peer.write_all(b"Execute:7\n").expect("re-execute key 7");
    drain_peer(&depot, &mut peer, "marker");
    assert_eq!(quantity_of(&depot, "x"), 3);

    peer.write_all(b"Execute:8\n").expect("execute key 8");
    wait_for("key 8 to fire", || quantity_of(&depot, "x") == 103);

    depot.shutdown();
}

#[test]
fn bad_handshake_silences_the_peer() {
    let (depot, port) = start_depot("A", &[]);
    let mut peer = TcpStream::connect(("127.0.0.1", port)).expect("dial depot");
    peer.write_all(b"Hello\nDeliver:99:x\n").expect("send lines");

    thread::sleep(Duration::from_millis(200));
    assert_eq!(quantity_of(&depot, "x"), 0);
    assert!(depot.snapshot_for_display().neighbours.is_empty());
}

#[test]
fn valid_command_as_first_line_still_silences_the_peer() {
    let (depot, port) = start_depot("A", &[]);
    let mut peer = TcpStream::connect(("127.0.0.1", port)).expect("dial depot");
    peer.write_all(b"Deliver:5:apple\nDeliver:5:apple\n")
        .expect("send lines");

    thread::sleep(Duration::from_millis(200));
    assert_eq!(quantity_of(&depot, "apple"), 0);
}
