use std::net::TcpStream;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Handle to an entry in the peer table. Entries are never removed, so a
/// handle stays valid for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerId(pub(crate) usize);

/// Handle to an entry in the deferral table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferralId(pub(crate) usize);

/// A named good and how much of it this depot holds. Quantity is signed:
/// withdrawals do not check stock and may drive it negative.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub quantity: i64,
}

/// A connection to another depot. Created as an unidentified placeholder
/// the moment the socket is established; `name` and `port` are filled in
/// when the peer's `IM` arrives. The entry at index 0 is this depot itself
/// and carries no socket.
pub struct PeerEntry {
    pub name: Option<String>,
    pub port: Option<String>,
    pub writer: Option<TcpStream>,
    pub reader_worker: Option<JoinHandle<()>>,
    pub action_worker: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferralStatus {
    /// Just recorded; its waiter has not checked in yet.
    New,
    /// A waiter is parked on this deferral.
    Ready,
    /// Released by an execute trigger. Never fires again.
    Fired,
}

/// A held operation waiting for an execute trigger. The operation line is
/// an owned copy; the key is cleared once consumed so a second execute
/// cannot match it.
pub struct Deferral {
    pub key: Option<i64>,
    pub operation: String,
    pub executed: bool,
    pub status: DeferralStatus,
    pub fire_ticket: Option<u64>,
}

/// Everything the state lock guards: inventory, peer table, deferral
/// table, and the deferral dispatch bookkeeping. All lookups are linear
/// scans; the expected table sizes are small.
pub struct DepotData {
    pub resources: Vec<Resource>,
    pub peers: Vec<PeerEntry>,
    pub deferrals: Vec<Deferral>,
    next_ticket: u64,
    dispatch_cursor: u64,
    shutting_down: bool,
}

/// Snapshot of the displayable state, taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotSnapshot {
    pub goods: Vec<(String, i64)>,
    pub neighbours: Vec<String>,
}

impl DepotSnapshot {
    /// Text form of the dump written to stdout on the dump-state signal.
    pub fn render(&self) -> String {
        use std::fmt::Write;

        let mut out = String::from("Goods:\n");
        for (name, quantity) in &self.goods {
            let _ = writeln!(out, "{name} {quantity}");
        }
        out.push_str("Neighbours:\n");
        for name in &self.neighbours {
            let _ = writeln!(out, "{name}");
        }
        out
    }
}

/// Shared depot state: one mutex over all of it, plus the condvar that
/// deferral waiters park on.
pub struct Depot {
    data: Mutex<DepotData>,
    pub(crate) released: Condvar,
}

impl DepotData {
    /// This depot's own name, from the head of the peer table.
    pub fn self_name(&self) -> &str {
        self.peers[0].name.as_deref().unwrap_or("")
    }

    pub fn self_port(&self) -> Option<&str> {
        self.peers[0].port.as_deref()
    }

    pub fn peer(&self, id: PeerId) -> &PeerEntry {
        &self.peers[id.0]
    }

    pub fn peer_mut(&mut self, id: PeerId) -> &mut PeerEntry {
        &mut self.peers[id.0]
    }

    pub fn deferral(&self, id: DeferralId) -> &Deferral {
        &self.deferrals[id.0]
    }

    pub fn deferral_mut(&mut self, id: DeferralId) -> &mut Deferral {
        &mut self.deferrals[id.0]
    }

    /// Find-or-create the resource `name` and add `delta` to its quantity.
    pub fn upsert_resource(&mut self, name: &str, delta: i64) {
        match self.resources.iter_mut().find(|r| r.name == name) {
            Some(resource) => resource.quantity += delta,
            None => self.resources.push(Resource {
                name: name.to_string(),
                quantity: delta,
            }),
        }
    }

    /// Find an identified remote peer by name. The self entry and
    /// still-anonymous placeholders never match.
    pub fn find_peer_by_name(&self, name: &str) -> Option<PeerId> {
        self.peers
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, p)| p.name.as_deref() == Some(name))
            .map(|(i, _)| PeerId(i))
    }

    /// Find a peer by port string. The self entry participates, so a
    /// `Connect` naming our own port is recognized as already connected.
    pub fn find_peer_by_port(&self, port: &str) -> Option<PeerId> {
        self.peers
            .iter()
            .enumerate()
            .find(|(_, p)| p.port.as_deref() == Some(port))
            .map(|(i, _)| PeerId(i))
    }

    /// Append an unidentified placeholder peer and hand back its handle.
    pub fn insert_peer(&mut self, writer: Option<TcpStream>) -> PeerId {
        self.peers.push(PeerEntry {
            name: None,
            port: None,
            writer,
            reader_worker: None,
            action_worker: None,
        });
        PeerId(self.peers.len() - 1)
    }

    /// Fill in a peer's post-handshake identity.
    pub fn set_peer_identity(&mut self, id: PeerId, name: String, port: String) {
        let peer = self.peer_mut(id);
        peer.name = Some(name);
        peer.port = Some(port);
    }

    /// Record a deferred operation; its waiter has not started yet.
    pub fn add_deferral(&mut self, key: i64, operation: String) -> DeferralId {
        self.deferrals.push(Deferral {
            key: Some(key),
            operation,
            executed: false,
            status: DeferralStatus::New,
            fire_ticket: None,
        });
        DeferralId(self.deferrals.len() - 1)
    }

    /// First deferral with the given key that has not fired.
    pub fn find_unfired_deferral_by_key(&self, key: i64) -> Option<DeferralId> {
        self.deferrals
            .iter()
            .enumerate()
            .find(|(_, d)| d.key == Some(key) && d.status != DeferralStatus::Fired)
            .map(|(i, _)| DeferralId(i))
    }

    /// Release a deferral: consume its key, mark it executed and stamp it
    /// with the next fire ticket. Tickets are handed out in release order,
    /// which is insertion order for a given execute trigger, so waiters
    /// dispatch their operations one at a time in that order.
    pub fn mark_deferral_fired(&mut self, id: DeferralId) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let deferral = self.deferral_mut(id);
        deferral.executed = true;
        deferral.key = None;
        deferral.status = DeferralStatus::Fired;
        deferral.fire_ticket = Some(ticket);
    }

    /// Ticket of the next released operation allowed to dispatch.
    pub fn dispatch_cursor(&self) -> u64 {
        self.dispatch_cursor
    }

    pub fn advance_dispatch_cursor(&mut self) {
        self.dispatch_cursor += 1;
    }

    pub fn shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Goods with non-zero quantity and identified neighbour names, both
    /// sorted bytewise.
    pub fn snapshot_for_display(&self) -> DepotSnapshot {
        let mut goods: Vec<(String, i64)> = self
            .resources
            .iter()
            .filter(|r| r.quantity != 0)
            .map(|r| (r.name.clone(), r.quantity))
            .collect();
        goods.sort();

        let mut neighbours: Vec<String> = self
            .peers
            .iter()
            .skip(1)
            .filter_map(|p| p.name.clone())
            .collect();
        neighbours.sort();

        DepotSnapshot { goods, neighbours }
    }
}

impl Depot {
    /// Build the depot from its startup identity: own name at the head of
    /// the peer table, initial goods folded into the inventory.
    pub fn new(name: String, goods: Vec<(String, i64)>) -> Self {
        let mut data = DepotData {
            resources: Vec::new(),
            peers: vec![PeerEntry {
                name: Some(name),
                port: None,
                writer: None,
                reader_worker: None,
                action_worker: None,
            }],
            deferrals: Vec::new(),
            next_ticket: 0,
            dispatch_cursor: 0,
            shutting_down: false,
        };

        for (good, quantity) in goods {
            data.upsert_resource(&good, quantity);
        }

        Depot {
            data: Mutex::new(data),
            released: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DepotData> {
        self.data.lock().unwrap()
    }

    pub fn upsert_resource(&self, name: &str, delta: i64) {
        self.lock().upsert_resource(name, delta);
    }

    /// Record the listening port once the listener has bound.
    pub fn set_self_port(&self, port: String) {
        self.lock().peers[0].port = Some(port);
    }

    pub fn insert_peer(&self, writer: Option<TcpStream>) -> PeerId {
        self.lock().insert_peer(writer)
    }

    pub fn set_peer_identity(&self, id: PeerId, name: String, port: String) {
        self.lock().set_peer_identity(id, name, port);
    }

    pub fn set_peer_workers(
        &self,
        id: PeerId,
        reader: JoinHandle<()>,
        action: JoinHandle<()>,
    ) {
        let mut data = self.lock();
        let peer = data.peer_mut(id);
        peer.reader_worker = Some(reader);
        peer.action_worker = Some(action);
    }

    pub fn snapshot_for_display(&self) -> DepotSnapshot {
        self.lock().snapshot_for_display()
    }

    /// Wake every parked deferral waiter and have it exit without firing.
    /// In-flight deferrals are abandoned.
    pub fn shutdown(&self) {
        self.lock().shutting_down = true;
        self.released.notify_all();
    }
}
