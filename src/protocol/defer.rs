use std::sync::Arc;
use std::thread;

use crate::depot::{DeferralId, DeferralStatus, Depot};
use crate::protocol::handlers;

/// Record a deferred operation and park a dedicated waiter on it, so the
/// action worker never blocks on an outstanding execute trigger.
pub fn on_defer(depot: &Arc<Depot>, key: i64, operation: String) {
    let id = depot.lock().add_deferral(key, operation);
    let depot = Arc::clone(depot);
    thread::spawn(move || waiter_loop(&depot, id));
}

/// Release every unfired deferral with this key (insertion order, each
/// at most once), then wake the waiters. The waiters themselves dispatch
/// the released operations.
pub fn on_execute(depot: &Arc<Depot>, key: i64) {
    let mut data = depot.lock();
    while let Some(id) = data.find_unfired_deferral_by_key(key) {
        data.mark_deferral_fired(id);
    }
    depot.released.notify_all();
}

/// One waiter per deferral. Sleeps until its deferral has been released
/// and its fire ticket comes up, then runs the held line through the
/// ordinary decoder path exactly once and passes the turn on. Tickets are
/// issued in release order, so operations dispatch in that order even
/// though each runs on its own thread.
fn waiter_loop(depot: &Arc<Depot>, id: DeferralId) {
    let mut data = depot.lock();
    if data.deferral(id).status == DeferralStatus::New {
        data.deferral_mut(id).status = DeferralStatus::Ready;
    }

    loop {
        if data.shutting_down() {
            return;
        }
        let deferral = data.deferral(id);
        if deferral.executed && deferral.fire_ticket == Some(data.dispatch_cursor()) {
            break;
        }
        data = depot.released.wait(data).unwrap();
    }

    let operation = data.deferral(id).operation.clone();
    drop(data);

    handlers::dispatch_line(depot, &operation);

    let mut data = depot.lock();
    data.advance_dispatch_cursor();
    depot.released.notify_all();
}
