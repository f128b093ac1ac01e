pub mod state;

pub use state::{
    Deferral, DeferralId, DeferralStatus, Depot, DepotData, DepotSnapshot, PeerEntry, PeerId,
    Resource,
};
