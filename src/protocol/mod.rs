pub mod defer;
pub mod handlers;
pub mod message;

pub use handlers::dispatch_line;
pub use message::Command;
