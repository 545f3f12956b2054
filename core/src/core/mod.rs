pub mod bits;
pub mod event;

pub use event::{Emitter, Event, EventHandle, EventKind, Transceiver};
