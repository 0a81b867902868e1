//! `freefloor-middleware` – in-process message routing.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`port`] – named input ports and closable, best-effort output ports on
//!   top of the bus.

pub mod bus;
pub mod port;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use port::{InputPort, OutputPort};
