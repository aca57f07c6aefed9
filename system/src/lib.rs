mod event_log;
mod message;
pub mod router;
mod types;
pub mod undo;

pub use event_log::*;
pub use message::*;
pub use router::{Delivery, Recipients};
pub use types::*;

pub extern crate serde;
pub extern crate serde_json;
pub extern crate uuid;
