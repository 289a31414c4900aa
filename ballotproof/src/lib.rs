#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

mod api;
mod binding;
mod clock;
mod election;
mod engine;
mod error;
mod message;
mod proof;
mod serde_time;
mod signature;
mod store;
mod util;
mod voter;

pub use api::*;
pub use binding::*;
pub use clock::*;
pub use election::*;
pub use engine::*;
pub use error::*;
pub use message::*;
pub use proof::*;
pub use serde_time::*;
pub use signature::*;
pub use store::*;
pub use util::*;
pub use voter::*;
