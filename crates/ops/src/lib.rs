#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Orchestration for updkit
//!
//! Ties the specialized crates together into the two workflows the CLI
//! drives: an [`UpdateSession`] on the client side, and a [`Publisher`]
//! on the release side.

mod compensation;
mod history;
mod publish;
mod session;

pub use compensation::{CompensationStack, UnwindReport};
pub use history::{HistoryAction, HistoryEntry, PublishHistory};
pub use publish::{PublishRequest, Publisher, PublisherConfig};
pub use session::{SessionConfig, SessionOutcome, UpdateSession};

pub use updkit_events::EventSender;
