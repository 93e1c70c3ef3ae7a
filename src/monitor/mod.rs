mod poller;

pub use poller::{PollMessage, Poller};
