// Pipeline execution module
// Drives the classifier from a live frame source

pub mod poller;

pub use poller::{PollLoop, Poller, PollerSettings};
