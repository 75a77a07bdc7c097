//! Tracks how long you spend on each website per day, reminds you when you
//! cross configured limits, and keeps the books consistent across focus
//! changes, restarts, and polling gaps. Runs as a Chrome native-messaging
//! host fed by a thin browser extension, with a small CLI for reports.

pub mod cli;
pub mod engine;
pub mod host;
pub mod store;
pub mod utils;
