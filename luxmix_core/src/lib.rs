#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate luxmix_derive;

pub mod channels;
pub mod engine;
pub mod history;
pub mod matrix;
pub mod message;
pub mod mixer;
pub mod sources;
pub mod topology;
pub mod transport;
pub mod types;
pub mod util;

pub use crossbeam_channel;
