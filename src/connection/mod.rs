//! Connections: a source, a pipeline and a driver task wired together

mod timing;


pub use timing::{ConnectionState, Standings, TimingConnection};
