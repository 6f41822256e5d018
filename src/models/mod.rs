//! The models module provides the simulation applications built on the
//! simulator engine: a multi-queue service model with supermarket job
//! placement, and a peer-to-peer backup model with erasure-coded block
//! placement.  Each model defines its own event enum and state, and drives
//! the shared scheduler.

pub mod backup;
pub mod queues;

pub use self::backup::Backup;
pub use self::queues::Queues;
