//! Node configuration and per-node state for the backup model.  Peers are
//! referred to by `NodeId`, an index into the simulation's node arena, so
//! the mutual backup/held bookkeeping never forms ownership cycles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::simulator::EventHandle;
use crate::utils::errors::SimulationError;

use super::BackupEvent;

/// Opaque handle to a node in the simulation arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The configuration of a single node: erasure-coding parameters, data and
/// storage volumes, link capacities, and lifecycle means.  Sizes are bytes,
/// speeds bytes per second, times seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    /// Number of blocks the node's data is encoded into.
    pub n: usize,
    /// Number of blocks sufficient to recover the data.
    pub k: usize,
    pub data_size: u64,
    pub storage_size: u64,
    pub upload_speed: f64,
    pub download_speed: f64,
    pub average_uptime: f64,
    pub average_downtime: f64,
    /// Average time before a crash that loses all data.
    pub average_lifetime: f64,
    pub average_recover_time: f64,
    /// Time at which the node first comes online.
    pub arrival_time: f64,
}

impl NodeSpec {
    pub fn block_size(&self) -> u64 {
        if self.k == 0 {
            0
        } else {
            self.data_size / self.k as u64
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.n == 0 {
            return Err(SimulationError::NonPositiveParameter("n"));
        }
        if self.k == 0 {
            return Err(SimulationError::NonPositiveParameter("k"));
        }
        if self.k > self.n {
            return Err(SimulationError::CodingExceedsBlocks(self.name.clone()));
        }
        if self.upload_speed <= 0.0 {
            return Err(SimulationError::NonPositiveParameter("upload_speed"));
        }
        if self.download_speed <= 0.0 {
            return Err(SimulationError::NonPositiveParameter("download_speed"));
        }
        if self.average_uptime <= 0.0 {
            return Err(SimulationError::NonPositiveParameter("average_uptime"));
        }
        if self.average_downtime <= 0.0 {
            return Err(SimulationError::NonPositiveParameter("average_downtime"));
        }
        if self.average_lifetime <= 0.0 {
            return Err(SimulationError::NonPositiveParameter("average_lifetime"));
        }
        if self.average_recover_time <= 0.0 {
            return Err(SimulationError::NonPositiveParameter("average_recover_time"));
        }
        if self.arrival_time < 0.0 {
            return Err(SimulationError::NonPositiveParameter("arrival_time"));
        }
        if self.storage_size < self.block_size() * self.n as u64 {
            return Err(SimulationError::StorageTooSmall(self.name.clone()));
        }
        Ok(())
    }
}

/// Mutable per-node state.  All nodes start offline, holding all of their
/// own blocks and none of anybody else's.
pub(crate) struct Node {
    pub(crate) spec: NodeSpec,
    pub(crate) block_size: u64,
    pub(crate) online: bool,
    pub(crate) failed: bool,
    /// Storage left for other nodes' blocks; space for the node's own `n`
    /// blocks is reserved up front.
    pub(crate) free_space: u64,
    /// `local_blocks[b]` is true while block `b` of the node's own data is
    /// held locally.
    pub(crate) local_blocks: Vec<bool>,
    /// `backed_up_blocks[b]` is the peer storing block `b`, if any.
    pub(crate) backed_up_blocks: Vec<Option<NodeId>>,
    /// Owner-to-block mapping for the remote blocks this node hosts; at
    /// most one block per owner.
    pub(crate) remote_blocks_held: BTreeMap<NodeId, usize>,
    pub(crate) current_uploads: Vec<EventHandle<BackupEvent>>,
    pub(crate) current_downloads: Vec<EventHandle<BackupEvent>>,
    pub(crate) available_up: f64,
    pub(crate) available_down: f64,
    pub(crate) successful_transfers: u64,
}

impl Node {
    pub(crate) fn new(spec: NodeSpec) -> Self {
        let block_size = spec.block_size();
        let free_space = spec.storage_size - block_size * spec.n as u64;
        Self {
            block_size,
            online: false,
            failed: false,
            free_space,
            local_blocks: vec![true; spec.n],
            backed_up_blocks: vec![None; spec.n],
            remote_blocks_held: BTreeMap::new(),
            current_uploads: Vec::new(),
            current_downloads: Vec::new(),
            available_up: spec.upload_speed,
            available_down: spec.download_speed,
            successful_transfers: 0,
            spec,
        }
    }

    /// The first block held locally but not backed up anywhere, if any.
    pub(crate) fn find_block_to_back_up(&self) -> Option<usize> {
        self.local_blocks
            .iter()
            .zip(&self.backed_up_blocks)
            .position(|(held, peer)| *held && peer.is_none())
    }

    pub(crate) fn local_count(&self) -> usize {
        self.local_blocks.iter().filter(|held| **held).count()
    }
}
