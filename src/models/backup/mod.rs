//! A peer-to-peer backup system.  Every node erasure-codes its data into
//! `n` blocks, any `k` of which suffice for reconstruction, and places
//! single blocks on peers while hosting blocks for others in return.  Nodes
//! cycle between online and offline periods, and occasionally fail outright,
//! losing both their local data and everything they hosted.  Transfers
//! reserve bandwidth on both endpoints when scheduled and are cancelled when
//! either endpoint disconnects.
//!
//! Peer selection is biased tit-for-tat: when choosing whom to serve next, a
//! node prefers owners that have completed more transfers with it and that
//! are missing more of their own blocks.

pub mod config;
pub mod node;

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::input_modeling::rng::SimulationRng;
use crate::input_modeling::ContinuousRandomVariable;
use crate::simulator::{EventHandle, Scheduler, Simulation};
use crate::utils::errors::SimulationError;

pub use self::config::parse_node_classes;
pub use self::node::{NodeId, NodeSpec};

use self::node::Node;

/// Delay before an owner retries backing up a block purged by a peer
/// failure.
const UPLOAD_RETRY_DELAY: f64 = 3600.0;

/// Period of the bandwidth-waste log.
const BANDWIDTH_LOG_INTERVAL: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Store one of the uploader's blocks on the downloader.
    Backup,
    /// Rebuild one of the downloader's own blocks from the uploader.
    Restore,
}

#[derive(Debug, Clone, Copy)]
pub enum BackupEvent {
    Online { node: NodeId },
    Offline { node: NodeId },
    Fail { node: NodeId },
    Recover { node: NodeId },
    TransferComplete {
        uploader: NodeId,
        downloader: NodeId,
        block_id: usize,
        kind: TransferKind,
    },
    /// Retry of upload selection some time after a peer failure purged one
    /// of the node's backups.
    DelayedUpload { node: NodeId },
    BandwidthLog,
}

/// Time-indexed counters and series collected during a run.  Series are
/// ordered by time; entries recorded at the same instant are merged.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BackupStats {
    /// Per-sample average over online nodes of committed upload bandwidth.
    pub up_bw_wasted: Vec<(f64, f64)>,
    /// Per-sample average over online nodes of committed download bandwidth.
    pub dw_bw_wasted: Vec<(f64, f64)>,
    /// Completed transfers per time point.
    pub transfer_counts: Vec<(f64, u64)>,
    /// Node failures per time point.
    pub failure_events: Vec<(f64, u64)>,
    /// Online-node population deltas per time point.
    pub online_nodes: Vec<(f64, i64)>,
    /// Times at which a restore still left the owner below its
    /// reconstruction threshold.
    pub data_loss_events: Vec<f64>,
}

impl BackupStats {
    fn record_waste(&mut self, time: f64, up: f64, down: f64) {
        match self.up_bw_wasted.last_mut() {
            Some(last) if last.0 == time => last.1 = up,
            _ => self.up_bw_wasted.push((time, up)),
        }
        match self.dw_bw_wasted.last_mut() {
            Some(last) if last.0 == time => last.1 = down,
            _ => self.dw_bw_wasted.push((time, down)),
        }
    }

    fn bump(series: &mut Vec<(f64, u64)>, time: f64) {
        match series.last_mut() {
            Some(last) if last.0 == time => last.1 += 1,
            _ => series.push((time, 1)),
        }
    }

    fn record_online_delta(&mut self, time: f64, delta: i64) {
        match self.online_nodes.last_mut() {
            Some(last) if last.0 == time => last.1 += delta,
            _ => self.online_nodes.push((time, delta)),
        }
    }

    /// Total completed transfers across the run.
    pub fn total_transfers(&self) -> u64 {
        self.transfer_counts.iter().map(|(_, count)| count).sum()
    }

    /// Total node failures across the run.
    pub fn total_failures(&self) -> u64 {
        self.failure_events.iter().map(|(_, count)| count).sum()
    }

    /// How many restores completed with the owner still short of `k`
    /// blocks.
    pub fn data_loss_count(&self) -> u64 {
        self.data_loss_events.len() as u64
    }
}

pub struct Backup {
    events: Scheduler<BackupEvent>,
    rng: SimulationRng,
    nodes: Vec<Node>,
    /// When false, each node runs at most one upload and one download at a
    /// time; when true, it keeps scheduling transfers until bandwidth or
    /// candidates run out.
    parallel_up_down: bool,
    stats: BackupStats,
}

impl Backup {
    pub fn new(
        specs: Vec<NodeSpec>,
        parallel_up_down: bool,
        rng: SimulationRng,
    ) -> Result<Self, SimulationError> {
        for spec in &specs {
            spec.validate()?;
        }
        let mut sim = Self {
            events: Scheduler::new(),
            rng,
            nodes: specs.into_iter().map(Node::new).collect(),
            parallel_up_down,
            stats: BackupStats::default(),
        };
        sim.events.schedule(0.0, BackupEvent::BandwidthLog);
        for index in 0..sim.nodes.len() {
            let node = NodeId(index);
            let (arrival, lifetime_mean) = {
                let spec = &sim.nodes[index].spec;
                (spec.arrival_time, spec.average_lifetime)
            };
            let lifetime = sim.sample_exp(lifetime_mean)?;
            sim.events.schedule(arrival, BackupEvent::Online { node });
            sim.events
                .schedule(arrival + lifetime, BackupEvent::Fail { node });
        }
        Ok(sim)
    }

    /// The current simulated time.
    pub fn time(&self) -> f64 {
        self.events.time()
    }

    pub fn stats(&self) -> &BackupStats {
        &self.stats
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].spec.name
    }

    pub fn is_online(&self, node: NodeId) -> bool {
        self.nodes[node.0].online
    }

    pub fn has_failed(&self, node: NodeId) -> bool {
        self.nodes[node.0].failed
    }

    pub fn free_space(&self, node: NodeId) -> u64 {
        self.nodes[node.0].free_space
    }

    /// How many of its own blocks the node currently holds locally.
    pub fn local_block_count(&self, node: NodeId) -> usize {
        self.nodes[node.0].local_count()
    }

    /// The peer storing each of the node's blocks, if any.
    pub fn backed_up_blocks(&self, node: NodeId) -> &[Option<NodeId>] {
        &self.nodes[node.0].backed_up_blocks
    }

    /// The owner-to-block mapping of the remote blocks this node hosts.
    pub fn remote_blocks_held(&self, node: NodeId) -> &BTreeMap<NodeId, usize> {
        &self.nodes[node.0].remote_blocks_held
    }

    pub fn successful_transfers(&self, node: NodeId) -> u64 {
        self.nodes[node.0].successful_transfers
    }

    fn sample_exp(&mut self, mean: f64) -> Result<f64, SimulationError> {
        ContinuousRandomVariable::Exp { mean }.random_variate(&mut self.rng)
    }

    /// Average committed bandwidth over online nodes, recorded on the
    /// periodic log, on online entries, and on completed transfers.
    fn register_bw_waste(&mut self) {
        let mut up_total = 0.0;
        let mut down_total = 0.0;
        let mut online = 0usize;
        for node in &self.nodes {
            if node.online {
                up_total += node.spec.upload_speed - node.available_up;
                down_total += node.spec.download_speed - node.available_down;
                online += 1;
            }
        }
        let (up, down) = if online == 0 {
            (0.0, 0.0)
        } else {
            (up_total / online as f64, down_total / online as f64)
        };
        self.stats.record_waste(self.events.time(), up, down);
    }

    fn has_upload_capacity(&self, node: &Node) -> bool {
        if self.parallel_up_down {
            node.available_up > 0.0
        } else {
            node.current_uploads.is_empty()
        }
    }

    fn has_download_capacity(&self, node: &Node) -> bool {
        if self.parallel_up_down {
            node.available_down > 0.0
        } else {
            node.current_downloads.is_empty()
        }
    }

    /// Owners of the blocks `holder` hosts, ranked tit-for-tat: more
    /// reciprocated transfers first, fewer surviving local blocks first.
    fn rank_peers(&self, holder: NodeId) -> Vec<NodeId> {
        let mut owners: Vec<NodeId> = self.nodes[holder.0]
            .remote_blocks_held
            .keys()
            .copied()
            .collect();
        owners.sort_by_key(|owner| {
            let peer = &self.nodes[owner.0];
            (
                std::cmp::Reverse(peer.successful_transfers),
                peer.local_count(),
            )
        });
        owners
    }

    /// Reserve bandwidth on both endpoints and enqueue the completion
    /// event.  Returns false when no bandwidth is left to commit.
    fn schedule_transfer(
        &mut self,
        uploader: NodeId,
        downloader: NodeId,
        block_id: usize,
        kind: TransferKind,
    ) -> bool {
        debug_assert_ne!(uploader, downloader);
        let block_size = match kind {
            TransferKind::Restore => self.nodes[downloader.0].block_size,
            TransferKind::Backup => self.nodes[uploader.0].block_size,
        };
        let speed = self.nodes[uploader.0]
            .available_up
            .min(self.nodes[downloader.0].available_down);
        if speed <= 0.0 {
            debug!(
                "no bandwidth left for a transfer between {} and {}",
                self.nodes[uploader.0].spec.name, self.nodes[downloader.0].spec.name
            );
            return false;
        }
        self.nodes[uploader.0].available_up -= speed;
        self.nodes[downloader.0].available_down -= speed;
        let delay = block_size as f64 / speed;
        let event = self.events.schedule(
            delay,
            BackupEvent::TransferComplete {
                uploader,
                downloader,
                block_id,
                kind,
            },
        );
        debug!(
            "scheduled {:?} of block {} from {} to {}, due in {:.0}s",
            kind,
            block_id,
            self.nodes[uploader.0].spec.name,
            self.nodes[downloader.0].spec.name,
            delay
        );
        self.nodes[uploader.0].current_uploads.push(event.clone());
        self.nodes[downloader.0].current_downloads.push(event);
        true
    }

    /// Attempt to schedule the next upload for `node`.  Restores of blocks
    /// the node hosts take priority, then backups of its own blocks.
    fn schedule_next_upload(&mut self, node: NodeId) -> bool {
        {
            let state = &self.nodes[node.0];
            debug_assert!(state.online);
            if self.parallel_up_down {
                if state.available_up <= 0.0 {
                    return false;
                }
            } else if !state.current_uploads.is_empty() {
                return false;
            }
        }

        // serve a ranked owner that lost a block this node hosts
        for owner in self.rank_peers(node) {
            let block_id = match self.nodes[node.0].remote_blocks_held.get(&owner) {
                Some(block_id) => *block_id,
                None => continue,
            };
            let peer = &self.nodes[owner.0];
            if block_id < peer.local_blocks.len()
                && !peer.local_blocks[block_id]
                && peer.online
                && self.has_download_capacity(peer)
            {
                return self.schedule_transfer(node, owner, block_id, TransferKind::Restore);
            }
        }

        // back up one of this node's own blocks to a fresh peer
        let block_id = match self.nodes[node.0].find_block_to_back_up() {
            Some(block_id) => block_id,
            None => return false,
        };
        let block_size = self.nodes[node.0].block_size;
        let holders: Vec<NodeId> = self.nodes[node.0]
            .backed_up_blocks
            .iter()
            .flatten()
            .copied()
            .collect();
        for index in 0..self.nodes.len() {
            let candidate = NodeId(index);
            if candidate == node || holders.contains(&candidate) {
                continue;
            }
            let peer = &self.nodes[index];
            if peer.online
                && self.has_download_capacity(peer)
                && peer.free_space >= block_size
            {
                return self.schedule_transfer(node, candidate, block_id, TransferKind::Backup);
            }
        }
        false
    }

    /// Attempt to schedule the next download for `node`: first restore a
    /// missing block of its own, then host a backup for some peer.
    fn schedule_next_download(&mut self, node: NodeId) -> bool {
        {
            let state = &self.nodes[node.0];
            debug_assert!(state.online);
            if self.parallel_up_down {
                if state.available_down <= 0.0 {
                    return false;
                }
            } else if !state.current_downloads.is_empty() {
                return false;
            }
        }

        let restore = {
            let state = &self.nodes[node.0];
            let mut found = None;
            for (block_id, (held, holder)) in state
                .local_blocks
                .iter()
                .zip(&state.backed_up_blocks)
                .enumerate()
            {
                if *held {
                    continue;
                }
                if let Some(holder) = holder {
                    let peer = &self.nodes[holder.0];
                    if peer.online && self.has_upload_capacity(peer) {
                        found = Some((*holder, block_id));
                        break;
                    }
                }
            }
            found
        };
        if let Some((holder, block_id)) = restore {
            return self.schedule_transfer(holder, node, block_id, TransferKind::Restore);
        }

        let free_space = self.nodes[node.0].free_space;
        for index in 0..self.nodes.len() {
            let candidate = NodeId(index);
            if candidate == node {
                continue;
            }
            let peer = &self.nodes[index];
            if peer.online
                && self.has_upload_capacity(peer)
                && !self.nodes[node.0].remote_blocks_held.contains_key(&candidate)
                && free_space >= peer.block_size
            {
                if let Some(block_id) = peer.find_block_to_back_up() {
                    return self.schedule_transfer(candidate, node, block_id, TransferKind::Backup);
                }
            }
        }
        false
    }

    /// Schedule as many uploads as the mode allows: one in serial mode,
    /// until nothing more can be scheduled in parallel mode.
    fn schedule_next_uploads(&mut self, node: NodeId) {
        loop {
            if !self.schedule_next_upload(node) || !self.parallel_up_down {
                return;
            }
        }
    }

    fn schedule_next_downloads(&mut self, node: NodeId) {
        loop {
            if !self.schedule_next_download(node) || !self.parallel_up_down {
                return;
            }
        }
    }

    /// Cancel every in-flight transfer with `node` as an endpoint, removing
    /// each from the peer endpoint's active list, and mark the node offline.
    fn disconnect(&mut self, node: NodeId) {
        self.nodes[node.0].online = false;
        let uploads = std::mem::take(&mut self.nodes[node.0].current_uploads);
        for transfer in uploads {
            transfer.cancel();
            if let BackupEvent::TransferComplete { downloader, .. } = *transfer.kind() {
                self.nodes[downloader.0]
                    .current_downloads
                    .retain(|other| !other.is_same(&transfer));
            }
        }
        let downloads = std::mem::take(&mut self.nodes[node.0].current_downloads);
        for transfer in downloads {
            transfer.cancel();
            if let BackupEvent::TransferComplete { uploader, .. } = *transfer.kind() {
                self.nodes[uploader.0]
                    .current_uploads
                    .retain(|other| !other.is_same(&transfer));
            }
        }
    }

    /// Shared online entry: restore full link capacity, look for work, and
    /// schedule the next offline transition.
    fn bring_online(&mut self, node: NodeId) -> Result<(), SimulationError> {
        let uptime_mean = {
            let state = &mut self.nodes[node.0];
            state.online = true;
            state.available_up = state.spec.upload_speed;
            state.available_down = state.spec.download_speed;
            state.spec.average_uptime
        };
        self.stats.record_online_delta(self.events.time(), 1);
        self.schedule_next_uploads(node);
        self.schedule_next_downloads(node);
        self.register_bw_waste();
        let uptime = self.sample_exp(uptime_mean)?;
        self.events.schedule(uptime, BackupEvent::Offline { node });
        Ok(())
    }

    fn handle_online(&mut self, node: NodeId) -> Result<(), SimulationError> {
        if self.nodes[node.0].online || self.nodes[node.0].failed {
            return Ok(());
        }
        debug!("{} comes online", self.nodes[node.0].spec.name);
        self.bring_online(node)
    }

    fn handle_offline(&mut self, node: NodeId) -> Result<(), SimulationError> {
        if self.nodes[node.0].failed || !self.nodes[node.0].online {
            return Ok(());
        }
        debug!("{} goes offline", self.nodes[node.0].spec.name);
        self.stats.record_online_delta(self.events.time(), -1);
        self.disconnect(node);
        let downtime = self.sample_exp(self.nodes[node.0].spec.average_downtime)?;
        self.events.schedule(downtime, BackupEvent::Online { node });
        Ok(())
    }

    fn handle_fail(&mut self, node: NodeId) -> Result<(), SimulationError> {
        let time = self.events.time();
        info!(
            "{} fails, losing {} local blocks",
            self.nodes[node.0].spec.name,
            self.nodes[node.0].local_count()
        );
        if self.nodes[node.0].online {
            self.stats.record_online_delta(time, -1);
        }
        self.disconnect(node);
        let held = std::mem::take(&mut self.nodes[node.0].remote_blocks_held);
        {
            let state = &mut self.nodes[node.0];
            state.failed = true;
            state.local_blocks = vec![false; state.spec.n];
            state.free_space = state.spec.storage_size - state.block_size * state.spec.n as u64;
        }
        BackupStats::bump(&mut self.stats.failure_events, time);
        // owners lose the blocks this node hosted and may want to place
        // them again once the dust settles
        for (owner, block_id) in held {
            self.nodes[owner.0].backed_up_blocks[block_id] = None;
            if self.nodes[owner.0].online && self.nodes[owner.0].current_uploads.is_empty() {
                self.events
                    .schedule(UPLOAD_RETRY_DELAY, BackupEvent::DelayedUpload { node: owner });
            }
        }
        let recover_mean = self.nodes[node.0].spec.average_recover_time;
        let recover = self.sample_exp(recover_mean)?;
        self.events.schedule(recover, BackupEvent::Recover { node });
        Ok(())
    }

    fn handle_recover(&mut self, node: NodeId) -> Result<(), SimulationError> {
        info!("{} recovers", self.nodes[node.0].spec.name);
        self.nodes[node.0].failed = false;
        self.bring_online(node)?;
        let lifetime = self.sample_exp(self.nodes[node.0].spec.average_lifetime)?;
        self.events.schedule(lifetime, BackupEvent::Fail { node });
        Ok(())
    }

    fn handle_delayed_upload(&mut self, node: NodeId) -> Result<(), SimulationError> {
        if self.nodes[node.0].online && self.nodes[node.0].current_uploads.is_empty() {
            self.schedule_next_upload(node);
        }
        Ok(())
    }

    fn handle_bandwidth_log(&mut self) -> Result<(), SimulationError> {
        self.register_bw_waste();
        self.events
            .schedule(BANDWIDTH_LOG_INTERVAL, BackupEvent::BandwidthLog);
        Ok(())
    }

    fn handle_transfer_complete(
        &mut self,
        event: &EventHandle<BackupEvent>,
        uploader: NodeId,
        downloader: NodeId,
        block_id: usize,
        kind: TransferKind,
    ) -> Result<(), SimulationError> {
        if !self.nodes[uploader.0].online || !self.nodes[downloader.0].online {
            return Err(SimulationError::EndpointOffline);
        }
        match kind {
            TransferKind::Backup => {
                let block_size = self.nodes[uploader.0].block_size;
                let peer = &mut self.nodes[downloader.0];
                peer.free_space = peer
                    .free_space
                    .checked_sub(block_size)
                    .ok_or_else(|| SimulationError::FreeSpaceExhausted(peer.spec.name.clone()))?;
                peer.remote_blocks_held.insert(uploader, block_id);
                self.nodes[uploader.0].backed_up_blocks[block_id] = Some(downloader);
            }
            TransferKind::Restore => {
                let owner = &mut self.nodes[downloader.0];
                owner.local_blocks[block_id] = true;
                let held = owner.local_count();
                if held < owner.spec.k {
                    warn!(
                        "{} is still below its reconstruction threshold after a restore ({}/{} blocks)",
                        owner.spec.name, held, owner.spec.k
                    );
                    self.stats.data_loss_events.push(self.events.time());
                }
            }
        }
        debug!(
            "completed {:?} of block {} from {} to {}",
            kind,
            block_id,
            self.nodes[uploader.0].spec.name,
            self.nodes[downloader.0].spec.name
        );
        for endpoint in [uploader, downloader] {
            let state = &self.nodes[endpoint.0];
            debug!(
                "{}: {} local blocks, {} backed up blocks, {} remote blocks held",
                state.spec.name,
                state.local_count(),
                state.backed_up_blocks.iter().flatten().count(),
                state.remote_blocks_held.len()
            );
        }
        self.nodes[uploader.0].successful_transfers += 1;
        self.nodes[downloader.0].successful_transfers += 1;
        BackupStats::bump(&mut self.stats.transfer_counts, self.events.time());
        self.register_bw_waste();
        self.nodes[uploader.0]
            .current_uploads
            .retain(|other| !other.is_same(event));
        self.nodes[downloader.0]
            .current_downloads
            .retain(|other| !other.is_same(event));
        self.schedule_next_uploads(uploader);
        self.schedule_next_downloads(downloader);
        Ok(())
    }
}

impl Simulation for Backup {
    type Event = BackupEvent;

    fn scheduler_mut(&mut self) -> &mut Scheduler<BackupEvent> {
        &mut self.events
    }

    fn process(&mut self, event: EventHandle<BackupEvent>) -> Result<(), SimulationError> {
        match *event.kind() {
            BackupEvent::Online { node } => self.handle_online(node),
            BackupEvent::Offline { node } => self.handle_offline(node),
            BackupEvent::Fail { node } => self.handle_fail(node),
            BackupEvent::Recover { node } => self.handle_recover(node),
            BackupEvent::TransferComplete {
                uploader,
                downloader,
                block_id,
                kind,
            } => self.handle_transfer_complete(&event, uploader, downloader, block_id, kind),
            BackupEvent::DelayedUpload { node } => self.handle_delayed_upload(node),
            BackupEvent::BandwidthLog => self.handle_bandwidth_log(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_modeling::rng::seeded;

    /// A spec whose lifecycle events all land far beyond any test horizon,
    /// so tests can drive node state by hand.
    fn idle_spec(name: &str) -> NodeSpec {
        NodeSpec {
            name: String::from(name),
            n: 4,
            k: 2,
            data_size: 1 << 20,
            storage_size: 4 << 20,
            upload_speed: 1024.0,
            download_speed: 1024.0,
            average_uptime: 1e12,
            average_downtime: 3600.0,
            average_lifetime: 1e12,
            average_recover_time: 3600.0,
            arrival_time: 1e9,
        }
    }

    fn two_nodes() -> Result<Backup, SimulationError> {
        Backup::new(
            vec![idle_spec("peer-0"), idle_spec("peer-1")],
            false,
            seeded(Some(1)),
        )
    }

    #[test]
    fn a_scheduled_transfer_reserves_bandwidth_on_both_ends(
    ) -> Result<(), SimulationError> {
        let mut sim = two_nodes()?;
        sim.nodes[0].online = true;
        sim.nodes[1].online = true;
        assert!(sim.schedule_transfer(NodeId(0), NodeId(1), 0, TransferKind::Backup));
        assert_eq!(sim.nodes[0].available_up, 0.0);
        assert_eq!(sim.nodes[1].available_down, 0.0);
        assert_eq!(sim.nodes[0].current_uploads.len(), 1);
        assert_eq!(sim.nodes[1].current_downloads.len(), 1);
        // both links fully committed: nothing further fits
        assert!(!sim.schedule_transfer(NodeId(0), NodeId(1), 1, TransferKind::Backup));
        Ok(())
    }

    #[test]
    fn disconnection_cancels_transfers_on_both_ends() -> Result<(), SimulationError> {
        let mut sim = two_nodes()?;
        sim.nodes[0].online = true;
        sim.nodes[1].online = true;
        assert!(sim.schedule_transfer(NodeId(0), NodeId(1), 0, TransferKind::Backup));
        let transfer = sim.nodes[0].current_uploads[0].clone();
        sim.disconnect(NodeId(0));
        assert!(transfer.is_cancelled());
        assert!(sim.nodes[0].current_uploads.is_empty());
        assert!(sim.nodes[1].current_downloads.is_empty());
        Ok(())
    }

    #[test]
    fn cancelled_transfers_mutate_no_block_state() -> Result<(), SimulationError> {
        let mut sim = two_nodes()?;
        sim.nodes[0].online = true;
        sim.nodes[1].online = true;
        assert!(sim.schedule_transfer(NodeId(0), NodeId(1), 0, TransferKind::Backup));
        let free_before = sim.nodes[1].free_space;
        sim.disconnect(NodeId(0));
        // drain past the transfer's completion time
        sim.run(1e6)?;
        assert_eq!(sim.nodes[1].free_space, free_before);
        assert!(sim.nodes[1].remote_blocks_held.is_empty());
        assert!(sim.nodes[0].backed_up_blocks.iter().all(Option::is_none));
        assert_eq!(sim.stats.total_transfers(), 0);
        Ok(())
    }

    #[test]
    fn completion_with_an_offline_endpoint_is_an_invariant_violation(
    ) -> Result<(), SimulationError> {
        let mut sim = two_nodes()?;
        sim.nodes[0].online = true;
        sim.nodes[1].online = true;
        assert!(sim.schedule_transfer(NodeId(0), NodeId(1), 0, TransferKind::Backup));
        // offline without cancelling, as a buggy caller would
        sim.nodes[1].online = false;
        assert!(matches!(
            sim.run(1e6),
            Err(SimulationError::EndpointOffline)
        ));
        Ok(())
    }

    #[test]
    fn ranking_prefers_reciprocating_and_needier_owners() -> Result<(), SimulationError> {
        let mut sim = Backup::new(
            vec![idle_spec("peer-0"), idle_spec("peer-1"), idle_spec("peer-2")],
            false,
            seeded(Some(1)),
        )?;
        sim.nodes[0].remote_blocks_held.insert(NodeId(1), 0);
        sim.nodes[0].remote_blocks_held.insert(NodeId(2), 0);
        sim.nodes[1].successful_transfers = 1;
        sim.nodes[2].successful_transfers = 3;
        assert_eq!(sim.rank_peers(NodeId(0)), vec![NodeId(2), NodeId(1)]);
        // equal reciprocation: the owner missing more blocks first
        sim.nodes[2].successful_transfers = 1;
        sim.nodes[2].local_blocks = vec![false, false, true, true];
        assert_eq!(sim.rank_peers(NodeId(0)), vec![NodeId(2), NodeId(1)]);
        Ok(())
    }

    #[test]
    fn stats_merge_entries_at_identical_times() {
        let mut stats = BackupStats::default();
        BackupStats::bump(&mut stats.transfer_counts, 5.0);
        BackupStats::bump(&mut stats.transfer_counts, 5.0);
        BackupStats::bump(&mut stats.transfer_counts, 9.0);
        assert_eq!(stats.transfer_counts, vec![(5.0, 2), (9.0, 1)]);
        stats.record_waste(3.0, 1.0, 2.0);
        stats.record_waste(3.0, 4.0, 5.0);
        assert_eq!(stats.up_bw_wasted, vec![(3.0, 4.0)]);
        assert_eq!(stats.dw_bw_wasted, vec![(3.0, 5.0)]);
    }
}
