use desim::input_modeling::rng::seeded;
use desim::models::backup::{parse_node_classes, Backup, NodeSpec};
use desim::simulator::Simulation;
use desim::utils::errors::SimulationError;
use desim::utils::units::parse_timespan;

const KIB: f64 = 1024.0;
const MIB: u64 = 1 << 20;
const HOUR: f64 = 3600.0;
const DAY: f64 = 86_400.0;
const YEAR: f64 = 365.25 * 86_400.0;

fn peer(name: &str) -> NodeSpec {
    NodeSpec {
        name: String::from(name),
        n: 4,
        k: 2,
        data_size: MIB,
        storage_size: 4 * MIB,
        upload_speed: KIB,
        download_speed: KIB,
        average_uptime: HOUR,
        average_downtime: HOUR,
        average_lifetime: YEAR,
        average_recover_time: HOUR,
        arrival_time: 0.0,
    }
}

/// Mutual bookkeeping: every backed-up block must be mirrored in its
/// holder's held map, and vice versa.
fn assert_bookkeeping_is_mutual(sim: &Backup) {
    for node in sim.node_ids() {
        for (block_id, holder) in sim.backed_up_blocks(node).iter().enumerate() {
            if let Some(holder) = holder {
                assert_eq!(
                    sim.remote_blocks_held(*holder).get(&node),
                    Some(&block_id),
                    "{} thinks {} holds block {}, but the holder disagrees",
                    sim.node_name(node),
                    sim.node_name(*holder),
                    block_id
                );
            }
        }
        for (owner, block_id) in sim.remote_blocks_held(node) {
            assert_eq!(sim.backed_up_blocks(*owner)[*block_id], Some(node));
        }
    }
}

/// Storage accounting: the space a node reports free must equal its
/// capacity minus its own reservation and everything it hosts.
fn assert_storage_accounting(sim: &Backup, specs: &[NodeSpec]) {
    for node in sim.node_ids() {
        let spec = &specs[node.index()];
        let own = spec.block_size() * spec.n as u64;
        let hosted: u64 = sim
            .remote_blocks_held(node)
            .keys()
            .map(|owner| specs[owner.index()].block_size())
            .sum();
        assert_eq!(sim.free_space(node), spec.storage_size - own - hosted);
    }
}

#[test]
fn two_node_smoke_run_exchanges_blocks() -> Result<(), SimulationError> {
    let specs = vec![peer("peer-0"), peer("peer-1")];
    let mut sim = Backup::new(specs.clone(), false, seeded(Some(1)))?;
    sim.run(DAY)?;
    assert!(
        sim.stats().total_transfers() >= 1,
        "no transfer completed in a simulated day"
    );
    assert_bookkeeping_is_mutual(&sim);
    assert_storage_accounting(&sim, &specs);
    Ok(())
}

#[test]
fn stable_peers_back_up_every_block() -> Result<(), SimulationError> {
    // five well-behaved nodes: each can place its four blocks on the four
    // other peers, one block per holder.  Link capacity is only replenished
    // on online entry, so block placement spreads over many sessions.
    let mut specs: Vec<NodeSpec> = (0..5).map(|i| peer(&format!("peer-{}", i))).collect();
    for spec in &mut specs {
        spec.average_uptime = 8.0 * HOUR;
        spec.average_lifetime = 100.0 * YEAR;
    }
    let mut sim = Backup::new(specs.clone(), false, seeded(Some(1)))?;
    sim.run(60.0 * DAY)?;
    for node in sim.node_ids() {
        assert!(
            sim.backed_up_blocks(node).iter().all(Option::is_some),
            "{} still has unplaced blocks",
            sim.node_name(node)
        );
        assert_eq!(sim.remote_blocks_held(node).len(), 4);
        assert_eq!(sim.local_block_count(node), 4);
        assert!(sim.successful_transfers(node) > 0);
    }
    assert_bookkeeping_is_mutual(&sim);
    assert_storage_accounting(&sim, &specs);
    Ok(())
}

#[test]
fn a_failure_purges_all_bookkeeping() -> Result<(), SimulationError> {
    // the short-lived node fails within the horizon and stays failed; the
    // survivor must see its backups on the failed node disappear
    let mut short_lived = peer("doomed");
    short_lived.average_uptime = 100.0 * DAY;
    short_lived.average_lifetime = HOUR;
    short_lived.average_recover_time = 1e15;
    let mut survivor = peer("survivor");
    survivor.average_uptime = 100.0 * DAY;
    survivor.average_lifetime = 100.0 * YEAR;
    let specs = vec![short_lived, survivor];
    let mut sim = Backup::new(specs.clone(), false, seeded(Some(1)))?;
    sim.run(30.0 * DAY)?;

    let ids = sim.node_ids();
    let (doomed, survivor) = (ids[0], ids[1]);
    assert_eq!(sim.stats().total_failures(), 1);
    assert!(sim.has_failed(doomed));
    assert!(!sim.is_online(doomed));
    assert_eq!(sim.local_block_count(doomed), 0);
    assert!(sim.remote_blocks_held(doomed).is_empty());
    assert!(sim
        .backed_up_blocks(survivor)
        .iter()
        .all(|holder| *holder != Some(doomed)));
    // the failed node's free space is back to its initial reservation
    assert_eq!(
        sim.free_space(doomed),
        specs[0].storage_size - specs[0].block_size() * specs[0].n as u64
    );
    assert_bookkeeping_is_mutual(&sim);
    Ok(())
}

#[test]
fn churn_preserves_storage_and_bookkeeping_invariants() -> Result<(), SimulationError> {
    // short uptimes against long transfers: most transfers get cancelled
    // mid-flight, which must never corrupt block or storage state
    let mut specs: Vec<NodeSpec> = (0..4).map(|i| peer(&format!("peer-{}", i))).collect();
    for spec in &mut specs {
        spec.average_uptime = 600.0;
        spec.average_downtime = 600.0;
        spec.average_lifetime = 30.0 * DAY;
    }
    let mut sim = Backup::new(specs.clone(), false, seeded(Some(3)))?;
    sim.run(10.0 * DAY)?;
    assert_bookkeeping_is_mutual(&sim);
    assert_storage_accounting(&sim, &specs);
    Ok(())
}

#[test]
fn parallel_mode_preserves_the_same_invariants() -> Result<(), SimulationError> {
    let mut specs: Vec<NodeSpec> = (0..5).map(|i| peer(&format!("peer-{}", i))).collect();
    for spec in &mut specs {
        spec.average_uptime = 8.0 * HOUR;
    }
    let mut sim = Backup::new(specs.clone(), true, seeded(Some(5)))?;
    sim.run(20.0 * DAY)?;
    assert!(sim.stats().total_transfers() >= 1);
    assert_bookkeeping_is_mutual(&sim);
    assert_storage_accounting(&sim, &specs);
    Ok(())
}

#[test]
fn identical_seeds_give_identical_runs() -> Result<(), SimulationError> {
    let specs: Vec<NodeSpec> = (0..3).map(|i| peer(&format!("peer-{}", i))).collect();
    let mut first = Backup::new(specs.clone(), false, seeded(Some(11)))?;
    first.run(30.0 * DAY)?;
    let mut second = Backup::new(specs, false, seeded(Some(11)))?;
    second.run(30.0 * DAY)?;
    assert_eq!(first.stats(), second.stats());
    for node in first.node_ids() {
        assert_eq!(
            first.backed_up_blocks(node),
            second.backed_up_blocks(node)
        );
        assert_eq!(
            first.successful_transfers(node),
            second.successful_transfers(node)
        );
    }
    Ok(())
}

#[test]
fn bandwidth_waste_is_sampled_daily() -> Result<(), SimulationError> {
    let specs = vec![peer("peer-0"), peer("peer-1")];
    let mut sim = Backup::new(specs, false, seeded(Some(2)))?;
    sim.run(10.0 * DAY)?;
    let stats = sim.stats();
    // one sample per simulated day at minimum, starting at t=0
    assert!(stats.up_bw_wasted.len() >= 10);
    assert_eq!(stats.up_bw_wasted[0].0, 0.0);
    assert_eq!(stats.up_bw_wasted.len(), stats.dw_bw_wasted.len());
    for window in stats.up_bw_wasted.windows(2) {
        assert!(window[0].0 <= window[1].0);
    }
    Ok(())
}

#[test]
fn the_config_file_drives_a_full_run() -> Result<(), SimulationError> {
    let document = r#"
        [client]
        number = 3
        n = 4
        k = 2
        data_size = "1 MiB"
        storage_size = "4 MiB"
        upload_speed = "1 KiB"
        download_speed = "1 KiB"
        average_uptime = "50 days"
        average_downtime = "1 hour"
        average_lifetime = "10 years"
        average_recover_time = "1 hour"
        arrival_time = "0 s"
    "#;
    let specs = parse_node_classes(document)?;
    assert_eq!(specs.len(), 3);
    let mut sim = Backup::new(specs, false, seeded(Some(1)))?;
    sim.run(parse_timespan("30 days")?)?;
    assert!(sim.stats().total_transfers() >= 1);
    assert_bookkeeping_is_mutual(&sim);
    Ok(())
}
