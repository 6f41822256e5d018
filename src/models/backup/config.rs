//! Node class configuration for the backup model.  The configuration file
//! is a sectioned key-value document: each section describes one class of
//! identical nodes and how many of them to create.  Sizes and speeds accept
//! human-friendly suffixes ("1 MiB", "500 KiB"); durations accept unit
//! names ("30 s", "8 hours", "100 years").
//!
//! ```toml
//! [client]
//! number = 10
//! n = 10
//! k = 8
//! data_size = "1 GiB"
//! storage_size = "5 GiB"
//! upload_speed = "500 KiB"
//! download_speed = "2 MiB"
//! average_uptime = "8 hours"
//! average_downtime = "16 hours"
//! average_lifetime = "1 year"
//! average_recover_time = "3 days"
//! arrival_time = "0 s"
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::utils::errors::SimulationError;
use crate::utils::units::{parse_size, parse_timespan};

use super::node::NodeSpec;

#[derive(Debug, Clone, Deserialize)]
struct NodeClass {
    number: u32,
    n: usize,
    k: usize,
    data_size: String,
    storage_size: String,
    upload_speed: String,
    download_speed: String,
    average_uptime: String,
    average_downtime: String,
    average_lifetime: String,
    average_recover_time: String,
    arrival_time: String,
}

impl NodeClass {
    fn build(&self, name: String) -> Result<NodeSpec, SimulationError> {
        let spec = NodeSpec {
            name,
            n: self.n,
            k: self.k,
            data_size: parse_size(&self.data_size)?,
            storage_size: parse_size(&self.storage_size)?,
            upload_speed: parse_size(&self.upload_speed)? as f64,
            download_speed: parse_size(&self.download_speed)? as f64,
            average_uptime: parse_timespan(&self.average_uptime)?,
            average_downtime: parse_timespan(&self.average_downtime)?,
            average_lifetime: parse_timespan(&self.average_lifetime)?,
            average_recover_time: parse_timespan(&self.average_recover_time)?,
            arrival_time: parse_timespan(&self.arrival_time)?,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Expand a configuration document into one `NodeSpec` per node, named
/// `<class>-<index>`.  Classes are expanded in name order, so a given
/// document always produces the same arena layout.
pub fn parse_node_classes(text: &str) -> Result<Vec<NodeSpec>, SimulationError> {
    let classes: BTreeMap<String, NodeClass> = toml::from_str(text)?;
    let mut specs = Vec::new();
    for (class_name, class) in &classes {
        for index in 0..class.number {
            specs.push(class.build(format!("{}-{}", class_name, index))?);
        }
    }
    Ok(specs)
}
