//! Static process graph plus the live boost on each edge, for host rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{PipelineBoost, Stream, StreamFlows, UnitCategory, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: UnitId,
    pub name: String,
    pub category: UnitCategory,
    pub capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub stream: Stream,
    pub source: UnitId,
    pub target: UnitId,
    pub nominal_capacity: f64,
    /// 1.0 unless a bypass is active.
    pub multiplier: f64,
    pub boost_expires_at: Option<u64>,
    /// Last tick's flow, kbpd.
    pub flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTopology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

pub fn process_topology(
    boosts: &BTreeMap<Stream, PipelineBoost>,
    flows: &StreamFlows,
) -> ProcessTopology {
    let nodes = UnitId::ALL
        .into_iter()
        .map(|id| TopologyNode {
            id,
            name: id.display_name().to_string(),
            category: id.category(),
            capacity: id.capacity(),
        })
        .collect();
    let edges = Stream::ALL
        .into_iter()
        .map(|stream| {
            let boost = boosts.get(&stream);
            TopologyEdge {
                stream,
                source: stream.source(),
                target: stream.target(),
                nominal_capacity: stream.nominal_capacity(),
                multiplier: boost.map_or(1.0, |b| b.multiplier),
                boost_expires_at: boost.map(|b| b.expires_at),
                flow: flows.get(stream),
            }
        })
        .collect();
    ProcessTopology { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stream_is_an_edge_between_known_nodes() {
        let topology = process_topology(&BTreeMap::new(), &StreamFlows::default());
        assert_eq!(topology.nodes.len(), 6);
        assert_eq!(topology.edges.len(), 5);
        for edge in &topology.edges {
            assert!(topology.nodes.iter().any(|n| n.id == edge.source));
            assert!(topology.nodes.iter().any(|n| n.id == edge.target));
            assert!((edge.multiplier - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn active_boost_shows_on_its_edge() {
        let boosts = BTreeMap::from([(
            Stream::HeavyFcc,
            PipelineBoost {
                multiplier: 1.35,
                expires_at: 400,
            },
        )]);
        let topology = process_topology(&boosts, &StreamFlows::default());
        let edge = topology
            .edges
            .iter()
            .find(|e| e.stream == Stream::HeavyFcc)
            .unwrap();
        assert_eq!(edge.boost_expires_at, Some(400));
        assert_eq!(edge.target, UnitId::Fcc);
    }
}
