/// Directed river-network graph over reach records.
///
/// Stations are interned into a node arena (first-appearance order) with an
/// adjacency list of reach indices. The traversal order approximates
/// upstream → downstream: depth-first visitation from every zero-indegree
/// node, then any edges left unvisited (cycles, components without a
/// source) appended in input order. Every edge appears exactly once, and
/// the whole order is a deterministic function of the input order — cyclic
/// leftovers are tolerated but carry no physical guarantee.
///
/// The order matters because routing accumulates inflow per downstream node
/// one step at a time; within cyclic components it is merely reproducible.

use crate::config::EngineConfig;
use crate::model::{join_key, Reach};
use std::collections::HashMap;

const GRAVITY_MS2: f64 = 9.81;

/// One directed edge of the network.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Arena index of the upstream node.
    pub from: usize,
    /// Arena index of the downstream node.
    pub to: usize,
    /// The reach record backing this edge.
    pub reach: Reach,
}

/// Constant per-edge routing parameters, computed once per run.
#[derive(Debug, Clone, Copy)]
pub struct ReachParams {
    /// Travel time K, seconds.
    pub travel_time_s: f64,
    /// Muskingum weighting factor X.
    pub weighting_x: f64,
    /// Wave celerity, m/s.
    pub celerity_ms: f64,
}

/// The interned graph plus its traversal order.
#[derive(Debug)]
pub struct RiverNetwork {
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    traversal: Vec<usize>,
}

impl RiverNetwork {
    /// Builds the graph from reach records, skipping reaches whose trimmed
    /// endpoints are empty, and computes the traversal order.
    pub fn build(reaches: &[Reach]) -> Self {
        let mut nodes: Vec<String> = Vec::new();
        let mut node_index: HashMap<String, usize> = HashMap::new();
        let mut edges: Vec<Edge> = Vec::new();

        let mut intern = |nodes: &mut Vec<String>,
                          node_index: &mut HashMap<String, usize>,
                          code: &str| {
            let key = join_key(code);
            *node_index.entry(key.clone()).or_insert_with(|| {
                nodes.push(key);
                nodes.len() - 1
            })
        };

        for reach in reaches {
            let from_key = join_key(&reach.from_code);
            let to_key = join_key(&reach.to_code);
            if from_key.is_empty() || to_key.is_empty() {
                continue;
            }
            let from = intern(&mut nodes, &mut node_index, &reach.from_code);
            let to = intern(&mut nodes, &mut node_index, &reach.to_code);
            edges.push(Edge { from, to, reach: reach.clone() });
        }

        let traversal = compute_traversal(&nodes, &edges);
        Self { nodes, node_index, edges, traversal }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Join key of the node at `index`.
    pub fn node_code(&self, index: usize) -> &str {
        &self.nodes[index]
    }

    /// Arena index for a station code, if the station appears in the network.
    pub fn node_for(&self, code: &str) -> Option<usize> {
        self.node_index.get(&join_key(code)).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edge indices in routing order. Every edge appears exactly once.
    pub fn traversal_order(&self) -> &[usize] {
        &self.traversal
    }

    /// Routing parameters for every edge, in edge-index order.
    pub fn reach_params(&self, cfg: &EngineConfig) -> Vec<ReachParams> {
        self.edges.iter().map(|e| compute_reach_params(&e.reach, cfg)).collect()
    }
}

/// Depth-first edge visitation from every source node, leftovers appended
/// in input order. Explicit stack with a per-node out-edge cursor so the
/// visitation follows input order deterministically.
fn compute_traversal(nodes: &[String], edges: &[Edge]) -> Vec<usize> {
    let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut indegree = vec![0usize; nodes.len()];
    for (i, e) in edges.iter().enumerate() {
        out_edges[e.from].push(i);
        indegree[e.to] += 1;
    }

    let mut visited = vec![false; edges.len()];
    let mut order = Vec::with_capacity(edges.len());

    for source in 0..nodes.len() {
        if indegree[source] != 0 {
            continue;
        }
        // (node, cursor into out_edges[node])
        let mut stack: Vec<(usize, usize)> = vec![(source, 0)];
        while let Some((node, cursor)) = stack.pop() {
            if cursor >= out_edges[node].len() {
                continue;
            }
            stack.push((node, cursor + 1));
            let edge_idx = out_edges[node][cursor];
            if !visited[edge_idx] {
                visited[edge_idx] = true;
                order.push(edge_idx);
                stack.push((edges[edge_idx].to, 0));
            }
        }
    }

    // cycles and components with no zero-indegree node
    for (i, seen) in visited.iter().enumerate() {
        if !seen {
            order.push(i);
        }
    }
    order
}

/// Computes the constant routing parameters for one reach.
///
/// Celerity combines Manning flow velocity over the hydraulic radius with a
/// gravity-wave term; travel time is floored at the configured minimum so
/// adjacent stations always lag by at least one step.
fn compute_reach_params(reach: &Reach, cfg: &EngineConfig) -> ReachParams {
    let width = reach.width_m.unwrap_or(cfg.default_width_m);
    let depth = reach.depth_m.unwrap_or(cfg.default_depth_m);
    let manning_n = reach.manning_n.unwrap_or(cfg.default_manning_n);
    let slope = reach.slope.unwrap_or(cfg.default_slope).max(cfg.min_slope);
    let length = reach.length_m.unwrap_or(0.0);

    let hydraulic_radius = (width * depth) / (width + 2.0 * depth);
    let manning_velocity = hydraulic_radius.powf(2.0 / 3.0) * slope.sqrt() / manning_n;
    let celerity = (manning_velocity + (GRAVITY_MS2 * depth).sqrt()).max(cfg.min_celerity_ms);
    let travel_time = (length / celerity).max(cfg.min_travel_time_s);

    ReachParams {
        travel_time_s: travel_time,
        weighting_x: cfg.muskingum_x,
        celerity_ms: celerity,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn reach(from: &str, to: &str) -> Reach {
        Reach {
            from_code: from.to_string(),
            to_code: to.to_string(),
            length_m: None,
            slope: None,
            manning_n: None,
            width_m: None,
            depth_m: None,
        }
    }

    #[test]
    fn test_every_edge_appears_exactly_once() {
        let reaches = vec![
            reach("A", "B"),
            reach("B", "C"),
            reach("D", "C"),
            reach("C", "E"),
            // cycle off to the side
            reach("X", "Y"),
            reach("Y", "X"),
        ];
        let net = RiverNetwork::build(&reaches);
        let mut order = net.traversal_order().to_vec();
        assert_eq!(order.len(), reaches.len());
        order.sort_unstable();
        order.dedup();
        assert_eq!(order.len(), reaches.len(), "traversal repeated an edge");
    }

    #[test]
    fn test_acyclic_graph_visits_from_node_before_routing_edge() {
        let reaches = vec![
            reach("C", "E"),
            reach("A", "B"),
            reach("B", "C"),
            reach("D", "C"),
        ];
        let net = RiverNetwork::build(&reaches);

        // nodes reached so far, starting from the sources
        let mut reached: Vec<bool> = vec![false; net.node_count()];
        let mut indegree = vec![0usize; net.node_count()];
        for e in net.edges() {
            indegree[e.to] += 1;
        }
        for (i, d) in indegree.iter().enumerate() {
            if *d == 0 {
                reached[i] = true;
            }
        }
        for &edge_idx in net.traversal_order() {
            let e = &net.edges()[edge_idx];
            assert!(
                reached[e.from],
                "edge {} routed before its from-node {} was reached",
                edge_idx,
                net.node_code(e.from)
            );
            reached[e.to] = true;
        }
    }

    #[test]
    fn test_pure_cycle_still_covered_in_input_order() {
        let reaches = vec![reach("A", "B"), reach("B", "A")];
        let net = RiverNetwork::build(&reaches);
        // no source exists, so both edges are appended as leftovers
        assert_eq!(net.traversal_order(), &[0, 1]);
    }

    #[test]
    fn test_blank_endpoints_are_skipped() {
        let reaches = vec![reach("A", "B"), reach("  ", "B"), reach("C", "")];
        let net = RiverNetwork::build(&reaches);
        assert_eq!(net.edges().len(), 1);
        assert_eq!(net.node_count(), 2);
    }

    #[test]
    fn test_endpoint_codes_join_case_insensitively() {
        let reaches = vec![reach("a ", "B"), reach("A", "b")];
        let net = RiverNetwork::build(&reaches);
        assert_eq!(net.node_count(), 2);
        assert_eq!(net.node_for("  a"), net.node_for("A"));
    }

    #[test]
    fn test_traversal_is_deterministic() {
        let reaches = vec![
            reach("A", "B"),
            reach("A", "C"),
            reach("B", "D"),
            reach("C", "D"),
        ];
        let a = RiverNetwork::build(&reaches).traversal_order().to_vec();
        let b = RiverNetwork::build(&reaches).traversal_order().to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn test_reach_params_defaults_and_floors() {
        let cfg = EngineConfig::default();
        let net = RiverNetwork::build(&[reach("A", "B")]);
        let params = net.reach_params(&cfg);
        assert_eq!(params.len(), 1);
        // all fields defaulted: R = 40*3/46, v = R^(2/3)*sqrt(1e-4)/0.035
        let r: f64 = 120.0 / 46.0;
        let v = r.powf(2.0 / 3.0) * (1e-4f64).sqrt() / 0.035;
        let c = v + (9.81f64 * 3.0).sqrt();
        assert!((params[0].celerity_ms - c).abs() < 1e-9);
        // zero length floors K at one hour
        assert_eq!(params[0].travel_time_s, 3600.0);
        assert_eq!(params[0].weighting_x, 0.2);
    }

    #[test]
    fn test_long_reach_exceeds_travel_time_floor() {
        let cfg = EngineConfig::default();
        let mut r = reach("A", "B");
        r.length_m = Some(100_000.0);
        let net = RiverNetwork::build(&[r]);
        let params = net.reach_params(&cfg);
        assert!(
            params[0].travel_time_s > 3600.0,
            "100 km at ~6 m/s should take well over an hour"
        );
    }
}
