use anyhow::{Context, Result};
use chemotaxis_common::{NodeKind, NodeSnapshot, ScenarioConfig, Snapshot};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::action::Action;
use crate::condition::Condition;
use crate::environment::Environment;
use crate::linking::EuclideanDistance;
use crate::molecule::Molecule;
use crate::node::{Cell, EnvironmentNode, Node, NodeId};
use crate::reaction::Reaction;
use crate::time_distribution::{Time, TimeDistribution};

/// Drives the reactions of a scenario in time order.
pub struct Simulation {
    /// The scenario the simulation was built from.
    pub config: ScenarioConfig,
    environment: Environment,
    reactions: Vec<Reaction>,
    /// Id of each configured node, by position in `config.nodes`.
    node_ids: Vec<NodeId>,
    /// Single random source shared by every reaction, seeded once.
    rng: StdRng,
    current_time: Time,
    events_executed: u64,
    failed_events: u64,
    next_record_time: Time,
    /// Stores collected snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Places the configured nodes and resolves the configured reactions.
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let rule = EuclideanDistance::new(config.environment.linking_range)?;
        let mut environment = Environment::with_grid_cell_size(rule, config.grid_cell_size());

        let mut node_ids = Vec::with_capacity(config.nodes.len());
        for (idx, node_config) in config.nodes.iter().enumerate() {
            let mut node: Node = match node_config.kind {
                NodeKind::Cell => Cell::with_diameter(node_config.diameter)
                    .with_context(|| format!("node {}", idx))?
                    .into(),
                NodeKind::Environment => EnvironmentNode::new().into(),
            };
            for (species, value) in &node_config.concentrations {
                node.set_concentration(&Molecule::new(species), *value)
                    .with_context(|| format!("node {}", idx))?;
            }
            let id = environment
                .add_node(node, node_config.position.into())
                .with_context(|| format!("placing node {}", idx))?;
            node_ids.push(id);
        }

        let mut reactions = Vec::with_capacity(config.reactions.len());
        for (idx, reaction_config) in config.reactions.iter().enumerate() {
            let conditions = reaction_config
                .conditions
                .iter()
                .map(|c| Condition::resolve(&c.name, &c.params))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("reaction {}", idx))?;
            let actions = reaction_config
                .actions
                .iter()
                .map(|a| Action::resolve(&a.name, &a.params))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("reaction {}", idx))?;
            let time_distribution = TimeDistribution::from_config(&reaction_config.time_distribution)
                .with_context(|| format!("reaction {}", idx))?;
            let reaction = Reaction::new(
                &mut rng,
                &environment,
                node_ids[reaction_config.node],
                time_distribution,
                conditions,
                actions,
            )
            .with_context(|| format!("reaction {}", idx))?;
            reactions.push(reaction);
        }

        info!(
            "Scenario ready: {} nodes, {} reactions, seed {}.",
            environment.node_count(),
            reactions.len(),
            config.seed
        );

        Ok(Self {
            config,
            environment,
            reactions,
            node_ids,
            rng,
            current_time: 0.0,
            events_executed: 0,
            failed_events: 0,
            next_record_time: 0.0,
            recorded_snapshots: Vec::new(),
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Id of the `index`-th configured node.
    pub fn node_id(&self, index: usize) -> Option<NodeId> {
        self.node_ids.get(index).copied()
    }

    pub fn current_time(&self) -> Time {
        self.current_time
    }

    pub fn events_executed(&self) -> u64 {
        self.events_executed
    }

    pub fn failed_events(&self) -> u64 {
        self.failed_events
    }

    /// Reaction with the earliest finite firing time. Ties go to the lower index.
    fn next_event(&self) -> Option<(usize, Time)> {
        self.reactions
            .iter()
            .enumerate()
            .map(|(idx, r)| (idx, r.next_occurrence()))
            .filter(|(_, t)| t.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Fires the next reaction. Returns `false` once nothing can fire before the end time.
    pub fn step(&mut self) -> Result<bool> {
        let end_time = self.config.timing.end_time;
        let (idx, time) = match self.next_event() {
            Some((idx, time)) if time <= end_time => (idx, time),
            _ => return Ok(false),
        };
        self.record_due_snapshots(time);
        self.current_time = time;

        match self.reactions[idx].execute(&mut self.environment, &mut self.rng) {
            Ok(()) => self.events_executed += 1,
            Err(e) => {
                // The execution was rolled back; the run goes on.
                warn!("Reaction {} failed at t={:.4}: {}", idx, time, e);
                self.failed_events += 1;
            }
        }

        for (other, reaction) in self.reactions.iter_mut().enumerate() {
            if other != idx {
                reaction
                    .update(&self.environment, time, &mut self.rng)
                    .with_context(|| format!("updating reaction {}", other))?;
            }
        }
        trace!("t={:.4}: fired reaction {}", time, idx);
        Ok(true)
    }

    /// Steps until the end time, the event budget, or until no reaction can fire.
    pub fn run(&mut self) -> Result<()> {
        while self.events_executed + self.failed_events < self.config.timing.max_events {
            if !self.step()? {
                break;
            }
        }
        self.finish();
        Ok(())
    }

    /// Records the snapshots still due up to the end time.
    pub fn finish(&mut self) {
        let end_time = self.config.timing.end_time;
        self.record_due_snapshots(end_time);
        debug!(
            "Finished at t={:.4} after {} events ({} failed).",
            self.current_time, self.events_executed, self.failed_events
        );
    }

    // State is constant between events, so snapshots due before `up_to` see the current state.
    fn record_due_snapshots(&mut self, up_to: Time) {
        let end_time = self.config.timing.end_time;
        while self.next_record_time <= up_to && self.next_record_time <= end_time {
            let snapshot = self.snapshot_at(self.next_record_time);
            self.recorded_snapshots.push(snapshot);
            self.next_record_time += self.config.timing.record_interval;
        }
    }

    fn snapshot_at(&self, time: Time) -> Snapshot {
        let mut nodes = Vec::with_capacity(self.environment.node_count());
        let mut total_neighbors = 0usize;
        for (id, node, position) in self.environment.iter() {
            total_neighbors += self.environment.neighbors(id).map(|n| n.len()).unwrap_or(0);
            nodes.push(NodeSnapshot {
                id: id.index(),
                kind: node.kind(),
                position: (position.x, position.y),
                polarization: node.as_cell().map(|c| (c.polarization().x, c.polarization().y)),
                concentrations: node
                    .concentrations()
                    .iter()
                    .map(|(m, v)| (m.name().to_string(), v))
                    .collect(),
            });
        }
        let mean_neighbor_count = if nodes.is_empty() {
            0.0
        } else {
            total_neighbors as f64 / nodes.len() as f64
        };
        Snapshot {
            time,
            events_executed: self.events_executed,
            mean_neighbor_count,
            nodes,
        }
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    /// Current positions of all cells.
    pub fn get_results(&self) -> Vec<(f64, f64)> {
        self.environment
            .iter()
            .filter(|(_, node, _)| node.kind() == NodeKind::Cell)
            .map(|(_, _, p)| (p.x, p.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
seed = 42

[environment]
linking_range = 2.0

[timing]
end_time = 5.0
record_interval = 1.0

[output]
base_filename = "test"
save_positions = false
save_stats = false

[[nodes]]
kind = "environment"
position = [1.0, 0.0]
concentrations = { A = 5.0 }

[[nodes]]
kind = "cell"
position = [0.0, 0.0]

[[reactions]]
node = 1
time_distribution = { type = "dirac_comb", rate = 1.0 }
actions = [
    { name = "ChemotacticPolarization", params = ["A", "up"] },
    { name = "CellMove", params = [false, 0.1] },
]
"#;

    fn scenario() -> ScenarioConfig {
        ScenarioConfig::from_toml_str(SCENARIO).unwrap()
    }

    #[test]
    fn periodic_chemotaxis_walks_towards_the_source() {
        let mut sim = Simulation::new(scenario()).unwrap();
        sim.run().unwrap();
        // Fires at t = 1..=5.
        assert_eq!(sim.events_executed(), 5);
        let cell = sim.node_id(1).unwrap();
        let p = sim.environment().position(cell).unwrap();
        assert!((p.x - 0.5).abs() < 1e-12 && p.y == 0.0, "p = {}", p);

        let snapshots = sim.get_recorded_snapshots();
        let times: Vec<_> = snapshots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(snapshots[0].nodes[1].polarization, Some((0.0, 0.0)));
        assert_eq!(snapshots[0].total_concentration("A"), 5.0);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut config = scenario();
        config.reactions[0].time_distribution = chemotaxis_common::TimeDistributionConfig::Exponential { rate: 3.0 };
        let run = |config: ScenarioConfig| {
            let mut sim = Simulation::new(config).unwrap();
            sim.run().unwrap();
            (sim.events_executed(), sim.get_results())
        };
        assert_eq!(run(config.clone()), run(config));
    }

    #[test]
    fn unknown_action_fails_construction() {
        let broken = SCENARIO.replace("CellMove", "CellTeleport");
        let config = ScenarioConfig::from_toml_str(&broken).unwrap();
        let err = Simulation::new(config).err().unwrap();
        assert!(format!("{:#}", err).contains("unknown action 'CellTeleport'"));
    }

    #[test]
    fn event_budget_is_respected() {
        let mut config = scenario();
        config.timing.max_events = 2;
        let mut sim = Simulation::new(config).unwrap();
        sim.run().unwrap();
        assert_eq!(sim.events_executed(), 2);
    }
}
