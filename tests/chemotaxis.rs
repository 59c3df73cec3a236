use chemotaxis_engine::{
    Action, Cell, Environment, EnvironmentNode, EuclideanDistance, Molecule, Node, NodeId, Param, Reaction, SimError,
    TimeDistribution, Vec2,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const CONCENTRATION1: f64 = 5.0;
const CONCENTRATION2: f64 = 10.0;
const CONCENTRATION3: f64 = 1.0;
const PRECISION: f64 = 1e-15;

struct Fixture {
    env: Environment,
    rng: StdRng,
    cell: NodeId,
    corners: [NodeId; 4],
}

/// Four compartments at (0,0), (1,0), (0,1) and `fourth`, plus a point cell at `cell_at`.
fn square(fourth: Vec2, cell_at: Vec2) -> Fixture {
    let mut env = Environment::new(EuclideanDistance::new(2.0).unwrap());
    let corners = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), fourth]
        .map(|p| env.add_node(EnvironmentNode::new(), p).unwrap());
    let cell = env.add_node(Cell::new(), cell_at).unwrap();
    Fixture {
        env,
        rng: StdRng::seed_from_u64(2024),
        cell,
        corners,
    }
}

impl Fixture {
    fn set(&mut self, corner: usize, species: &str, value: f64) {
        self.env
            .node_mut(self.corners[corner])
            .unwrap()
            .set_concentration(&Molecule::new(species), value)
            .unwrap();
    }

    fn reaction(&mut self, name: &str, params: &[Param]) -> Reaction {
        let action = Action::resolve(name, params).unwrap();
        let td = TimeDistribution::exponential(1.0).unwrap();
        Reaction::new(&mut self.rng, &self.env, self.cell, td, vec![], vec![action]).unwrap()
    }

    fn polarize(&mut self, species: &str) -> Reaction {
        self.reaction("ChemotacticPolarization", &[species.into(), "up".into()])
    }

    fn mover(&mut self) -> Reaction {
        self.reaction("CellMove", &[false.into(), 1.0.into()])
    }

    fn fire(&mut self, reaction: &mut Reaction) {
        reaction.execute(&mut self.env, &mut self.rng).unwrap();
    }

    fn polarization(&self) -> Vec2 {
        self.env.cell(self.cell).unwrap().polarization()
    }

    fn position(&self) -> Vec2 {
        self.env.position(self.cell).unwrap()
    }
}

fn assert_close(actual: Vec2, expected: Vec2) {
    assert!(
        (actual.x - expected.x).abs() <= PRECISION && (actual.y - expected.y).abs() <= PRECISION,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn polarizes_towards_the_strongest_corner() {
    let mut f = square(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5));
    f.set(3, "A", CONCENTRATION2);
    f.set(1, "A", CONCENTRATION1);
    f.set(2, "A", CONCENTRATION1);
    let mut r = f.polarize("A");
    f.fire(&mut r);
    assert_close(f.polarization(), Vec2::new(0.5f64.sqrt(), 0.5f64.sqrt()));
}

#[test]
fn moving_the_strong_corner_out_of_range_cancels_the_gradient() {
    let mut f = square(Vec2::new(3.0, 3.0), Vec2::new(0.5, 0.5));
    f.set(3, "A", CONCENTRATION2);
    f.set(1, "A", CONCENTRATION1);
    f.set(2, "A", CONCENTRATION1);
    let mut r = f.polarize("A");
    f.fire(&mut r);
    assert_close(f.polarization(), Vec2::zero());
}

#[test]
fn no_species_anywhere_means_no_polarization() {
    let mut f = square(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5));
    let mut r = f.polarize("A");
    f.fire(&mut r);
    assert_close(f.polarization(), Vec2::zero());
}

#[test]
fn lonely_cell_never_polarizes() {
    let mut env = Environment::new(EuclideanDistance::new(2.0).unwrap());
    let mut rng = StdRng::seed_from_u64(1);
    let cell = env.add_node(Cell::new(), Vec2::new(0.5, 0.5)).unwrap();
    let action = Action::resolve("ChemotacticPolarization", &["A".into(), "up".into()]).unwrap();
    let td = TimeDistribution::exponential(1.0).unwrap();
    let mut r = Reaction::new(&mut rng, &env, cell, td, vec![], vec![action]).unwrap();
    for _ in 0..10 {
        r.execute(&mut env, &mut rng).unwrap();
        assert_eq!(env.cell(cell).unwrap().polarization(), Vec2::zero());
    }
}

#[test]
fn polarization_is_overwritten_by_the_last_species_sensed() {
    let mut env = Environment::new(EuclideanDistance::new(2.0).unwrap());
    let mut rng = StdRng::seed_from_u64(1);
    let cell = env.add_node(Cell::new(), Vec2::new(0.0, 0.0)).unwrap();
    let a_source = EnvironmentNode::new();
    let b_source = EnvironmentNode::new();
    let a_source = Node::from(a_source)
        .with_concentration(&Molecule::new("A"), CONCENTRATION3)
        .unwrap();
    let b_source = Node::from(b_source)
        .with_concentration(&Molecule::new("B"), CONCENTRATION3)
        .unwrap();
    env.add_node(a_source, Vec2::new(1.0, 0.0)).unwrap();
    env.add_node(b_source, Vec2::new(-1.0, 0.0)).unwrap();

    let mut reactions: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|species| {
            let action = Action::resolve("ChemotacticPolarization", &[species.into(), "up".into()]).unwrap();
            let td = TimeDistribution::exponential(1.0).unwrap();
            Reaction::new(&mut rng, &env, cell, td, vec![], vec![action]).unwrap()
        })
        .collect();
    for r in &mut reactions {
        r.execute(&mut env, &mut rng).unwrap();
    }
    assert_close(env.cell(cell).unwrap().polarization(), Vec2::new(-1.0, 0.0));
}

#[test]
fn cell_moves_along_its_polarization() {
    let mut f = square(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5));
    f.set(3, "A", CONCENTRATION2);
    f.set(1, "A", CONCENTRATION1);
    f.set(2, "A", CONCENTRATION1);
    let mut polarize = f.polarize("A");
    let mut mover = f.mover();
    f.fire(&mut polarize);
    f.fire(&mut mover);
    let expected = 0.5 + 0.5f64.sqrt();
    assert_close(f.position(), Vec2::new(expected, expected));
}

#[test]
fn repeated_moves_accumulate_the_same_displacement() {
    let mut f = square(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5));
    f.set(3, "A", CONCENTRATION2);
    let mut polarize = f.polarize("A");
    let mut mover = f.mover();
    f.fire(&mut polarize);
    f.fire(&mut mover);
    f.fire(&mut mover);
    let expected = 0.5 + 2.0 * 0.5f64.sqrt();
    let p = f.position();
    assert!((p.x - expected).abs() < 1e-12 && (p.y - expected).abs() < 1e-12, "p = {}", p);
}

#[test]
fn cell_on_the_maximum_does_not_move() {
    let mut f = square(Vec2::new(1.0, 1.0), Vec2::new(1.0, 1.0));
    f.set(3, "A", CONCENTRATION2);
    f.set(1, "A", CONCENTRATION1);
    f.set(2, "A", CONCENTRATION1);
    let mut polarize = f.polarize("A");
    let mut mover = f.mover();
    f.fire(&mut polarize);
    f.fire(&mut mover);
    assert_close(f.position(), Vec2::new(1.0, 1.0));
}

#[test]
fn uniform_field_leaves_the_cell_in_place() {
    let mut f = square(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5));
    for corner in 0..4 {
        f.set(corner, "A", CONCENTRATION2);
    }
    let mut polarize = f.polarize("A");
    let mut mover = f.mover();
    f.fire(&mut polarize);
    f.fire(&mut mover);
    f.fire(&mut mover);
    assert_close(f.position(), Vec2::new(0.5, 0.5));
}

#[test]
fn blocked_cells_never_end_up_overlapping() {
    let mut env = Environment::new(EuclideanDistance::new(3.0).unwrap());
    let mut rng = StdRng::seed_from_u64(77);
    let a = Molecule::new("A");
    let source = env.add_node(EnvironmentNode::new(), Vec2::new(5.0, 0.0)).unwrap();
    env.node_mut(source).unwrap().set_concentration(&a, 1.0).unwrap();
    let mut cells = Vec::new();
    for x in [2.0, 3.2, 4.4] {
        cells.push(env.add_node(Cell::with_diameter(1.0).unwrap(), Vec2::new(x, 0.0)).unwrap());
    }
    assert!(matches!(
        env.add_node(Cell::with_diameter(1.0).unwrap(), Vec2::new(2.5, 0.0)),
        Err(SimError::Overlap { .. })
    ));

    let mut reactions: Vec<_> = cells
        .iter()
        .map(|&cell| {
            let actions = vec![
                Action::resolve("ChemotacticPolarization", &["A".into(), "up".into()]).unwrap(),
                Action::resolve("CellMove", &[false.into(), 0.7.into()]).unwrap(),
            ];
            let td = TimeDistribution::exponential(1.0).unwrap();
            Reaction::new(&mut rng, &env, cell, td, vec![], actions).unwrap()
        })
        .collect();
    for _ in 0..20 {
        for r in &mut reactions {
            r.execute(&mut env, &mut rng).unwrap();
        }
        for (i, &c1) in cells.iter().enumerate() {
            for &c2 in &cells[i + 1..] {
                let d = env.position(c1).unwrap().distance(env.position(c2).unwrap());
                assert!(d >= 1.0, "{} and {} are {} apart", c1, c2, d);
            }
        }
    }
}
