use log::trace;
use rand::Rng;

use crate::action::Action;
use crate::condition::Condition;
use crate::environment::Environment;
use crate::error::Result;
use crate::node::NodeId;
use crate::time_distribution::{Time, TimeDistribution};

/// Conditions and actions attached to one node, fired at times drawn from a [`TimeDistribution`].
#[derive(Debug, Clone)]
pub struct Reaction {
    node: NodeId,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
    time_distribution: TimeDistribution,
    propensity: f64,
    /// Time of the most recent firing or update.
    last_update: Time,
}

impl Reaction {
    /// Binds the reaction to `node`, checks every action can run there, and schedules the first firing.
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        env: &Environment,
        node: NodeId,
        time_distribution: TimeDistribution,
        conditions: Vec<Condition>,
        actions: Vec<Action>,
    ) -> Result<Self> {
        env.node(node)?;
        for action in &actions {
            action.validate(env, node)?;
        }
        let mut reaction = Self {
            node,
            conditions,
            actions,
            time_distribution,
            propensity: 0.0,
            last_update: 0.0,
        };
        reaction.update(env, 0.0, rng)?;
        Ok(reaction)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn propensity(&self) -> f64 {
        self.propensity
    }

    pub fn next_occurrence(&self) -> Time {
        self.time_distribution.next_occurrence()
    }

    /// Rate of the time distribution times the product of the condition contributions.
    pub fn compute_propensity(&self, env: &Environment) -> Result<f64> {
        let mut propensity = self.time_distribution.rate();
        for condition in &self.conditions {
            propensity *= condition.propensity_contribution(env, self.node)?;
        }
        Ok(propensity)
    }

    pub fn can_execute(&self, env: &Environment) -> Result<bool> {
        for condition in &self.conditions {
            if !condition.is_valid(env, self.node)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Refreshes the propensity at time `now` without firing, rescheduling if it changed.
    pub fn update<R: Rng + ?Sized>(&mut self, env: &Environment, now: Time, rng: &mut R) -> Result<()> {
        self.reschedule(env, now, false, rng)
    }

    fn reschedule<R: Rng + ?Sized>(&mut self, env: &Environment, now: Time, executed: bool, rng: &mut R) -> Result<()> {
        self.propensity = self.compute_propensity(env)?;
        // The time distribution divides by the propensity; hand it the factor relative to its own rate.
        let factor = self.propensity / self.time_distribution.rate();
        self.time_distribution.update(now, executed, factor, rng)?;
        self.last_update = now;
        Ok(())
    }

    /// Runs every action in order as a single all-or-nothing unit, then draws the next firing time.
    ///
    /// A failing action rolls back everything this execution did. The firing is consumed either way.
    pub fn execute<R: Rng + ?Sized>(&mut self, env: &mut Environment, rng: &mut R) -> Result<()> {
        let now = match self.next_occurrence() {
            t if t.is_finite() => t,
            _ => self.last_update,
        };
        let node = self.node;
        let actions = &self.actions;
        let outcome = env.transaction(|env| actions.iter().try_for_each(|action| action.execute(env, node)));
        trace!("Reaction on {} fired at {:.4}: {:?}", node, now, outcome);
        self.reschedule(env, now, true, rng)?;
        outcome
    }
}
