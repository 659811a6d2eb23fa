//! Guessing strategies.
//!
//! Every strategy implements [`Solver`]; [`Strategy`] selects one from config.
//! Strategies talk to models only through [`Role`]s, whose responders come from
//! a [`ResponderFactory`] so tests can script every reply.

use anyhow::{Context, Result, anyhow};

use crate::core::combinations::combinations;
use crate::core::metrics::Metrics;
use crate::core::types::{Guess, GuessContext, TurnFeedback};
use crate::io::config::{SolverConfig, StrategyKind};
use crate::io::prompt::{
    DIRECT_SYSTEM, GUESSER_SYSTEM, LITERAL_LISTENER_SYSTEM, PRAGMATIC_LISTENER_SYSTEM,
    SNAP_SYSTEM, SPEAKER_SYSTEM, VALIDATOR_SYSTEM,
};
use crate::io::responder::{ChatResponder, Responder};

pub mod direct;
pub mod negotiation;
pub mod role;
pub mod rsa;
pub mod snap;

pub use direct::DirectSolver;
pub use negotiation::NegotiationSolver;
pub use role::Role;
pub use rsa::RsaSolver;
pub use snap::SnapAgent;

pub const DIRECT: &str = "direct";
pub const GUESSER: &str = "guesser";
pub const VALIDATOR: &str = "validator";
pub const SNAP: &str = "snap";
pub const SPEAKER: &str = "speaker";
pub const LITERAL_LISTENER: &str = "literal_listener";
pub const PRAGMATIC_LISTENER: &str = "pragmatic_listener";

/// A guessing strategy.
pub trait Solver {
    /// Propose the next group from `ctx.remaining`.
    ///
    /// Should return `ctx.group_size` distinct remaining words. Anything else is
    /// submitted anyway and costs a strike; it never aborts the game.
    fn guess(&mut self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Guess>;

    /// Outcome of the guess returned by the last [`Solver::guess`] call.
    fn observe(&mut self, _feedback: &TurnFeedback) {}

    /// Forget all per-game state.
    fn reset(&mut self) {}
}

/// Source of responders, one per role name.
pub trait ResponderFactory {
    fn responder(&self, role: &str) -> Result<Box<dyn Responder>>;
}

/// Builds HTTP chat responders from the per-role endpoint table.
pub struct HttpResponders<'a> {
    config: &'a SolverConfig,
}

impl<'a> HttpResponders<'a> {
    pub fn new(config: &'a SolverConfig) -> Self {
        Self { config }
    }
}

impl ResponderFactory for HttpResponders<'_> {
    fn responder(&self, role: &str) -> Result<Box<dyn Responder>> {
        let endpoint = self.config.endpoint_for(role)?;
        let responder =
            ChatResponder::new(endpoint).with_context(|| format!("configure {role} endpoint"))?;
        Ok(Box::new(responder))
    }
}

/// The configured strategy.
pub enum Strategy {
    Direct(DirectSolver),
    Rsa(RsaSolver),
    Negotiation(NegotiationSolver),
}

impl Strategy {
    pub fn from_config(config: &SolverConfig, responders: &dyn ResponderFactory) -> Result<Self> {
        let role = |name: &'static str, system: &'static str| -> Result<Role> {
            Ok(Role::new(name, responders.responder(name)?, system))
        };
        let strategy = match config.strategy.kind {
            StrategyKind::Direct => Strategy::Direct(DirectSolver::new(
                role(DIRECT, DIRECT_SYSTEM)?,
                config.direct.chain_of_thought,
            )),
            StrategyKind::Rsa => Strategy::Rsa(RsaSolver::new(
                role(SPEAKER, SPEAKER_SYSTEM)?,
                role(LITERAL_LISTENER, LITERAL_LISTENER_SYSTEM)?,
                role(PRAGMATIC_LISTENER, PRAGMATIC_LISTENER_SYSTEM)?,
                config.rsa.clone(),
            )),
            StrategyKind::Negotiation => Strategy::Negotiation(NegotiationSolver::new(
                role(GUESSER, GUESSER_SYSTEM)?,
                role(VALIDATOR, VALIDATOR_SYSTEM)?,
                SnapAgent::new(role(SNAP, SNAP_SYSTEM)?),
                config.negotiation.clone(),
            )),
        };
        Ok(strategy)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Direct(_) => StrategyKind::Direct,
            Strategy::Rsa(_) => StrategyKind::Rsa,
            Strategy::Negotiation(_) => StrategyKind::Negotiation,
        }
    }

    fn inner(&mut self) -> &mut dyn Solver {
        match self {
            Strategy::Direct(solver) => solver,
            Strategy::Rsa(solver) => solver,
            Strategy::Negotiation(solver) => solver,
        }
    }
}

impl Solver for Strategy {
    fn guess(&mut self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Guess> {
        self.inner().guess(ctx, metrics)
    }

    fn observe(&mut self, feedback: &TurnFeedback) {
        self.inner().observe(feedback);
    }

    fn reset(&mut self) {
        self.inner().reset();
    }
}

/// First enumerated group not already known to be wrong.
///
/// Used when a strategy has nothing better; falls back to the very first group
/// when every candidate has failed before.
pub fn deterministic_fallback(ctx: &GuessContext<'_>) -> Result<Guess> {
    combinations(ctx.remaining, ctx.group_size)
        .find(|candidate| !ctx.failed.contains(candidate))
        .or_else(|| combinations(ctx.remaining, ctx.group_size).next())
        .map(|words| Guess::new(words, "fallback"))
        .ok_or_else(|| {
            anyhow!(
                "only {} words remain, cannot form a group of {}",
                ctx.remaining.len(),
                ctx.group_size
            )
        })
}
