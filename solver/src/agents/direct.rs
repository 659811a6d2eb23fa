//! One model call per turn.
//!
//! The plain variant only shows the remaining words and the groups already
//! known to be wrong. The chain-of-thought variant asks for reasoning first
//! and replays every earlier miss together with the reasoning given for it.

use anyhow::Result;
use tracing::debug;

use super::{Role, Solver};
use crate::core::metrics::Metrics;
use crate::core::reply::parse_direct_reply;
use crate::core::types::{Guess, GuessContext, TurnFeedback};
use crate::io::prompt::{Attempt, PromptEngine};

pub struct DirectSolver {
    role: Role,
    prompts: PromptEngine,
    chain_of_thought: bool,
    history: Vec<Attempt>,
    pending: Option<Attempt>,
}

impl DirectSolver {
    pub fn new(role: Role, chain_of_thought: bool) -> Self {
        Self {
            role,
            prompts: PromptEngine::new(),
            chain_of_thought,
            history: Vec::new(),
            pending: None,
        }
    }

    /// Wrong guesses so far with their recorded reasoning.
    pub fn history(&self) -> &[Attempt] {
        &self.history
    }
}

impl Solver for DirectSolver {
    fn guess(&mut self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Guess> {
        let history: &[Attempt] = if self.chain_of_thought {
            &self.history
        } else {
            &[]
        };
        let prompt = self.prompts.render_direct(
            ctx.remaining,
            ctx.group_size,
            ctx.failed,
            history,
            self.chain_of_thought,
        )?;
        let reply = self.role.ask_parsed(&prompt, metrics, parse_direct_reply)?;
        debug!(group = ?reply.group, category = %reply.category, "direct proposal");
        self.pending = Some(Attempt {
            words: reply.group.clone(),
            rationale: reply
                .reasoning
                .clone()
                .unwrap_or_else(|| reply.category.clone()),
        });
        Ok(Guess::new(reply.group, reply.category))
    }

    fn observe(&mut self, feedback: &TurnFeedback) {
        let pending = self.pending.take();
        if let (TurnFeedback::Miss, Some(attempt)) = (feedback, pending) {
            self.history.push(attempt);
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::FailureLedger;
    use crate::test_support::{ScriptedResponder, words};

    const MISS_REPLY: &str =
        "Reasoning: all short\nGroup: KAYAK, LEVEL, MOM, TAB\nCategory: SHORT WORDS";
    const HIT_REPLY: &str = "Group: KAYAK, LEVEL, MOM, RACECAR\nCategory: PALINDROMES";

    fn solver(replies: &[&str], chain_of_thought: bool) -> (DirectSolver, ScriptedResponder) {
        let responder = ScriptedResponder::new("mini", replies);
        let role = Role::new("direct", Box::new(responder.clone()), "system");
        (DirectSolver::new(role, chain_of_thought), responder)
    }

    #[test]
    fn guess_uses_category_as_rationale() {
        let (mut solver, _) = solver(&[HIT_REPLY], false);
        let remaining = words(&["KAYAK", "LEVEL", "MOM", "RACECAR", "TAB"]);
        let failed = FailureLedger::default();
        let ctx = GuessContext {
            remaining: &remaining,
            board: &remaining,
            group_size: 4,
            failed: &failed,
        };
        let guess = solver.guess(&ctx, &mut Metrics::new(4)).expect("guess");
        assert_eq!(guess.words, words(&["KAYAK", "LEVEL", "MOM", "RACECAR"]));
        assert_eq!(guess.rationale, "PALINDROMES");
    }

    #[test]
    fn chain_of_thought_replays_misses() {
        let (mut solver, responder) = solver(&[MISS_REPLY, HIT_REPLY], true);
        let remaining = words(&["KAYAK", "LEVEL", "MOM", "RACECAR", "TAB"]);
        let failed = FailureLedger::default();
        let ctx = GuessContext {
            remaining: &remaining,
            board: &remaining,
            group_size: 4,
            failed: &failed,
        };
        let mut metrics = Metrics::new(4);
        solver.guess(&ctx, &mut metrics).expect("first");
        solver.observe(&TurnFeedback::Miss);
        assert_eq!(solver.history().len(), 1);
        assert_eq!(solver.history()[0].rationale, "all short");

        solver.guess(&ctx, &mut metrics).expect("second");
        let prompts = responder.prompts();
        assert!(prompts[1].contains("- KAYAK, LEVEL, MOM, TAB: all short"));

        solver.reset();
        assert!(solver.history().is_empty());
    }

    #[test]
    fn hits_are_not_recorded_as_history() {
        let (mut solver, _) = solver(&[HIT_REPLY], true);
        let remaining = words(&["KAYAK", "LEVEL", "MOM", "RACECAR"]);
        let failed = FailureLedger::default();
        let ctx = GuessContext {
            remaining: &remaining,
            board: &remaining,
            group_size: 4,
            failed: &failed,
        };
        solver.guess(&ctx, &mut Metrics::new(4)).expect("guess");
        solver.observe(&TurnFeedback::Hit {
            category: "PALINDROMES".to_string(),
        });
        assert!(solver.history().is_empty());
    }
}
