//! Guesser/validator negotiation.
//!
//! Each turn the guesser proposes a group, the proposal is grounded against
//! the board without a model call, and a validator either agrees or sends the
//! guesser back with feedback. Rounds are capped by `max_retries`; running out
//! never errors and yields a fallback guess instead.
//!
//! The solver has two phases. It starts `Careful` (full negotiation) and drops
//! to `Snap` (single-shot proposals) after too many consecutive misses or
//! stalled turns. The next correct guess brings it back to `Careful`.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use super::{Role, SnapAgent, Solver, deterministic_fallback};
use crate::core::grounding::{describe, grounding_check};
use crate::core::ledger::RejectionBuffer;
use crate::core::metrics::Metrics;
use crate::core::puzzle::normalize_word;
use crate::core::reply::{parse_guesser_reply, parse_validator_reply};
use crate::core::types::{Guess, GuessContext, MalformedReplyError, TurnFeedback};
use crate::io::config::NegotiationConfig;
use crate::io::prompt::{GuesserPrompt, PromptEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Careful,
    Snap,
}

/// Result of one negotiated turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiated {
    /// The validator agreed, or only one group was left to propose.
    Agreed(Guess),
    /// Rounds ran out; best effort guess.
    Fallback(Guess),
}

pub struct NegotiationSolver {
    guesser: Role,
    validator: Role,
    snap: SnapAgent,
    prompts: PromptEngine,
    config: NegotiationConfig,
    /// Category label to group, for every agreement reached this game.
    accepted: BTreeMap<String, Vec<String>>,
    phase: Phase,
    consecutive_misses: u32,
    stalled_turns: u32,
}

impl NegotiationSolver {
    pub fn new(guesser: Role, validator: Role, snap: SnapAgent, config: NegotiationConfig) -> Self {
        Self {
            guesser,
            validator,
            snap,
            prompts: PromptEngine::new(),
            config,
            accepted: BTreeMap::new(),
            phase: Phase::Careful,
            consecutive_misses: 0,
            stalled_turns: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn accepted(&self) -> &BTreeMap<String, Vec<String>> {
        &self.accepted
    }

    /// Run guesser/validator rounds until agreement or `max_retries`.
    #[instrument(skip_all, fields(remaining = ctx.remaining.len()))]
    pub fn negotiate(&mut self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Negotiated> {
        // One slot per round, so no proposal is forgotten within a turn.
        let mut rejections = RejectionBuffer::new(self.config.max_retries as usize);
        let mut feedback: Option<String> = None;
        let mut understanding: Option<String> = None;
        let mut last_grounded: Option<Guess> = None;

        for round in 1..=self.config.max_retries {
            let prompt = self.prompts.render_guesser(&GuesserPrompt {
                remaining: ctx.remaining,
                group_size: ctx.group_size,
                failed: ctx.failed,
                rejections: &rejections,
                feedback: feedback.as_deref(),
                understanding: understanding.as_deref(),
                accepted: &self.accepted,
            })?;
            let reply = self
                .guesser
                .ask_parsed(&prompt, metrics, parse_guesser_reply)?;
            if reply.understanding.is_some() {
                understanding = reply.understanding;
            }
            let group: Vec<String> = reply.group.iter().map(|word| normalize_word(word)).collect();

            let violations = grounding_check(&group, ctx.remaining, ctx.group_size, ctx.failed);
            let rejection = if !violations.is_empty() {
                Some(describe(&violations))
            } else if rejections.contains(&group) {
                Some("this exact group was already rejected this turn".to_string())
            } else {
                None
            };
            if let Some(reason) = rejection {
                debug!(round, group = ?group, reason = %reason, "proposal not grounded");
                rejections.push(&group, reason.as_str());
                feedback = Some(reason);
                continue;
            }

            let guess = Guess::new(group, reply.category);
            last_grounded = Some(guess.clone());
            if ctx.remaining.len() == ctx.group_size {
                debug!(round, "last group left, skipping validator");
                return Ok(Negotiated::Agreed(guess));
            }

            let prompt = self.prompts.render_validator(
                ctx.remaining,
                ctx.group_size,
                &guess.words,
                &guess.rationale,
                ctx.failed,
            )?;
            let verdict = self
                .validator
                .ask_parsed(&prompt, metrics, parse_validator_reply)?;
            if verdict.agrees {
                info!(round, group = ?guess.words, category = %guess.rationale, "agreement reached");
                self.accepted
                    .insert(guess.rationale.clone(), guess.words.clone());
                return Ok(Negotiated::Agreed(guess));
            }
            let reason = if verdict.feedback.is_empty() {
                "the validator disagreed".to_string()
            } else {
                verdict.feedback
            };
            debug!(round, group = ?guess.words, reason = %reason, "validator disagreed");
            rejections.push(&guess.words, reason.as_str());
            feedback = Some(reason);
        }

        warn!(max_retries = self.config.max_retries, "negotiation did not converge");
        if let Some(guess) = last_grounded {
            return Ok(Negotiated::Fallback(guess));
        }
        if let Some(guess) = self.snap.propose(ctx, metrics)? {
            return Ok(Negotiated::Fallback(guess));
        }
        Ok(Negotiated::Fallback(deterministic_fallback(ctx)?))
    }

    fn note_stall(&mut self) {
        self.stalled_turns += 1;
        if self.stalled_turns >= self.config.max_stalled_turns && self.phase == Phase::Careful {
            info!(stalled_turns = self.stalled_turns, "switching to snap mode");
            self.phase = Phase::Snap;
        }
    }
}

impl Solver for NegotiationSolver {
    fn guess(&mut self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Guess> {
        if self.phase == Phase::Snap {
            if let Some(guess) = self.snap.propose(ctx, metrics)? {
                return Ok(guess);
            }
            debug!("snap proposal unusable, negotiating instead");
        }
        match self.negotiate(ctx, metrics) {
            Ok(Negotiated::Agreed(guess)) => {
                self.stalled_turns = 0;
                Ok(guess)
            }
            Ok(Negotiated::Fallback(guess)) => {
                self.note_stall();
                Ok(guess)
            }
            Err(err) => {
                if err.downcast_ref::<MalformedReplyError>().is_some() {
                    self.note_stall();
                }
                Err(err)
            }
        }
    }

    fn observe(&mut self, feedback: &TurnFeedback) {
        match feedback {
            TurnFeedback::Hit { .. } => {
                self.consecutive_misses = 0;
                self.stalled_turns = 0;
                if self.phase == Phase::Snap {
                    info!("correct guess, back to careful negotiation");
                }
                self.phase = Phase::Careful;
            }
            TurnFeedback::Miss => {
                self.consecutive_misses += 1;
                if self.consecutive_misses >= self.config.max_careful_misses
                    && self.phase == Phase::Careful
                {
                    info!(misses = self.consecutive_misses, "switching to snap mode");
                    self.phase = Phase::Snap;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.accepted.clear();
        self.phase = Phase::Careful;
        self.consecutive_misses = 0;
        self.stalled_turns = 0;
    }
}
