//! Speaker/listener reranking over candidate groups.
//!
//! For each candidate group a speaker proposes category descriptions, a
//! literal listener picks the best of them, and a pragmatic listener tries to
//! recover the group from that description alone. The candidate whose group is
//! recovered most faithfully wins.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use anyhow::Result;
use tracing::{debug, instrument, warn};

use super::{Role, Solver, deterministic_fallback};
use crate::core::combinations::combinations;
use crate::core::metrics::Metrics;
use crate::core::puzzle::normalize_word;
use crate::core::reply::{parse_descriptions, parse_word_list};
use crate::core::types::{Guess, GuessContext};
use crate::io::config::RsaConfig;
use crate::io::prompt::PromptEngine;

/// Scored candidate; ordering is `(cost, enumeration order)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Scored {
    cost: usize,
    order: usize,
    words: Vec<String>,
    description: String,
}

pub struct RsaSolver {
    speaker: Role,
    literal: Role,
    pragmatic: Role,
    prompts: PromptEngine,
    config: RsaConfig,
}

impl RsaSolver {
    pub fn new(speaker: Role, literal: Role, pragmatic: Role, config: RsaConfig) -> Self {
        Self {
            speaker,
            literal,
            pragmatic,
            prompts: PromptEngine::new(),
            config,
        }
    }

    /// Cost of one candidate and the description chosen for it.
    fn evaluate(
        &self,
        candidate: &[String],
        ctx: &GuessContext<'_>,
        metrics: &mut Metrics,
    ) -> Result<(usize, String)> {
        let worst = 2 * ctx.group_size;
        let prompt =
            self.prompts
                .render_speaker(candidate, ctx.remaining, self.config.speaker_samples)?;
        let reply = self.speaker.ask(&prompt, metrics)?;
        let descriptions = match parse_descriptions(&reply, self.config.speaker_samples.max(1)) {
            Ok(descriptions) => descriptions,
            Err(err) => {
                warn!(error = %err, "speaker reply unusable");
                return Ok((worst, String::new()));
            }
        };

        let mut best: Option<(usize, &String)> = None;
        for description in &descriptions {
            let prompt = self
                .prompts
                .render_literal_listener(description, ctx.remaining)?;
            let reply = self.literal.ask(&prompt, metrics)?;
            let score = parse_word_list(&reply)
                .map(|answer| overlap(candidate, &answer))
                .unwrap_or(0);
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, description));
            }
        }
        let Some((_, description)) = best else {
            return Ok((worst, String::new()));
        };

        let prompt =
            self.prompts
                .render_pragmatic_listener(description, ctx.remaining, ctx.group_size)?;
        let reply = self.pragmatic.ask(&prompt, metrics)?;
        let cost = match parse_word_list(&reply) {
            Ok(interpretation) => symmetric_difference(candidate, &interpretation),
            Err(err) => {
                warn!(error = %err, "pragmatic listener reply unusable");
                worst
            }
        };
        Ok((cost, description.clone()))
    }
}

impl Solver for RsaSolver {
    #[instrument(skip_all, fields(remaining = ctx.remaining.len()))]
    fn guess(&mut self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Guess> {
        let limit = self.config.max_candidates.unwrap_or(usize::MAX);
        let candidates = combinations(ctx.remaining, ctx.group_size)
            .filter(|candidate| !ctx.failed.contains(candidate))
            .take(limit);

        let mut queue = BinaryHeap::new();
        for (order, words) in candidates.enumerate() {
            let (cost, description) = self.evaluate(&words, ctx, metrics)?;
            debug!(order, cost, description = %description, "candidate scored");
            queue.push(Reverse(Scored {
                cost,
                order,
                words,
                description,
            }));
            if cost == 0 {
                break;
            }
        }

        match queue.pop() {
            Some(Reverse(best)) => {
                debug!(cost = best.cost, evaluated = queue.len() + 1, "candidate chosen");
                Ok(Guess::new(best.words, best.description))
            }
            None => deterministic_fallback(ctx),
        }
    }
}

/// Number of candidate words the answer also names.
fn overlap(candidate: &[String], answer: &[String]) -> usize {
    let answer: BTreeSet<String> = answer.iter().map(|word| normalize_word(word)).collect();
    candidate
        .iter()
        .map(|word| normalize_word(word))
        .collect::<BTreeSet<_>>()
        .intersection(&answer)
        .count()
}

fn symmetric_difference(candidate: &[String], interpretation: &[String]) -> usize {
    let left: BTreeSet<String> = candidate.iter().map(|word| normalize_word(word)).collect();
    let right: BTreeSet<String> = interpretation
        .iter()
        .map(|word| normalize_word(word))
        .collect();
    left.symmetric_difference(&right).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::FailureLedger;
    use crate::test_support::{ScriptedResponder, words};

    struct Fixture {
        solver: RsaSolver,
        speaker: ScriptedResponder,
        literal: ScriptedResponder,
        pragmatic: ScriptedResponder,
    }

    fn fixture(
        speaker: &[&str],
        literal: &[&str],
        pragmatic: &[&str],
        config: RsaConfig,
    ) -> Fixture {
        let speaker = ScriptedResponder::new("mini", speaker);
        let literal = ScriptedResponder::new("mini", literal);
        let pragmatic = ScriptedResponder::new("mini", pragmatic);
        let solver = RsaSolver::new(
            Role::new("speaker", Box::new(speaker.clone()), "system"),
            Role::new("literal_listener", Box::new(literal.clone()), "system"),
            Role::new("pragmatic_listener", Box::new(pragmatic.clone()), "system"),
            config,
        );
        Fixture {
            solver,
            speaker,
            literal,
            pragmatic,
        }
    }

    #[test]
    fn cost_counts_symmetric_difference() {
        let candidate = words(&["A", "B", "C", "D"]);
        assert_eq!(symmetric_difference(&candidate, &words(&["d", "c", "b", "a"])), 0);
        assert_eq!(symmetric_difference(&candidate, &words(&["A", "B", "C", "E"])), 2);
        assert_eq!(symmetric_difference(&candidate, &[]), 4);
        assert_eq!(overlap(&candidate, &words(&["A", "X", "D"])), 2);
    }

    #[test]
    fn picks_lowest_cost_candidate() {
        let mut fx = fixture(
            &["vowels and friends", "first letters"],
            &["A, B", "A, B, C, E"],
            &["A, B, C, E", "A, B, C, E"],
            RsaConfig {
                speaker_samples: 1,
                max_candidates: Some(2),
            },
        );
        let remaining = words(&["A", "B", "C", "D", "E"]);
        let failed = FailureLedger::default();
        let ctx = GuessContext {
            remaining: &remaining,
            board: &remaining,
            group_size: 4,
            failed: &failed,
        };
        let guess = fx.solver.guess(&ctx, &mut Metrics::new(4)).expect("guess");
        assert_eq!(guess.words, words(&["A", "B", "C", "E"]));
        assert_eq!(guess.rationale, "first letters");
        assert_eq!(fx.pragmatic.prompts().len(), 2);
    }

    #[test]
    fn literal_listener_reranks_descriptions() {
        let mut fx = fixture(
            &["too broad\nexactly right"],
            &["A", "A, B, C, D"],
            &["A, B, C, D"],
            RsaConfig {
                speaker_samples: 2,
                max_candidates: None,
            },
        );
        let remaining = words(&["A", "B", "C", "D", "E"]);
        let failed = FailureLedger::default();
        let ctx = GuessContext {
            remaining: &remaining,
            board: &remaining,
            group_size: 4,
            failed: &failed,
        };
        let guess = fx.solver.guess(&ctx, &mut Metrics::new(4)).expect("guess");
        assert_eq!(guess.rationale, "exactly right");
        // A perfect first candidate stops the search.
        assert_eq!(fx.speaker.prompts().len(), 1);
        assert!(fx.pragmatic.prompts()[0].contains("exactly right"));
    }

    #[test]
    fn skips_failed_groups_and_tolerates_bad_replies() {
        let mut fx = fixture(
            &["", "second"],
            &["A, B, D, E"],
            &["A, B, D, E"],
            RsaConfig {
                speaker_samples: 1,
                max_candidates: None,
            },
        );
        let remaining = words(&["A", "B", "C", "D", "E"]);
        let mut failed = FailureLedger::default();
        failed.insert(&words(&["A", "B", "C", "D"]));
        let ctx = GuessContext {
            remaining: &remaining,
            board: &remaining,
            group_size: 4,
            failed: &failed,
        };
        // Candidate ABCE gets an empty speaker reply (worst cost); ABDE is perfect.
        let guess = fx.solver.guess(&ctx, &mut Metrics::new(4)).expect("guess");
        assert_eq!(guess.words, words(&["A", "B", "D", "E"]));
        assert!(fx.speaker.prompts()[0].contains("Target words: A, B, C, E"));
        assert_eq!(fx.literal.prompts().len(), 1);
    }
}
