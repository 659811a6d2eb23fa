//! Single-round proposal with no validator.

use anyhow::Result;
use tracing::{debug, warn};

use super::Role;
use crate::core::grounding::{describe, grounding_check};
use crate::core::metrics::Metrics;
use crate::core::reply::parse_snap_reply;
use crate::core::types::{Guess, GuessContext, MalformedReplyError};
use crate::io::prompt::PromptEngine;

pub struct SnapAgent {
    role: Role,
    prompts: PromptEngine,
}

impl SnapAgent {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            prompts: PromptEngine::new(),
        }
    }

    /// One grounded proposal, or `None` when the reply is unusable.
    ///
    /// Transport failures still propagate.
    pub fn propose(&self, ctx: &GuessContext<'_>, metrics: &mut Metrics) -> Result<Option<Guess>> {
        let prompt = self
            .prompts
            .render_snap(ctx.remaining, ctx.group_size, ctx.failed)?;
        let reply = match self.role.ask_parsed(&prompt, metrics, parse_snap_reply) {
            Ok(reply) => reply,
            Err(err) if err.downcast_ref::<MalformedReplyError>().is_some() => {
                warn!(error = %err, "snap reply unusable");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let violations = grounding_check(&reply.words, ctx.remaining, ctx.group_size, ctx.failed);
        if !violations.is_empty() {
            warn!(group = ?reply.words, reason = %describe(&violations), "snap proposal rejected");
            return Ok(None);
        }
        debug!(group = ?reply.words, "snap proposal accepted");
        Ok(Some(Guess::new(reply.words, reply.reason)))
    }
}
