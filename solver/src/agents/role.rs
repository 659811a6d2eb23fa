//! A named model role: responder, system prompt and reply bookkeeping.

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::metrics::Metrics;
use crate::core::reply::ReplyParseError;
use crate::core::types::MalformedReplyError;
use crate::io::responder::Responder;

pub struct Role {
    name: &'static str,
    responder: Box<dyn Responder>,
    system_prompt: &'static str,
}

impl Role {
    pub fn new(name: &'static str, responder: Box<dyn Responder>, system_prompt: &'static str) -> Self {
        Self {
            name,
            responder,
            system_prompt,
        }
    }

    /// Send one prompt and return the raw reply text.
    ///
    /// Token usage is charged to the replying model.
    #[instrument(skip_all, fields(role = self.name))]
    pub fn ask(&self, prompt: &str, metrics: &mut Metrics) -> Result<String> {
        let reply = self
            .responder
            .respond(prompt, Some(self.system_prompt))
            .with_context(|| format!("{} request failed", self.name))?;
        if let Some(usage) = reply.usage {
            metrics.record_tokens(&reply.model, usage);
        }
        debug!(model = %reply.model, chars = reply.content.len(), "reply received");
        Ok(reply.content)
    }

    /// Ask and parse, retrying the same prompt once on a parse failure.
    ///
    /// A second failure becomes a [`MalformedReplyError`].
    pub fn ask_parsed<T>(
        &self,
        prompt: &str,
        metrics: &mut Metrics,
        parse: impl Fn(&str) -> Result<T, ReplyParseError>,
    ) -> Result<T> {
        let first = self.ask(prompt, metrics)?;
        match parse(&first) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => warn!(role = self.name, error = %err, "unparseable reply, retrying"),
        }
        let second = self.ask(prompt, metrics)?;
        parse(&second).map_err(|err| {
            MalformedReplyError {
                role: self.name.to_string(),
                reason: err.to_string(),
            }
            .into()
        })
    }
}
