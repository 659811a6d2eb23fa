//! Prompt rendering for every solver role.
//!
//! Templates live next to this file under `prompts/` and are compiled into the
//! binary. Each role also has a fixed system prompt.

use std::collections::BTreeMap;

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::ledger::{FailureLedger, RejectionBuffer};

const GUESSER_TEMPLATE: &str = include_str!("prompts/guesser.md");
const VALIDATOR_TEMPLATE: &str = include_str!("prompts/validator.md");
const SNAP_TEMPLATE: &str = include_str!("prompts/snap.md");
const SPEAKER_TEMPLATE: &str = include_str!("prompts/speaker.md");
const LITERAL_LISTENER_TEMPLATE: &str = include_str!("prompts/literal_listener.md");
const PRAGMATIC_LISTENER_TEMPLATE: &str = include_str!("prompts/pragmatic_listener.md");
const DIRECT_TEMPLATE: &str = include_str!("prompts/direct.md");

pub const GUESSER_SYSTEM: &str = include_str!("prompts/guesser_system.md");
pub const VALIDATOR_SYSTEM: &str = include_str!("prompts/validator_system.md");
pub const SNAP_SYSTEM: &str = include_str!("prompts/snap_system.md");
pub const SPEAKER_SYSTEM: &str = include_str!("prompts/speaker_system.md");
pub const LITERAL_LISTENER_SYSTEM: &str = include_str!("prompts/literal_listener_system.md");
pub const PRAGMATIC_LISTENER_SYSTEM: &str = include_str!("prompts/pragmatic_listener_system.md");
pub const DIRECT_SYSTEM: &str = include_str!("prompts/direct_system.md");

/// Inputs for one guesser round.
#[derive(Debug, Clone, Copy)]
pub struct GuesserPrompt<'a> {
    pub remaining: &'a [String],
    pub group_size: usize,
    pub failed: &'a FailureLedger,
    pub rejections: &'a RejectionBuffer,
    pub feedback: Option<&'a str>,
    pub understanding: Option<&'a str>,
    /// Category label to group, for every agreement reached earlier this game.
    pub accepted: &'a BTreeMap<String, Vec<String>>,
}

/// A past wrong guess with the rationale given for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub words: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Serialize)]
struct LabeledGroup<'a> {
    category: &'a str,
    words: &'a [String],
}

#[derive(Debug, Serialize)]
struct RejectedGroup<'a> {
    words: &'a [String],
    reason: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("guesser", GUESSER_TEMPLATE)
            .expect("guesser template should be valid");
        env.add_template("validator", VALIDATOR_TEMPLATE)
            .expect("validator template should be valid");
        env.add_template("snap", SNAP_TEMPLATE)
            .expect("snap template should be valid");
        env.add_template("speaker", SPEAKER_TEMPLATE)
            .expect("speaker template should be valid");
        env.add_template("literal_listener", LITERAL_LISTENER_TEMPLATE)
            .expect("literal listener template should be valid");
        env.add_template("pragmatic_listener", PRAGMATIC_LISTENER_TEMPLATE)
            .expect("pragmatic listener template should be valid");
        env.add_template("direct", DIRECT_TEMPLATE)
            .expect("direct template should be valid");
        Self { env }
    }

    pub fn render_guesser(&self, input: &GuesserPrompt<'_>) -> Result<String> {
        let accepted: Vec<LabeledGroup<'_>> = input
            .accepted
            .iter()
            .map(|(category, words)| LabeledGroup {
                category: category.as_str(),
                words: words.as_slice(),
            })
            .collect();
        let rejections: Vec<RejectedGroup<'_>> = input
            .rejections
            .iter()
            .map(|entry| RejectedGroup {
                words: entry.group.as_slice(),
                reason: entry.reason.as_str(),
            })
            .collect();
        let template = self.env.get_template("guesser")?;
        let rendered = template.render(context! {
            remaining => input.remaining,
            group_size => input.group_size,
            failed => input.failed.groups(),
            rejections => rejections,
            accepted => accepted,
            feedback => input.feedback.map(str::trim).filter(|s| !s.is_empty()),
            understanding => input.understanding.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered)
    }

    pub fn render_validator(
        &self,
        remaining: &[String],
        group_size: usize,
        group: &[String],
        category: &str,
        failed: &FailureLedger,
    ) -> Result<String> {
        let template = self.env.get_template("validator")?;
        let rendered = template.render(context! {
            remaining => remaining,
            group_size => group_size,
            group => group,
            category => category.trim(),
            failed => failed.groups(),
        })?;
        Ok(rendered)
    }

    pub fn render_snap(
        &self,
        remaining: &[String],
        group_size: usize,
        failed: &FailureLedger,
    ) -> Result<String> {
        let template = self.env.get_template("snap")?;
        let rendered = template.render(context! {
            remaining => remaining,
            group_size => group_size,
            failed => failed.groups(),
        })?;
        Ok(rendered)
    }

    pub fn render_speaker(
        &self,
        candidate: &[String],
        board: &[String],
        samples: usize,
    ) -> Result<String> {
        let template = self.env.get_template("speaker")?;
        let rendered = template.render(context! {
            candidate => candidate,
            board => board,
            samples => samples,
        })?;
        Ok(rendered)
    }

    pub fn render_literal_listener(&self, description: &str, board: &[String]) -> Result<String> {
        let template = self.env.get_template("literal_listener")?;
        let rendered = template.render(context! {
            description => description.trim(),
            board => board,
        })?;
        Ok(rendered)
    }

    pub fn render_pragmatic_listener(
        &self,
        description: &str,
        board: &[String],
        group_size: usize,
    ) -> Result<String> {
        let template = self.env.get_template("pragmatic_listener")?;
        let rendered = template.render(context! {
            description => description.trim(),
            board => board,
            group_size => group_size,
        })?;
        Ok(rendered)
    }

    pub fn render_direct(
        &self,
        remaining: &[String],
        group_size: usize,
        failed: &FailureLedger,
        history: &[Attempt],
        chain_of_thought: bool,
    ) -> Result<String> {
        let template = self.env.get_template("direct")?;
        let rendered = template.render(context! {
            remaining => remaining,
            group_size => group_size,
            failed => failed.groups(),
            history => history,
            chain_of_thought => chain_of_thought,
        })?;
        Ok(rendered)
    }
}
