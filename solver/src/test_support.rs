//! Test-only helpers: sample puzzles, scripted responders and fixed solvers.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::agents::{ResponderFactory, Solver};
use crate::core::metrics::{Metrics, TokenUsage};
use crate::core::puzzle::{Category, PuzzleState};
use crate::core::types::{Guess, GuessContext};
use crate::io::puzzle_source::sample_board;
use crate::io::responder::{Reply, Responder};

/// Two puzzles in archive format; the first is the built-in sample board.
pub const SAMPLE_ARCHIVE: &str = r#"[
  {
    "id": 0,
    "date": "2023-06-12",
    "answers": [
      {"level": 0, "group": "WET WEATHER", "members": ["HAIL", "RAIN", "SLEET", "SNOW"]},
      {"level": 1, "group": "NBA TEAMS", "members": ["BUCKS", "HEAT", "JAZZ", "NETS"]},
      {"level": 2, "group": "KEYBOARD KEYS", "members": ["OPTION", "RETURN", "SHIFT", "TAB"]},
      {"level": 3, "group": "PALINDROMES", "members": ["KAYAK", "LEVEL", "MOM", "RACECAR"]}
    ]
  },
  {
    "id": 1,
    "date": "2023-06-13",
    "answers": [
      {"level": 0, "group": "SNAKES", "members": ["BOA", "MAMBA", "PYTHON", "VIPER"]},
      {"level": 1, "group": "FOOTWEAR", "members": ["BOOT", "CLOG", "LOAFER", "SANDAL"]},
      {"level": 2, "group": "UNITS OF LENGTH", "members": ["FOOT", "INCH", "MILE", "YARD"]},
      {"level": 3, "group": "FAMOUS JOHNS", "members": ["ADAMS", "CANDY", "LENNON", "WAYNE"]}
    ]
  }
]"#;

pub fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

pub fn sample_categories() -> Vec<Category> {
    sample_board()
}

/// Fresh game on the sample board with four-word groups.
pub fn sample_state(max_strikes: u32) -> PuzzleState {
    PuzzleState::new(sample_categories(), 4, max_strikes).expect("sample board is valid")
}

/// Usage attached to every scripted reply.
pub const SCRIPTED_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 10,
    completion_tokens: 5,
};

#[derive(Default)]
struct Script {
    replies: VecDeque<String>,
    prompts: Vec<String>,
    system_prompts: Vec<Option<String>>,
}

/// Responder that replays a fixed list of replies and records every prompt.
///
/// Clones share the same script, so a test can keep a handle after boxing one.
#[derive(Clone)]
pub struct ScriptedResponder {
    model: String,
    script: Rc<RefCell<Script>>,
}

impl ScriptedResponder {
    pub fn new(model: &str, replies: &[&str]) -> Self {
        Self {
            model: model.to_string(),
            script: Rc::new(RefCell::new(Script {
                replies: replies.iter().map(|reply| reply.to_string()).collect(),
                ..Script::default()
            })),
        }
    }

    pub fn push(&self, reply: &str) {
        self.script.borrow_mut().replies.push_back(reply.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script.borrow().prompts.clone()
    }

    pub fn system_prompts(&self) -> Vec<Option<String>> {
        self.script.borrow().system_prompts.clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.borrow().replies.len()
    }
}

impl Responder for ScriptedResponder {
    fn respond(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Reply> {
        let mut script = self.script.borrow_mut();
        script.prompts.push(prompt.to_string());
        script.system_prompts.push(system_prompt.map(str::to_string));
        let content = script
            .replies
            .pop_front()
            .ok_or_else(|| anyhow!("scripted responder has no replies left"))?;
        Ok(Reply {
            content,
            model: self.model.clone(),
            usage: Some(SCRIPTED_USAGE),
        })
    }
}

/// Responder that computes each reply from the prompt.
#[derive(Clone)]
pub struct ClosureResponder {
    model: String,
    reply: Rc<dyn Fn(&str) -> String>,
    calls: Rc<RefCell<usize>>,
}

impl ClosureResponder {
    pub fn new(model: &str, reply: impl Fn(&str) -> String + 'static) -> Self {
        Self {
            model: model.to_string(),
            reply: Rc::new(reply),
            calls: Rc::new(RefCell::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Responder for ClosureResponder {
    fn respond(&self, prompt: &str, _system_prompt: Option<&str>) -> Result<Reply> {
        *self.calls.borrow_mut() += 1;
        Ok(Reply {
            content: (self.reply)(prompt),
            model: self.model.clone(),
            usage: Some(SCRIPTED_USAGE),
        })
    }
}

/// Factory handing out one shared scripted responder per role.
#[derive(Default)]
pub struct ScriptedResponders {
    roles: RefCell<BTreeMap<String, ScriptedResponder>>,
    requested: RefCell<Vec<String>>,
}

impl ScriptedResponders {
    /// Script the replies of `role`.
    pub fn with(self, role: &str, replies: &[&str]) -> Self {
        self.roles
            .borrow_mut()
            .insert(role.to_string(), ScriptedResponder::new("scripted", replies));
        self
    }

    /// Handle on the responder serving `role` (created empty when unscripted).
    pub fn role(&self, role: &str) -> ScriptedResponder {
        self.roles
            .borrow_mut()
            .entry(role.to_string())
            .or_insert_with(|| ScriptedResponder::new("scripted", &[]))
            .clone()
    }

    pub fn requested_roles(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl ResponderFactory for ScriptedResponders {
    fn responder(&self, role: &str) -> Result<Box<dyn Responder>> {
        self.requested.borrow_mut().push(role.to_string());
        Ok(Box::new(self.role(role)))
    }
}

/// Solver that knows the answer: proposes the first category still on the board.
pub struct OracleSolver {
    categories: Vec<Category>,
}

impl OracleSolver {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }
}

impl Solver for OracleSolver {
    fn guess(&mut self, ctx: &GuessContext<'_>, _metrics: &mut Metrics) -> Result<Guess> {
        self.categories
            .iter()
            .find(|category| {
                category
                    .members
                    .iter()
                    .all(|member| ctx.remaining.contains(member))
            })
            .map(|category| Guess::new(category.members.clone(), category.name.clone()))
            .ok_or_else(|| anyhow!("no category left on the board"))
    }
}

/// Solver that always proposes the same group.
pub struct FixedSolver {
    guess: Guess,
    pub calls: usize,
}

impl FixedSolver {
    pub fn new(words: &[&str], rationale: &str) -> Self {
        Self {
            guess: Guess::new(self::words(words), rationale),
            calls: 0,
        }
    }
}

impl Solver for FixedSolver {
    fn guess(&mut self, _ctx: &GuessContext<'_>, _metrics: &mut Metrics) -> Result<Guess> {
        self.calls += 1;
        Ok(self.guess.clone())
    }
}

/// Temporary directory holding a puzzle archive file.
pub struct TempArchive {
    dir: TempDir,
}

impl TempArchive {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("puzzles.json"), contents)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("puzzles.json")
    }

    /// Path for other files that should live and die with the archive.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
