//! Puzzle archives on disk.
//!
//! Archives use the community NYT-Connections-Answers JSON layout:
//! `[{"id": 0, "date": "2023-06-12", "answers": [{"level", "group", "members"}]}]`.
//! Files are checked against the bundled JSON Schema, then against the
//! puzzle invariants (unique ids, `total_levels` categories per puzzle,
//! `group_size` distinct members per category).

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::puzzle::{Category, PuzzleState, normalize_word};
use crate::io::config::GameConfig;

const PUZZLES_SCHEMA: &str = include_str!("../../../schemas/puzzles/v1.schema.json");

/// One archived puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    pub id: u32,
    #[serde(default)]
    pub date: Option<String>,
    pub answers: Vec<Category>,
}

impl PuzzleRecord {
    /// Stable label used in records and reports.
    pub fn label(&self) -> String {
        match &self.date {
            Some(date) => format!("{}-{}", self.id, date),
            None => self.id.to_string(),
        }
    }

    /// Build a fresh game from this puzzle.
    pub fn to_state(&self, game: &GameConfig) -> Result<PuzzleState> {
        PuzzleState::new(self.answers.clone(), game.group_size, game.max_strikes)
            .with_context(|| format!("puzzle {}", self.id))
    }
}

/// Load, schema-check and validate a puzzle archive.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_puzzles(path: &Path, game: &GameConfig) -> Result<Vec<PuzzleRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let puzzles = parse_puzzles(&raw, game)
        .with_context(|| format!("load puzzles {}", path.display()))?;
    debug!(count = puzzles.len(), "puzzles loaded");
    Ok(puzzles)
}

/// Parse an archive from JSON text: schema conformance + puzzle invariants.
pub fn parse_puzzles(raw: &str, game: &GameConfig) -> Result<Vec<PuzzleRecord>> {
    let instance: Value = serde_json::from_str(raw).context("parse puzzles json")?;
    let schema = puzzles_schema(game.total_levels)?;
    validate_schema(&instance, &schema)?;
    let puzzles: Vec<PuzzleRecord> =
        serde_json::from_value(instance).context("parse puzzles as v1 records")?;
    let errors = validate_puzzles(&puzzles, game);
    if !errors.is_empty() {
        bail!("puzzle violations:\n- {}", errors.join("\n- "));
    }
    Ok(puzzles)
}

/// Check puzzle invariants.
///
/// Returns a list of stable error messages (empty on success).
pub fn validate_puzzles(puzzles: &[PuzzleRecord], game: &GameConfig) -> Vec<String> {
    let group_size = game.group_size;
    let mut errors = Vec::new();
    let mut ids = BTreeSet::new();
    for puzzle in puzzles {
        if !ids.insert(puzzle.id) {
            errors.push(format!("duplicate puzzle id {}", puzzle.id));
        }
        if puzzle.answers.len() != game.total_levels {
            errors.push(format!(
                "puzzle {}: has {} categories, expected {}",
                puzzle.id,
                puzzle.answers.len(),
                game.total_levels
            ));
        }
        for category in &puzzle.answers {
            if category.members.len() != group_size {
                errors.push(format!(
                    "puzzle {}: category '{}' has {} members, expected {}",
                    puzzle.id,
                    category.name,
                    category.members.len(),
                    group_size
                ));
            }
            let distinct: BTreeSet<String> = category
                .members
                .iter()
                .map(|word| normalize_word(word))
                .collect();
            if distinct.len() != category.members.len() {
                errors.push(format!(
                    "puzzle {}: category '{}' repeats a member",
                    puzzle.id, category.name
                ));
            }
        }
    }
    errors
}

/// Bundled schema with the category count pinned to `total_levels`.
fn puzzles_schema(total_levels: usize) -> Result<Value> {
    let mut schema: Value =
        serde_json::from_str(PUZZLES_SCHEMA).context("parse puzzles schema")?;
    let answers = schema
        .pointer_mut("/items/properties/answers")
        .and_then(Value::as_object_mut)
        .context("puzzles schema has no answers property")?;
    answers.insert("minItems".to_string(), Value::from(total_levels));
    answers.insert("maxItems".to_string(), Value::from(total_levels));
    Ok(schema)
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Built-in board used by `solver play` when no archive is given.
pub fn sample_board() -> Vec<Category> {
    vec![
        Category::new(0, "WET WEATHER", &["HAIL", "RAIN", "SLEET", "SNOW"]),
        Category::new(1, "NBA TEAMS", &["BUCKS", "HEAT", "JAZZ", "NETS"]),
        Category::new(2, "KEYBOARD KEYS", &["OPTION", "RETURN", "SHIFT", "TAB"]),
        Category::new(3, "PALINDROMES", &["KAYAK", "LEVEL", "MOM", "RACECAR"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SAMPLE_ARCHIVE;

    #[test]
    fn parses_archive() {
        let puzzles = parse_puzzles(SAMPLE_ARCHIVE, &GameConfig::default()).expect("parse");
        assert_eq!(puzzles.len(), 2);
        assert_eq!(puzzles[0].answers, sample_board());
        assert_eq!(puzzles[0].label(), "0-2023-06-12");
        assert_eq!(puzzles[1].answers[0].name, "SNAKES");
    }

    #[test]
    fn schema_violation_lists_errors() {
        let raw = r#"[{"id": 1, "answers": [{"level": 0, "members": ["A", "B"]}]}]"#;
        let err = parse_puzzles(raw, &GameConfig::default()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("schema validation failed"), "{message}");
    }

    fn record(id: u32, answers: Vec<Category>) -> PuzzleRecord {
        PuzzleRecord {
            id,
            date: None,
            answers,
        }
    }

    #[test]
    fn invariant_violations_are_reported() {
        let raw = r#"[
            {"id": 1, "answers": [
                {"level": 0, "group": "A", "members": ["X", "Y", "Z"]},
                {"level": 1, "group": "C", "members": ["C1", "C2", "C3", "C4"]},
                {"level": 2, "group": "D", "members": ["D1", "D2", "D3", "D4"]},
                {"level": 3, "group": "E", "members": ["E1", "E2", "E3", "E4"]}
            ]},
            {"id": 1, "answers": [
                {"level": 0, "group": "B", "members": ["Q", "q", "R", "S"]},
                {"level": 1, "group": "F", "members": ["F1", "F2", "F3", "F4"]},
                {"level": 2, "group": "G", "members": ["G1", "G2", "G3", "G4"]},
                {"level": 3, "group": "H", "members": ["H1", "H2", "H3", "H4"]}
            ]}
        ]"#;
        let err = parse_puzzles(raw, &GameConfig::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("puzzle 1: category 'A' has 3 members, expected 4"));
        assert!(message.contains("duplicate puzzle id 1"));
        assert!(message.contains("puzzle 1: category 'B' repeats a member"));
    }

    #[test]
    fn wrong_category_count_is_rejected() {
        let two = record(
            9,
            vec![
                Category::new(0, "A", &["A1", "A2", "A3", "A4"]),
                Category::new(1, "B", &["B1", "B2", "B3", "B4"]),
            ],
        );
        let errors = validate_puzzles(&[two], &GameConfig::default());
        assert_eq!(errors, vec!["puzzle 9: has 2 categories, expected 4"]);

        let raw = r#"[{"id": 9, "answers": [
            {"level": 0, "group": "A", "members": ["A1", "A2", "A3", "A4"]},
            {"level": 1, "group": "B", "members": ["B1", "B2", "B3", "B4"]}
        ]}]"#;
        let err = parse_puzzles(raw, &GameConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn category_count_follows_total_levels() {
        let game = GameConfig {
            total_levels: 2,
            ..GameConfig::default()
        };
        let raw = r#"[{"id": 9, "answers": [
            {"level": 0, "group": "A", "members": ["A1", "A2", "A3", "A4"]},
            {"level": 1, "group": "B", "members": ["B1", "B2", "B3", "B4"]}
        ]}]"#;
        let puzzles = parse_puzzles(raw, &game).expect("two-level archive");
        assert_eq!(puzzles[0].answers.len(), 2);
        assert!(parse_puzzles(SAMPLE_ARCHIVE, &game).is_err());
    }

    #[test]
    fn load_reads_file_and_builds_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("connections.json");
        fs::write(&path, SAMPLE_ARCHIVE).expect("write");
        let puzzles = load_puzzles(&path, &GameConfig::default()).expect("load");
        let state = puzzles[1].to_state(&GameConfig::default()).expect("state");
        assert_eq!(state.full_board().len(), 16);
        assert_eq!(state.max_strikes(), 4);
    }
}
