//! Board selection for a run: archive slices, mixed boards and shuffling.

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use solver::core::puzzle::{Category, normalize_word};
use solver::io::puzzle_source::PuzzleRecord;

use crate::case::Selection;

/// One game to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePlan {
    /// Puzzle label stored with the game record.
    pub label: String,
    pub categories: Vec<Category>,
    /// Presentation order; `None` keeps category order.
    pub board_order: Option<Vec<String>>,
}

/// Expand a selection into the games of run number `run_index`.
pub fn plan_games(
    puzzles: &[PuzzleRecord],
    selection: &Selection,
    run_index: u32,
) -> Result<Vec<GamePlan>> {
    let Some(first) = puzzles.first() else {
        bail!("puzzle archive is empty");
    };
    let seed = selection.seed.wrapping_add(u64::from(run_index));
    let mut rng = StdRng::seed_from_u64(seed);

    let mut plans = if selection.mixed {
        let count = selection.count.unwrap_or(puzzles.len());
        let levels = first.answers.len();
        let pool: Vec<&Category> = puzzles.iter().flat_map(|p| p.answers.iter()).collect();
        (0..count)
            .map(|index| {
                Ok(GamePlan {
                    label: format!("mixed-{seed}-{index}"),
                    categories: sample_disjoint(&pool, levels, &mut rng)?,
                    board_order: None,
                })
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        if selection.start >= puzzles.len() {
            bail!(
                "selection.start {} is past the end of the archive ({} puzzles)",
                selection.start,
                puzzles.len()
            );
        }
        let end = match selection.count {
            Some(count) => (selection.start + count).min(puzzles.len()),
            None => puzzles.len(),
        };
        puzzles[selection.start..end]
            .iter()
            .map(|record| GamePlan {
                label: record.label(),
                categories: record.answers.clone(),
                board_order: None,
            })
            .collect()
    };

    if selection.shuffle {
        for plan in &mut plans {
            let mut order: Vec<String> = plan
                .categories
                .iter()
                .flat_map(|category| category.members.iter().map(|word| normalize_word(word)))
                .collect();
            order.shuffle(&mut rng);
            plan.board_order = Some(order);
        }
    }
    Ok(plans)
}

/// Draw `levels` categories that share no words.
fn sample_disjoint(pool: &[&Category], levels: usize, rng: &mut StdRng) -> Result<Vec<Category>> {
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);
    let mut used = BTreeSet::new();
    let mut chosen = Vec::with_capacity(levels);
    for category in shuffled {
        let members: Vec<String> = category.members.iter().map(|w| normalize_word(w)).collect();
        if members.iter().any(|word| used.contains(word)) {
            continue;
        }
        used.extend(members);
        chosen.push(category.clone());
        if chosen.len() == levels {
            return Ok(chosen);
        }
    }
    bail!("archive has too few word-disjoint categories to build a mixed board of {levels}")
}
