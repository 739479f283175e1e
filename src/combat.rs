//! Exact-sum attack resolution.
//!
//! An attack value succeeds when some set of live monsters sums to it
//! exactly. Candidates are searched depth-first in ascending `position_x`
//! order, trying to include each candidate before skipping it, and the first
//! set found wins. That makes the result deterministic and biased towards the
//! monsters closest to the heroes.

use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub value: i32,
    pub position_x: f64,
    pub alive: bool,
}

/// Live candidates by ascending position (stable), then dead ones in their
/// original order. Dead candidates are never selected.
pub fn search_order(candidates: &[Candidate]) -> Vec<usize> {
    let mut live: Vec<usize> = (0..candidates.len())
        .filter(|idx| candidates[*idx].alive)
        .collect();
    live.sort_by(|a, b| {
        candidates[*a]
            .position_x
            .total_cmp(&candidates[*b].position_x)
    });
    live.extend((0..candidates.len()).filter(|idx| !candidates[*idx].alive));
    live
}

/// Returns the indices (into `candidates`) of the winning set in search order,
/// or `None` when no set of live candidates sums to `attack`.
pub fn find_combination(attack: i64, candidates: &[Candidate]) -> Option<Vec<usize>> {
    if attack <= 0 {
        return None;
    }
    let live_total: i64 = candidates
        .iter()
        .filter(|c| c.alive && c.value > 0)
        .map(|c| i64::from(c.value))
        .sum();
    if attack > live_total {
        return None;
    }
    let order = search_order(candidates);
    let mut failed = HashSet::new();
    search(candidates, &order, 0, attack, &mut failed)
}

fn search(
    candidates: &[Candidate],
    order: &[usize],
    start: usize,
    remainder: i64,
    failed: &mut HashSet<(usize, i64)>,
) -> Option<Vec<usize>> {
    if failed.contains(&(start, remainder)) {
        return None;
    }
    for pos in start..order.len() {
        let idx = order[pos];
        let candidate = &candidates[idx];
        if !candidate.alive {
            continue;
        }
        let value = i64::from(candidate.value);
        if value <= 0 || value > remainder {
            continue;
        }
        if value == remainder {
            return Some(vec![idx]);
        }
        if let Some(mut rest) = search(candidates, order, pos + 1, remainder - value, failed) {
            rest.insert(0, idx);
            return Some(rest);
        }
    }
    failed.insert((start, remainder));
    None
}

/// Triangular reward for the set size, minus one point per monster this hero
/// had already hit. Never negative.
pub fn attack_score(alive_in_set: usize, already_attacked: usize) -> u32 {
    let alive = alive_in_set as u32;
    let base = alive * (alive + 1) / 2;
    base.saturating_sub(already_attacked as u32)
}
