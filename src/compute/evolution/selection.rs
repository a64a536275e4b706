//! Selection: per-cell fate and capacity culling.

use std::collections::HashMap;

use crate::schema::{Cell, CellId, SelectionConfig};

/// Outcome of selection for one cell in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Fitness strictly below the death threshold.
    Dies,
    /// Fitness between the thresholds (inclusive).
    Survives,
    /// Fitness strictly above the birth threshold; yields one child.
    Reproduces,
}

/// Decide a cell's fate from its fitness.
pub fn judge(fitness: f32, config: &SelectionConfig) -> Fate {
    if fitness < config.death_threshold {
        Fate::Dies
    } else if fitness > config.birth_threshold {
        Fate::Reproduces
    } else {
        Fate::Survives
    }
}

/// Order cells for culling: lowest fitness first, then younger first, then
/// newer (higher id) first.
pub fn cull_order(cells: &mut [Cell]) {
    cells.sort_by(|a, b| {
        a.fitness
            .total_cmp(&b.fitness)
            .then(a.age.cmp(&b.age))
            .then(b.id.cmp(&a.id))
    });
}

/// Remove cells until at most `max` remain.
///
/// Survivors keep their original relative order. Returns the culled cells in
/// cull order, with `alive` cleared.
pub fn cull_excess(cells: &mut Vec<Cell>, max: usize) -> Vec<Cell> {
    if cells.len() <= max {
        return Vec::new();
    }

    let excess = cells.len() - max;
    let mut ranked: Vec<Cell> = std::mem::take(cells);
    let position: HashMap<CellId, usize> =
        ranked.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    cull_order(&mut ranked);

    let mut survivors = ranked.split_off(excess);
    let mut culled = ranked;
    for cell in &mut culled {
        cell.alive = false;
    }

    survivors.sort_by_key(|c| position.get(&c.id).copied());
    *cells = survivors;
    culled
}
