// ==============================================================================
// spawn.rs — SPAWN SLOT ALLOCATION
// ------------------------------------------------------------------------------
// Every session gets a slot on a flat grid so chassis never overlap:
//
//   slot i → column i % COLUMNS, row i / COLUMNS
//   x = (column - (COLUMNS - 1) / 2) * spacing,  z = row * spacing
//
// Released slots are handed out again lowest-first.
// ==============================================================================

use rapier3d::prelude::{Isometry, Real};

const COLUMNS: usize = 4;

/// Center-of-mass height a new chassis is dropped from (m).
pub const SPAWN_HEIGHT: Real = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnSlot {
    pub index: usize,
    pub position: [Real; 3],
}

impl SpawnSlot {
    pub fn isometry(&self) -> Isometry<Real> {
        let [x, y, z] = self.position;
        Isometry::translation(x, y, z)
    }
}

#[derive(Debug)]
pub struct SpawnManager {
    spacing: Real,
    occupied: Vec<bool>,
}

impl SpawnManager {
    pub fn new(spacing: Real) -> Self {
        Self {
            spacing,
            occupied: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> SpawnSlot {
        let index = match self.occupied.iter().position(|taken| !taken) {
            Some(i) => i,
            None => {
                self.occupied.push(false);
                self.occupied.len() - 1
            }
        };
        self.occupied[index] = true;

        SpawnSlot {
            index,
            position: self.slot_position(index),
        }
    }

    pub fn release(&mut self, index: usize) {
        if let Some(taken) = self.occupied.get_mut(index) {
            *taken = false;
        }
    }

    pub fn in_use(&self) -> usize {
        self.occupied.iter().filter(|t| **t).count()
    }

    fn slot_position(&self, index: usize) -> [Real; 3] {
        let column = (index % COLUMNS) as Real;
        let row = (index / COLUMNS) as Real;
        let centre = (COLUMNS - 1) as Real / 2.0;
        [(column - centre) * self.spacing, SPAWN_HEIGHT, row * self.spacing]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_never_share_a_position() {
        let mut spawns = SpawnManager::new(6.0);
        let slots: Vec<SpawnSlot> = (0..9).map(|_| spawns.allocate()).collect();
        for (i, a) in slots.iter().enumerate() {
            for b in &slots[i + 1..] {
                let dx = a.position[0] - b.position[0];
                let dz = a.position[2] - b.position[2];
                assert!((dx * dx + dz * dz).sqrt() >= 6.0 - 1e-4);
            }
        }
        assert_eq!(spawns.in_use(), 9);
    }

    #[test]
    fn released_slot_is_reused_first() {
        let mut spawns = SpawnManager::new(6.0);
        let a = spawns.allocate();
        let b = spawns.allocate();
        spawns.allocate();
        spawns.release(b.index);
        assert_eq!(spawns.allocate().index, b.index);
        spawns.release(a.index);
        assert_eq!(spawns.allocate().position, a.position);
    }

    #[test]
    fn first_row_is_centred_on_the_origin() {
        let mut spawns = SpawnManager::new(4.0);
        let xs: Vec<Real> = (0..COLUMNS).map(|_| spawns.allocate().position[0]).collect();
        let sum: Real = xs.iter().sum();
        assert!(sum.abs() < 1e-4);
    }
}
