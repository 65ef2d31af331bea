use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Out of bounds or not hidden; nothing changed.
    AlreadyRevealed,
    Mine,
    Safe,
    /// Every safe cell is now revealed.
    Cleared,
}

impl RevealOutcome {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Mine | Self::Cleared)
    }
}

/// Owned copy of the visible grid, `rows[y][x]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub width: Coord,
    pub height: Coord,
    pub mines: CellCount,
    pub rows: Vec<Vec<CellState>>,
}

impl BoardSnapshot {
    pub fn cell(&self, (x, y): Coord2) -> Option<CellState> {
        self.rows.get(usize::from(y))?.get(usize::from(x)).copied()
    }
}

/// Visible grid plus the mines behind it.
#[derive(Clone, Debug, PartialEq)]
pub struct Board {
    mine_layout: MineLayout,
    cells: Array2<CellState>,
    hidden: CellCount,
}

impl Board {
    pub fn new(mine_layout: MineLayout) -> Self {
        let size = mine_layout.size();
        Self {
            cells: blank_grid(size),
            hidden: mine_layout.total_cells(),
            mine_layout,
        }
    }

    pub fn size(&self) -> Coord2 {
        self.mine_layout.size()
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_layout.mine_count()
    }

    pub fn hidden_count(&self) -> CellCount {
        self.hidden
    }

    pub fn is_cleared(&self) -> bool {
        self.hidden == self.mine_layout.mine_count()
    }

    pub fn cell_at(&self, coords: Coord2) -> Option<CellState> {
        self.cells.get(coords.to_nd_index()).copied()
    }

    pub fn has_mine_at(&self, coords: Coord2) -> bool {
        self.mine_layout.contains_mine(coords)
    }

    pub fn reveal(&mut self, coords: Coord2) -> RevealOutcome {
        if self.cell_at(coords) != Some(CellState::Hidden) {
            return RevealOutcome::AlreadyRevealed;
        }

        if self.mine_layout[coords] {
            self.set(coords, CellState::Mine);
            return RevealOutcome::Mine;
        }

        // Cells are revealed as they are queued, so none is queued twice and the
        // queue only ever holds neighbors of zero cells, which are never mines.
        let mut to_visit = vec![coords];
        self.reveal_safe(coords);

        while let Some(visit) = to_visit.pop() {
            if self.cells[visit.to_nd_index()] != CellState::Revealed(0) {
                continue;
            }
            for pos in neighbors(visit, self.size()) {
                if self.cells[pos.to_nd_index()].is_hidden() {
                    self.reveal_safe(pos);
                    to_visit.push(pos);
                }
            }
        }

        if self.is_cleared() {
            RevealOutcome::Cleared
        } else {
            RevealOutcome::Safe
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let (width, height) = self.size();
        let rows = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| self.cells[(x, y).to_nd_index()])
                    .collect()
            })
            .collect();
        BoardSnapshot {
            width,
            height,
            mines: self.mine_count(),
            rows,
        }
    }

    fn reveal_safe(&mut self, coords: Coord2) {
        let count = self.mine_layout.adjacent_mine_count(coords);
        self.set(coords, CellState::Revealed(count));
    }

    fn set(&mut self, coords: Coord2, state: CellState) {
        let cell = &mut self.cells[coords.to_nd_index()];
        if cell.is_hidden() && !state.is_hidden() {
            self.hidden -= 1;
        }
        *cell = state;
    }
}

/// A `size` grid with every cell hidden.
pub fn blank_grid(size: Coord2) -> Array2<CellState> {
    Array2::default(size.to_nd_index())
}
