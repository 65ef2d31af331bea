use serde::{Deserialize, Serialize};

/// Player-visible state of one cell, as broadcast to every seat.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    #[default]
    Hidden,
    /// A mine that somebody stepped on.
    Mine,
    /// Safe cell with the number of adjacent mines.
    Revealed(u8),
}

impl CellState {
    pub const fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }
}
