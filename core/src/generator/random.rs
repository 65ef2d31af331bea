use rand::prelude::*;
use rand::rngs::SmallRng;

use super::*;

/// Uniform placement by rejection sampling: draw any cell, keep it if it is not a mine yet.
///
/// Terminates because [`GameConfig`] always leaves at least one safe cell.
#[derive(Debug)]
pub struct RandomMinefieldGenerator<'a> {
    rng: &'a mut SmallRng,
}

impl<'a> RandomMinefieldGenerator<'a> {
    pub fn new(rng: &'a mut SmallRng) -> Self {
        Self { rng }
    }
}

impl MinefieldGenerator for RandomMinefieldGenerator<'_> {
    fn generate(self, config: GameConfig) -> MineLayout {
        let (width, height) = config.size();
        let mut layout = MineLayout::empty(config.size());
        let mut draws = 0usize;

        while layout.mine_count() < config.mines() {
            let coords = (
                self.rng.random_range(0..width),
                self.rng.random_range(0..height),
            );
            layout.insert(coords);
            draws += 1;
        }

        log::trace!(
            "Placed {} mines on {}x{} in {} draws",
            layout.mine_count(),
            width,
            height,
            draws
        );
        layout
    }
}
