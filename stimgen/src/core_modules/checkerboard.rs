// THEORY:
// The checkerboard factory samples a square board of reflectance values in
// which no check shares a value with the check directly above it or directly
// to its left. The board is filled row by row; each check draws uniformly
// from the distinct values that remain once its top and left neighbours are
// excluded. With three or more values at least one candidate always remains.
// With exactly two values the first check fixes the whole board into a
// regular alternating pattern, whose top and left neighbours always agree,
// so one candidate remains as well.
//
// Randomness is always injected: `build_with_rng` takes the generator,
// `build` seeds a ChaCha8 generator from `seed` (or from OS entropy when no
// seed is given), so a seeded board is reproducible across runs.

use crate::core_modules::adjustment::Resolved;
use crate::core_modules::regions::{Image, Mask};
use crate::core_modules::resolution::{Pair, length_from_visual_angle_ppd_1d, resolve};
use crate::core_modules::stimulus::Stimulus;
use crate::error::{Result, StimulusError};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Parameters of a sampled checkerboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerboardFactory {
    /// Checks per side.
    pub n_checks: usize,
    /// Side of one check in degrees.
    pub check_visual_size: f64,
    pub ppd: f64,
    /// Candidate reflectances.
    pub values: Vec<f64>,
    pub seed: Option<u64>,
}

/// What a built checkerboard stimulus carries besides its arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckerboardParams {
    pub n_checks: usize,
    /// Side of one check in pixels.
    pub check_pixels: usize,
    /// The sampled value of every check, row-major.
    pub board: Array2<f64>,
}

fn distinct_values(values: &[f64]) -> Result<Vec<f64>> {
    let mut distinct: Vec<f64> = Vec::with_capacity(values.len());
    for &value in values {
        if !value.is_finite() {
            return Err(StimulusError::invalid(
                "values",
                format!("{value} is not a finite number"),
            ));
        }
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    Ok(distinct)
}

/// Samples an `n_checks x n_checks` board with no equal top or left neighbours.
pub fn sample_board<R: Rng + ?Sized>(
    n_checks: usize,
    values: &[f64],
    rng: &mut R,
) -> Result<Array2<f64>> {
    let values = distinct_values(values)?;
    if n_checks == 0 {
        return Err(StimulusError::invalid("n_checks", "must be at least 1"));
    }
    let required = if n_checks > 1 { 2 } else { 1 };
    if values.len() < required {
        return Err(StimulusError::invalid(
            "values",
            format!(
                "{} distinct values cannot fill a {n_checks}x{n_checks} board without equal neighbours",
                values.len()
            ),
        ));
    }

    let mut board = Array2::<f64>::zeros((n_checks, n_checks));
    let mut candidates = Vec::with_capacity(values.len());
    for row in 0..n_checks {
        for col in 0..n_checks {
            let above = (row > 0).then(|| board[[row - 1, col]]);
            let left = (col > 0).then(|| board[[row, col - 1]]);
            candidates.clear();
            candidates.extend(
                values
                    .iter()
                    .copied()
                    .filter(|&value| Some(value) != above && Some(value) != left),
            );
            if candidates.is_empty() {
                return Err(StimulusError::Geometry(format!(
                    "no value left for check ({row}, {col})"
                )));
            }
            board[[row, col]] = candidates[rng.random_range(0..candidates.len())];
        }
    }
    Ok(board)
}

/// True when no check equals the check above it or to its left.
pub fn satisfies_adjacency(board: &Array2<f64>) -> bool {
    let (rows, cols) = board.dim();
    (0..rows).all(|row| {
        (0..cols).all(|col| {
            let above_differs = row == 0 || board[[row - 1, col]] != board[[row, col]];
            let left_differs = col == 0 || board[[row, col - 1]] != board[[row, col]];
            above_differs && left_differs
        })
    })
}

impl CheckerboardFactory {
    /// Side of one check in whole pixels.
    pub fn check_pixels(&self) -> Result<Resolved<usize>> {
        length_from_visual_angle_ppd_1d(self.check_visual_size, self.ppd)
    }

    pub fn build(&self) -> Result<Stimulus<CheckerboardParams>> {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        self.build_with_rng(&mut rng)
    }

    pub fn build_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Stimulus<CheckerboardParams>> {
        let mut adjustments = Vec::new();
        let check_pixels = self.check_pixels()?.collect_into(&mut adjustments);
        let side = check_pixels * self.n_checks;
        let resolution = resolve(side, Pair::Unspecified, self.ppd)?.collect_into(&mut adjustments);

        let board = sample_board(self.n_checks, &self.values, rng)?;
        let img: Image = Array2::from_shape_fn(resolution.shape, |(i, j)| {
            board[[i / check_pixels, j / check_pixels]]
        });
        let n_checks = self.n_checks;
        let mask: Mask = Array2::from_shape_fn(resolution.shape, |(i, j)| {
            ((i / check_pixels) * n_checks + j / check_pixels + 1) as u32
        });
        tracing::debug!(n_checks, check_pixels, "checkerboard sampled");

        let params = CheckerboardParams {
            n_checks,
            check_pixels,
            board,
        };
        Ok(Stimulus::new(img, mask, resolution, params)?.with_adjustments(adjustments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(seed: u64) -> CheckerboardFactory {
        CheckerboardFactory {
            n_checks: 8,
            check_visual_size: 0.5,
            ppd: 10.0,
            values: vec![0.1, 0.3, 0.5, 0.7, 0.9],
            seed: Some(seed),
        }
    }

    #[test]
    fn sampled_boards_have_no_equal_neighbours() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for n_checks in 1..12 {
            let board = sample_board(n_checks, &[0.0, 0.5, 1.0], &mut rng).unwrap();
            assert!(satisfies_adjacency(&board), "{board:?}");
        }
    }

    #[test]
    fn two_values_give_a_regular_board() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let board = sample_board(6, &[0.0, 1.0], &mut rng).unwrap();
        assert!(satisfies_adjacency(&board));
        for ((row, col), &value) in board.indexed_iter() {
            let expected = if (row + col) % 2 == 0 { board[[0, 0]] } else { 1.0 - board[[0, 0]] };
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn single_value_cannot_fill_a_board() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(sample_board(2, &[0.5, 0.5], &mut rng).is_err());
        assert!(sample_board(1, &[0.5], &mut rng).is_ok());
    }

    #[test]
    fn adjacency_check_spots_violations() {
        let board = ndarray::array![[0.0, 1.0], [0.0, 1.0]];
        assert!(!satisfies_adjacency(&board));
    }

    #[test]
    fn same_seed_same_board() {
        let first = factory(42).build().unwrap();
        let second = factory(42).build().unwrap();
        assert_eq!(first.params.board, second.params.board);
    }

    #[test]
    fn built_stimulus_expands_checks_to_pixels() {
        let stimulus = factory(5).build().unwrap();
        assert_eq!(stimulus.params.check_pixels, 5);
        assert_eq!(stimulus.resolution.shape, (40, 40));
        assert_eq!(stimulus.resolution.visual_size, (4.0, 4.0));
        assert_eq!(stimulus.mask[[0, 0]], 1);
        assert_eq!(stimulus.mask[[39, 39]], 64);
        assert_eq!(stimulus.img[[7, 12]], stimulus.params.board[[1, 2]]);
        assert!(satisfies_adjacency(&stimulus.params.board));
        assert!(stimulus.adjustments.is_empty());
    }
}
