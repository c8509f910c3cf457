use crate::alignment::DecoderKind;
use crate::error::AlignmentError;
use crate::types::PosteriorMatrix;

/// Probability floor applied before taking `-ln`, keeps every edge cost finite.
pub const DEFAULT_PROB_FLOOR: f32 = 1e-12;

/// Edge weights of the monotonic alignment lattice.
///
/// Cell `(i, j)` assigns frame `i` to the `j`-th target token and costs
/// `-ln(max(P[i][tokens[j]], floor))`. Every edge advances one frame and
/// either keeps the token (stay) or moves to the next one (advance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    floor: f32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            floor: DEFAULT_PROB_FLOOR,
        }
    }
}

impl CostModel {
    /// A floor of `0.0` disables flooring, in which case zero probabilities
    /// cost `+inf`.
    pub fn new(floor: f32) -> Result<Self, AlignmentError> {
        if !(0.0..1.0).contains(&floor) {
            return Err(AlignmentError::invalid_input(format!(
                "probability floor must be in [0, 1), got {floor}"
            )));
        }
        Ok(Self { floor })
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    #[inline(always)]
    pub(crate) fn cost(&self, matrix: &PosteriorMatrix, tokens: &[usize], frame: usize, pos: usize) -> f64 {
        let p = matrix.prob(frame, tokens[pos]).max(self.floor);
        if p <= 0.0 {
            return f64::INFINITY;
        }
        -(p as f64).ln()
    }

    /// Total cost of an explicit path: the start cell plus every entered cell.
    ///
    /// The path must give one token position per frame, and every position
    /// must index into `tokens`.
    pub fn path_cost(
        &self,
        matrix: &PosteriorMatrix,
        tokens: &[usize],
        path: &[usize],
    ) -> Result<f64, AlignmentError> {
        if path.len() != matrix.num_frames() {
            return Err(AlignmentError::invalid_input(format!(
                "path has {} entries for {} frames",
                path.len(),
                matrix.num_frames()
            )));
        }
        if let Some(&id) = tokens.iter().find(|&&id| id >= matrix.num_symbols()) {
            return Err(AlignmentError::invalid_input(format!(
                "token {id} is outside the {} posterior symbols",
                matrix.num_symbols()
            )));
        }
        if let Some((frame, &pos)) = path.iter().enumerate().find(|&(_, &pos)| pos >= tokens.len()) {
            return Err(AlignmentError::invalid_input(format!(
                "path position {pos} at frame {frame} exceeds {} tokens",
                tokens.len()
            )));
        }
        Ok(path
            .iter()
            .enumerate()
            .map(|(frame, &pos)| self.cost(matrix, tokens, frame, pos))
            .sum())
    }

    /// Whether some monotonic path reaches the last token with every cell
    /// finite. Always true with a positive floor.
    pub(crate) fn finite_path_exists(&self, matrix: &PosteriorMatrix, tokens: &[usize]) -> bool {
        if self.floor > 0.0 {
            return true;
        }
        let n_len = tokens.len();
        let mut reach = vec![false; n_len];
        reach[0] = self.cost(matrix, tokens, 0, 0).is_finite();
        for t in 1..matrix.num_frames() {
            for s in (0..n_len.min(t + 1)).rev() {
                let from = reach[s] || (s > 0 && reach[s - 1]);
                reach[s] = from && self.cost(matrix, tokens, t, s).is_finite();
            }
        }
        reach[n_len - 1]
    }
}

/// Eager validation shared by both decoders.
pub(crate) fn check_inputs(
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    decoder: DecoderKind,
) -> Result<(), AlignmentError> {
    let t_len = matrix.num_frames();
    let n_len = tokens.len();
    if t_len == 0 {
        return Err(AlignmentError::invalid_input(
            "posterior matrix has no frames",
        ));
    }
    if n_len == 0 {
        return Err(AlignmentError::invalid_input("token sequence is empty"));
    }
    if let Some((pos, &id)) = tokens
        .iter()
        .enumerate()
        .find(|&(_, &id)| id >= matrix.num_symbols())
    {
        return Err(AlignmentError::invalid_input(format!(
            "token {id} at position {pos} is outside the {} posterior symbols",
            matrix.num_symbols()
        )));
    }
    if t_len < n_len {
        return Err(AlignmentError::infeasible(
            decoder,
            t_len,
            n_len,
            "fewer frames than tokens",
        ));
    }
    Ok(())
}
