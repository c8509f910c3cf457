use crate::alignment::lattice::{check_inputs, CostModel};
use crate::alignment::DecoderKind;
use crate::error::AlignmentError;
use crate::types::{AlignmentPath, PosteriorMatrix};

/// Bit-packed `(frame, token)` table: set when the cell's best predecessor
/// was the advance edge from `(frame - 1, token - 1)`.
struct AdvanceBits {
    words: Vec<u64>,
    cols: usize,
}

impl AdvanceBits {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            words: vec![0u64; (rows * cols).div_ceil(64)],
            cols,
        }
    }

    #[inline(always)]
    fn set(&mut self, frame: usize, pos: usize) {
        let idx = frame * self.cols + pos;
        self.words[idx >> 6] |= 1u64 << (idx & 63);
    }

    #[inline(always)]
    fn get(&self, frame: usize, pos: usize) -> bool {
        let idx = frame * self.cols + pos;
        self.words[idx >> 6] & (1u64 << (idx & 63)) != 0
    }
}

/// Globally optimal monotonic alignment by dynamic programming.
///
/// Keeps two rolling cost rows and one backpointer bit per cell. Only the
/// feasible band is visited: at frame `t` the token index lies in
/// `[N-1-(T-1-t), t]`, anything outside can't start at `(0,0)` or can't
/// still reach `(T-1, N-1)`. Exact ties go to the advance edge.
pub fn decode_exact(
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    cost_model: &CostModel,
) -> Result<AlignmentPath, AlignmentError> {
    check_inputs(matrix, tokens, DecoderKind::Exact)?;
    let t_len = matrix.num_frames();
    let n_len = tokens.len();
    let last = n_len - 1;

    let mut prev = vec![f64::INFINITY; n_len];
    let mut curr = vec![f64::INFINITY; n_len];
    let mut advanced = AdvanceBits::new(t_len, n_len);

    prev[0] = cost_model.cost(matrix, tokens, 0, 0);
    let mut prev_start = 0usize;
    let mut prev_end = 0usize;

    for t in 1..t_len {
        let remaining = t_len - 1 - t;
        let curr_start = last.saturating_sub(remaining);
        let curr_end = t.min(last);

        for s in curr_start..=curr_end {
            let stay = if s >= prev_start && s <= prev_end {
                prev[s]
            } else {
                f64::INFINITY
            };
            let best = if s >= 1 && s - 1 >= prev_start && s - 1 <= prev_end {
                let advance = prev[s - 1];
                if advance <= stay {
                    advanced.set(t, s);
                    advance
                } else {
                    stay
                }
            } else {
                stay
            };
            curr[s] = best + cost_model.cost(matrix, tokens, t, s);
        }

        std::mem::swap(&mut prev, &mut curr);
        prev_start = curr_start;
        prev_end = curr_end;
    }

    let total_cost = prev[last];
    if !total_cost.is_finite() {
        return Err(AlignmentError::infeasible(
            DecoderKind::Exact,
            t_len,
            n_len,
            "final cell unreachable with finite cost",
        ));
    }

    let mut token_indices = vec![0usize; t_len];
    let mut s = last;
    for t in (1..t_len).rev() {
        token_indices[t] = s;
        if advanced.get(t, s) {
            s -= 1;
        }
    }
    debug_assert_eq!(s, 0);
    token_indices[0] = s;

    tracing::trace!(frames = t_len, tokens = n_len, total_cost, "exact decode done");
    Ok(AlignmentPath {
        token_indices,
        total_cost,
        decoder: DecoderKind::Exact,
    })
}
