use std::cmp::Ordering;

use crate::alignment::lattice::{check_inputs, CostModel};
use crate::alignment::DecoderKind;
use crate::error::AlignmentError;
use crate::types::{AlignmentPath, PosteriorMatrix};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hypothesis {
    cost: f64,
    pos: usize,
    advanced: bool,
}

impl Hypothesis {
    /// Merge rule for two hypotheses on the same `(frame, token)` cell.
    fn beats(&self, other: &Hypothesis) -> bool {
        self.cost < other.cost || (self.cost == other.cost && self.advanced && !other.advanced)
    }
}

/// Pruning order: cheapest first, then arrived-via-advance, then the
/// further token so equal-cost states break deterministically.
fn rank(a: &Hypothesis, b: &Hypothesis) -> Ordering {
    a.cost
        .total_cmp(&b.cost)
        .then_with(|| b.advanced.cmp(&a.advanced))
        .then_with(|| b.pos.cmp(&a.pos))
}

#[derive(Debug, Clone, Copy)]
struct TrailEntry {
    pos: usize,
    advanced: bool,
}

/// Flat arena of per-frame survivors, sorted by token index within a frame.
struct Trail {
    entries: Vec<TrailEntry>,
    frame_starts: Vec<usize>,
}

impl Trail {
    fn with_capacity(frames: usize, beam_width: usize) -> Self {
        Self {
            entries: Vec::with_capacity(frames.saturating_mul(beam_width.min(64))),
            frame_starts: Vec::with_capacity(frames + 1),
        }
    }

    fn push_frame(&mut self, beam: &[Hypothesis]) {
        self.frame_starts.push(self.entries.len());
        self.entries.extend(beam.iter().map(|h| TrailEntry {
            pos: h.pos,
            advanced: h.advanced,
        }));
    }

    fn came_from_advance(&self, frame: usize, pos: usize) -> Option<bool> {
        let start = self.frame_starts[frame];
        let end = self
            .frame_starts
            .get(frame + 1)
            .copied()
            .unwrap_or(self.entries.len());
        let survivors = &self.entries[start..end];
        survivors
            .binary_search_by_key(&pos, |e| e.pos)
            .ok()
            .map(|idx| survivors[idx].advanced)
    }
}

/// Bounded-width monotonic alignment.
///
/// Holds at most `beam_width` hypotheses per frame, one per token index.
/// With `beam_width >= tokens.len()` nothing is ever pruned and the result
/// matches [`decode_exact`](crate::alignment::exact::decode_exact).
/// Returns [`AlignmentError::BeamExhausted`] when no survivor reaches the
/// last token; retrying with a wider beam is up to the caller.
pub fn decode_beam(
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    beam_width: usize,
    cost_model: &CostModel,
) -> Result<AlignmentPath, AlignmentError> {
    if beam_width == 0 {
        return Err(AlignmentError::invalid_input("beam width must be at least 1"));
    }
    check_inputs(matrix, tokens, DecoderKind::Beam)?;
    let t_len = matrix.num_frames();
    let n_len = tokens.len();
    let last = n_len - 1;

    // At most one live hypothesis per token index.
    let live = beam_width.min(n_len);
    let mut beam: Vec<Hypothesis> = Vec::with_capacity(live);
    let start = cost_model.cost(matrix, tokens, 0, 0);
    if start.is_finite() {
        beam.push(Hypothesis {
            cost: start,
            pos: 0,
            advanced: false,
        });
    }
    let mut candidates: Vec<Hypothesis> = Vec::with_capacity(2 * live);
    let mut merged: Vec<Hypothesis> = Vec::with_capacity(2 * live);
    let mut trail = Trail::with_capacity(t_len, live);
    trail.push_frame(&beam);

    for t in 1..t_len {
        // `beam` is sorted by token index, so candidates come out sorted too
        // and collisions on the same index are adjacent. Candidates carry the
        // predecessor cost until merged; the cell cost is shared per index.
        candidates.clear();
        for h in &beam {
            candidates.push(Hypothesis {
                cost: h.cost,
                pos: h.pos,
                advanced: false,
            });
            if h.pos < last {
                candidates.push(Hypothesis {
                    cost: h.cost,
                    pos: h.pos + 1,
                    advanced: true,
                });
            }
        }

        merged.clear();
        for c in candidates.drain(..) {
            match merged.last_mut() {
                Some(prev) if prev.pos == c.pos => {
                    if c.beats(prev) {
                        *prev = c;
                    }
                }
                _ => merged.push(c),
            }
        }
        for h in merged.iter_mut() {
            h.cost += cost_model.cost(matrix, tokens, t, h.pos);
        }
        // Unreachable cells must not hold beam slots.
        merged.retain(|h| h.cost.is_finite());

        if merged.len() > beam_width {
            merged.sort_by(rank);
            merged.truncate(beam_width);
            merged.sort_by_key(|h| h.pos);
        }

        trail.push_frame(&merged);
        std::mem::swap(&mut beam, &mut merged);
        if beam.is_empty() {
            break;
        }
    }

    let Some(best) = beam.iter().find(|h| h.pos == last).copied() else {
        return Err(beam_failure(matrix, tokens, beam_width, cost_model));
    };

    let mut token_indices = vec![0usize; t_len];
    let mut pos = last;
    for t in (1..t_len).rev() {
        token_indices[t] = pos;
        let advanced = trail.came_from_advance(t, pos).ok_or_else(|| {
            AlignmentError::runtime("beam backtrack", format!("no survivor at frame {t}, token {pos}"))
        })?;
        if advanced {
            pos -= 1;
        }
    }
    debug_assert_eq!(pos, 0);
    token_indices[0] = pos;

    tracing::trace!(
        frames = t_len,
        tokens = n_len,
        beam_width,
        total_cost = best.cost,
        "beam decode done"
    );
    Ok(AlignmentPath {
        token_indices,
        total_cost: best.cost,
        decoder: DecoderKind::Beam,
    })
}

/// Error for a beam that never reached the last token: infeasible when no
/// finite path exists at all, exhausted otherwise.
fn beam_failure(
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    beam_width: usize,
    cost_model: &CostModel,
) -> AlignmentError {
    let (frames, n_len) = (matrix.num_frames(), tokens.len());
    if cost_model.finite_path_exists(matrix, tokens) {
        tracing::debug!(frames, tokens = n_len, beam_width, "beam exhausted");
        AlignmentError::BeamExhausted {
            frames,
            tokens: n_len,
            beam_width,
        }
    } else {
        AlignmentError::infeasible(
            DecoderKind::Beam,
            frames,
            n_len,
            "final cell unreachable with finite cost",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::exact::decode_exact;

    fn matrix(rows: Vec<Vec<f32>>) -> PosteriorMatrix {
        PosteriorMatrix::from_rows(rows).unwrap()
    }

    fn concrete() -> PosteriorMatrix {
        matrix(vec![
            vec![0.8, 0.1, 0.1],
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.1, 0.1, 0.8],
        ])
    }

    #[test]
    fn wide_beam_matches_exact_decoder() {
        let m = concrete();
        let model = CostModel::default();
        let exact = decode_exact(&m, &[0, 1, 2], &model).unwrap();
        let beam = decode_beam(&m, &[0, 1, 2], 3, &model).unwrap();
        assert_eq!(beam.token_indices, exact.token_indices);
        assert_eq!(beam.total_cost, exact.total_cost);
        assert_eq!(beam.decoder, DecoderKind::Beam);
    }

    #[test]
    fn narrow_beam_still_follows_clear_evidence() {
        let beam = decode_beam(&concrete(), &[0, 1, 2], 1, &CostModel::default()).unwrap();
        assert_eq!(beam.token_indices, vec![0, 0, 1, 2]);
    }

    #[test]
    fn uniform_posteriors_resolve_ties_towards_advance() {
        let m = matrix(vec![vec![0.5, 0.5]; 5]);
        let model = CostModel::default();
        let beam = decode_beam(&m, &[0, 1, 0], 3, &model).unwrap();
        let exact = decode_exact(&m, &[0, 1, 0], &model).unwrap();
        assert_eq!(beam.token_indices, exact.token_indices);
        assert_eq!(beam.token_indices, vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn greedy_beam_can_exhaust() {
        // Staying on token 0 always looks cheaper locally, so a width-1
        // beam never reaches the last token.
        let m = matrix(vec![vec![0.9, 0.05, 0.05]; 4]);
        let err = decode_beam(&m, &[0, 1, 2], 1, &CostModel::default()).unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::BeamExhausted {
                frames: 4,
                tokens: 3,
                beam_width: 1
            }
        ));
        assert!(decode_beam(&m, &[0, 1, 2], 3, &CostModel::default()).is_ok());
    }

    #[test]
    fn huge_width_behaves_like_a_full_beam() {
        let m = matrix(vec![vec![0.5, 0.5]; 3]);
        let model = CostModel::default();
        let beam = decode_beam(&m, &[0, 1], usize::MAX, &model).unwrap();
        let exact = decode_exact(&m, &[0, 1], &model).unwrap();
        assert_eq!(beam.token_indices, exact.token_indices);
        assert_eq!(beam.total_cost, exact.total_cost);
    }

    fn zero_floor_trap() -> PosteriorMatrix {
        // Staying on token 0 is free until frame 2, where only token 2 is
        // possible; the single finite path advances at frame 1.
        matrix(vec![
            vec![1.0, 0.0, 0.0],
            vec![1.0, 0.5, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0],
        ])
    }

    #[test]
    fn pruned_finite_path_is_exhaustion_not_infeasibility() {
        let m = zero_floor_trap();
        let model = CostModel::new(0.0).unwrap();
        let exact = decode_exact(&m, &[0, 1, 2], &model).unwrap();
        assert_eq!(exact.token_indices, vec![0, 1, 2, 2]);

        let err = decode_beam(&m, &[0, 1, 2], 1, &model).unwrap_err();
        assert!(err.is_beam_exhausted(), "unexpected error: {err}");

        let wide = decode_beam(&m, &[0, 1, 2], 2, &model).unwrap();
        assert_eq!(wide.token_indices, exact.token_indices);
        assert_eq!(wide.total_cost, exact.total_cost);
    }

    #[test]
    fn zero_floor_without_finite_path_is_infeasible() {
        let m = matrix(vec![vec![1.0, 0.0]; 3]);
        let model = CostModel::new(0.0).unwrap();
        for width in [1, 2, 8] {
            let err = decode_beam(&m, &[0, 1], width, &model).unwrap_err();
            assert!(matches!(
                err,
                AlignmentError::InfeasibleAlignment {
                    decoder: DecoderKind::Beam,
                    ..
                }
            ));
        }
    }

    #[test]
    fn zero_width_is_invalid() {
        let err = decode_beam(&concrete(), &[0, 1, 2], 0, &CostModel::default()).unwrap_err();
        assert!(matches!(err, AlignmentError::InvalidInput { .. }));
    }

    #[test]
    fn too_few_frames_is_infeasible() {
        let m = matrix(vec![vec![0.5, 0.5]; 2]);
        let err = decode_beam(&m, &[0, 1, 0], 4, &CostModel::default()).unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::InfeasibleAlignment {
                decoder: DecoderKind::Beam,
                ..
            }
        ));
    }

    #[test]
    fn merge_prefers_cheaper_then_advance() {
        let stay = Hypothesis {
            cost: 1.0,
            pos: 2,
            advanced: false,
        };
        let advance = Hypothesis {
            advanced: true,
            ..stay
        };
        assert!(advance.beats(&stay));
        assert!(!stay.beats(&advance));
        let cheaper_stay = Hypothesis { cost: 0.5, ..stay };
        assert!(cheaper_stay.beats(&advance));
    }

    #[test]
    fn rank_orders_by_cost_then_advance_then_position() {
        let mut hyps = vec![
            Hypothesis {
                cost: 2.0,
                pos: 0,
                advanced: false,
            },
            Hypothesis {
                cost: 1.0,
                pos: 1,
                advanced: false,
            },
            Hypothesis {
                cost: 1.0,
                pos: 2,
                advanced: true,
            },
            Hypothesis {
                cost: 1.0,
                pos: 3,
                advanced: false,
            },
        ];
        hyps.sort_by(rank);
        let order: Vec<usize> = hyps.iter().map(|h| h.pos).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }
}
