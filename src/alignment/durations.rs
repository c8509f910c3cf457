use crate::error::AlignmentError;
use crate::types::DurationSequence;

/// Count how many frames each token position received along `path`.
///
/// The path must start at token 0, end at `num_tokens - 1` and move by 0 or
/// +1 per frame, so the result always has `num_tokens` entries that are all
/// at least 1 and sum to `path.len()`.
pub fn to_durations(path: &[usize], num_tokens: usize) -> Result<DurationSequence, AlignmentError> {
    if num_tokens == 0 {
        return Err(AlignmentError::invalid_input(
            "cannot reduce a path over zero tokens",
        ));
    }
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return Err(AlignmentError::invalid_input("alignment path is empty"));
    };
    if first != 0 {
        return Err(AlignmentError::invalid_input(format!(
            "alignment path starts at token {first}, expected 0"
        )));
    }
    if last != num_tokens - 1 {
        return Err(AlignmentError::invalid_input(format!(
            "alignment path ends at token {last}, expected {}",
            num_tokens - 1
        )));
    }

    let mut durations = vec![0u32; num_tokens];
    durations[0] = 1;
    for (frame, pair) in path.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);
        if (to != from && to != from + 1) || to >= num_tokens {
            return Err(AlignmentError::invalid_input(format!(
                "alignment path jumps from token {from} to {to} at frame {}",
                frame + 1
            )));
        }
        durations[to] += 1;
    }

    debug_assert_eq!(durations.iter().map(|&d| d as usize).sum::<usize>(), path.len());
    Ok(DurationSequence(durations))
}
