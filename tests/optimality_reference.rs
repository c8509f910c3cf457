use std::env;

use dfaligner_rs::{
    decode_beam, decode_exact, to_durations, AlignmentError, CostModel, PosteriorMatrix,
};
use libtest_mimic::{Arguments, Failed, Trial};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_CASE_COUNT: usize = 200;
const DEFAULT_SEED: u64 = 42;
const MAX_FRAMES: usize = 9;
const MAX_SYMBOLS: usize = 5;
const COST_TOLERANCE: f64 = 1e-9;
const SUITE_NAME: &str = "decoders_match_brute_force_enumeration";

#[derive(Debug, Clone)]
struct Case {
    id: usize,
    matrix: PosteriorMatrix,
    tokens: Vec<usize>,
}

fn main() {
    let args = Arguments::from_args();

    let seed = env_u64("DFALIGNER_IT_SEED", DEFAULT_SEED);
    let case_count = env_u64("DFALIGNER_IT_CASES", DEFAULT_CASE_COUNT as u64) as usize;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut tests = Vec::with_capacity(case_count + 1);
    for id in 0..case_count {
        let case = random_case(&mut rng, id);
        tests.push(Trial::test(
            format!("{SUITE_NAME}::seed_{seed}::case_{id:04}"),
            move || run_case(&case).map_err(Failed::from),
        ));
    }
    tests.push(Trial::test(
        format!("{SUITE_NAME}::fewer_frames_than_tokens"),
        || run_infeasible_case().map_err(Failed::from),
    ));

    libtest_mimic::run(&args, tests).exit();
}

fn random_case(rng: &mut StdRng, id: usize) -> Case {
    let frames = rng.gen_range(1..=MAX_FRAMES);
    let tokens_len = rng.gen_range(1..=frames);
    let symbols = rng.gen_range(1..=MAX_SYMBOLS);

    let mut rows = Vec::with_capacity(frames);
    for _ in 0..frames {
        let mut row: Vec<f32> = (0..symbols)
            .map(|_| {
                // Exact zeros exercise the probability floor.
                if rng.gen_bool(0.15) {
                    0.0
                } else {
                    rng.gen_range(0.01f32..1.0)
                }
            })
            .collect();
        let sum: f32 = row.iter().sum();
        if sum > 0.0 {
            row.iter_mut().for_each(|p| *p /= sum);
        }
        rows.push(row);
    }
    let tokens = (0..tokens_len).map(|_| rng.gen_range(0..symbols)).collect();

    Case {
        id,
        matrix: PosteriorMatrix::from_rows(rows).expect("rectangular rows"),
        tokens,
    }
}

fn run_case(case: &Case) -> Result<(), String> {
    let cost_model = CostModel::default();
    let frames = case.matrix.num_frames();
    let n = case.tokens.len();

    let (best_cost, best_count) = brute_force_optimum(&case.matrix, &case.tokens, &cost_model);

    let exact = decode_exact(&case.matrix, &case.tokens, &cost_model)
        .map_err(|err| format!("case {}: exact decoder failed: {err}", case.id))?;
    if (exact.total_cost - best_cost).abs() > COST_TOLERANCE {
        return Err(format!(
            "case {}: exact cost {} differs from brute-force optimum {best_cost} ({best_count} optimal paths)",
            case.id, exact.total_cost
        ));
    }
    let recomputed = cost_model
        .path_cost(&case.matrix, &case.tokens, &exact.token_indices)
        .map_err(|err| format!("case {}: exact path rejected by path_cost: {err}", case.id))?;
    if (recomputed - exact.total_cost).abs() > COST_TOLERANCE {
        return Err(format!(
            "case {}: reported cost {} does not match path cost {recomputed}",
            case.id, exact.total_cost
        ));
    }

    let durations = to_durations(&exact.token_indices, n)
        .map_err(|err| format!("case {}: exact path rejected by reducer: {err}", case.id))?;
    if durations.total_frames() != frames as u64 {
        return Err(format!(
            "case {}: durations sum to {} instead of {frames}",
            case.id,
            durations.total_frames()
        ));
    }
    if durations.as_slice().len() != n || durations.as_slice().contains(&0) {
        return Err(format!(
            "case {}: durations {:?} do not cover all {n} tokens",
            case.id,
            durations.as_slice()
        ));
    }

    let wide = decode_beam(&case.matrix, &case.tokens, n, &cost_model)
        .map_err(|err| format!("case {}: beam(K=N) failed: {err}", case.id))?;
    if wide.token_indices != exact.token_indices || wide.total_cost != exact.total_cost {
        return Err(format!(
            "case {}: beam(K=N) {:?} ({}) disagrees with exact {:?} ({})",
            case.id, wide.token_indices, wide.total_cost, exact.token_indices, exact.total_cost
        ));
    }

    for width in 1..n {
        match decode_beam(&case.matrix, &case.tokens, width, &cost_model) {
            Ok(narrow) => {
                if narrow.total_cost + COST_TOLERANCE < best_cost {
                    return Err(format!(
                        "case {}: beam(K={width}) cost {} beats the optimum {best_cost}",
                        case.id, narrow.total_cost
                    ));
                }
                to_durations(&narrow.token_indices, n).map_err(|err| {
                    format!("case {}: beam(K={width}) produced an invalid path: {err}", case.id)
                })?;
            }
            Err(AlignmentError::BeamExhausted { .. }) => {}
            Err(err) => {
                return Err(format!(
                    "case {}: beam(K={width}) failed unexpectedly: {err}",
                    case.id
                ))
            }
        }
    }

    Ok(())
}

fn run_infeasible_case() -> Result<(), String> {
    let matrix = PosteriorMatrix::from_rows(vec![vec![0.5, 0.5]; 2]).map_err(|e| e.to_string())?;
    let cost_model = CostModel::default();
    match decode_exact(&matrix, &[0, 1, 0], &cost_model) {
        Err(AlignmentError::InfeasibleAlignment { frames: 2, tokens: 3, .. }) => {}
        other => return Err(format!("exact decoder: expected infeasible, got {other:?}")),
    }
    match decode_beam(&matrix, &[0, 1, 0], 4, &cost_model) {
        Err(AlignmentError::InfeasibleAlignment { frames: 2, tokens: 3, .. }) => Ok(()),
        other => Err(format!("beam decoder: expected infeasible, got {other:?}")),
    }
}

/// Minimum cost over every monotonic path, and how many paths reach it.
fn brute_force_optimum(
    matrix: &PosteriorMatrix,
    tokens: &[usize],
    cost_model: &CostModel,
) -> (f64, usize) {
    let frames = matrix.num_frames();
    let mut path = Vec::with_capacity(frames);
    let mut best = (f64::INFINITY, 0usize);
    enumerate_paths(frames, tokens.len(), &mut path, &mut |candidate: &[usize]| {
        let cost = cost_model
            .path_cost(matrix, tokens, candidate)
            .unwrap_or(f64::INFINITY);
        if cost < best.0 - COST_TOLERANCE {
            best = (cost, 1);
        } else if (cost - best.0).abs() <= COST_TOLERANCE {
            best.1 += 1;
        }
    });
    best
}

fn enumerate_paths(
    frames: usize,
    tokens: usize,
    path: &mut Vec<usize>,
    visit: &mut dyn FnMut(&[usize]),
) {
    if path.len() == frames {
        if path.last() == Some(&(tokens - 1)) {
            visit(path);
        }
        return;
    }
    let next = match path.last() {
        None => vec![0],
        Some(&pos) if pos + 1 < tokens => vec![pos, pos + 1],
        Some(&pos) => vec![pos],
    };
    for pos in next {
        path.push(pos);
        enumerate_paths(frames, tokens, path, visit);
        path.pop();
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or_else(|err| {
            panic!(
                "Invalid value for {}='{}' (expected u64): {}",
                name, value, err
            )
        }),
        Err(_) => default,
    }
}
