//! recall@R evaluation against TEXMEX ground truth, mirroring the original
//! Python driver's `calculateRecallR`/`evaluateResults`: recall@R counts a
//! query as a hit when its first ground-truth neighbor id appears anywhere
//! in the first `R` returned ids.

/// Fraction of queries whose first ground-truth neighbor appears in the
/// top-`r` entries of the corresponding result list.
pub fn recall_at_r(ground_truth: &[Vec<i32>], results: &[Vec<u64>], r: usize) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    let hits = ground_truth
        .iter()
        .zip(results.iter())
        .filter(|(truth, result)| {
            truth.first().is_some_and(|&first| {
                let first = first as u64;
                result.iter().take(r).any(|&id| id == first)
            })
        })
        .count();

    hits as f64 / results.len() as f64
}

/// Evaluates recall@R for every `r` in `rs`, in the same order.
pub fn evaluate(ground_truth: &[Vec<i32>], results: &[Vec<u64>], rs: &[usize]) -> Vec<f64> {
    rs.iter().map(|&r| recall_at_r(ground_truth, results, r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_hit_when_first_ground_truth_is_within_r() {
        let ground_truth = vec![vec![5, 9], vec![1, 2]];
        let results = vec![vec![3, 5, 7], vec![9, 1, 2]];

        assert_eq!(recall_at_r(&ground_truth, &results, 2), 0.5);
        assert_eq!(recall_at_r(&ground_truth, &results, 3), 1.0);
    }

    #[test]
    fn evaluate_reports_one_value_per_r() {
        let ground_truth = vec![vec![1]];
        let results = vec![vec![1]];
        let recalls = evaluate(&ground_truth, &results, &[1, 5, 10]);
        assert_eq!(recalls, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_results_yield_zero_recall() {
        let recalls = recall_at_r(&[], &[], 5);
        assert_eq!(recalls, 0.0);
    }
}
