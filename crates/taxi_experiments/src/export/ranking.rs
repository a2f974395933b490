use std::cmp::Ordering;

use crate::metrics::SimulationResult;

pub(crate) fn find_best_index(results: &[SimulationResult]) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.completion_rate
                .partial_cmp(&b.completion_rate)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.avg_time_to_pickup
                        .partial_cmp(&a.avg_time_to_pickup)
                        .unwrap_or(Ordering::Equal)
                })
        })
        .map(|(idx, _)| idx)
}
