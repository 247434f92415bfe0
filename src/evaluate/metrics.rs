use std::collections::HashSet;

/// Average precision of one ranking: precision at each relevant hit, summed
/// and divided by the number of relevant documents, retrieved or not.
pub fn average_precision<S: AsRef<str>>(ranking: &[S], relevant: &HashSet<String>) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }

    let mut hits = 0usize;
    let mut precision_sum = 0.0;
    for (rank, id) in ranking.iter().enumerate() {
        if relevant.contains(id.as_ref()) {
            hits += 1;
            precision_sum += hits as f64 / (rank + 1) as f64;
        }
    }
    precision_sum / relevant.len() as f64
}

/// Arithmetic mean of per-topic average precisions; 0 for no topics.
pub fn mean_average_precision(precisions: &[f64]) -> f64 {
    if precisions.is_empty() {
        return 0.0;
    }
    precisions.iter().sum::<f64>() / precisions.len() as f64
}
