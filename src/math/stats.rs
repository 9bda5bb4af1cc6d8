//! Order-independent numeric primitives.
//!
//! Values are summed in ascending order with Neumaier compensation so that
//! a slide's mean does not depend on the order its tiles arrived in.

/// Compensated sum over a sorted copy of `values`. NaN inputs propagate.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut sum = 0.0f64;
    let mut comp = 0.0f64;
    for &v in &sorted {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            comp += (sum - t) + v;
        } else {
            comp += (v - t) + sum;
        }
        sum = t;
    }
    sum + comp
}

/// Arithmetic mean, `None` for an empty slice.
pub fn stable_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

pub fn fraction(count: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(count as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_is_order_independent() {
        let a = [0.1, 0.2, 0.3, 1e-9, 0.7];
        let b = [0.7, 1e-9, 0.3, 0.1, 0.2];
        assert_eq!(stable_mean(&a), stable_mean(&b));
    }

    #[test]
    fn empty_mean_is_none() {
        assert_eq!(stable_mean(&[]), None);
        assert_eq!(fraction(3, 0), None);
    }
}
