use restwise_storage::Trend;
use std::collections::VecDeque;

/// Compare the mean of the newest `window` scores with the `window` before them.
///
/// With fewer than `2 * window` scores the window shrinks to half the history;
/// fewer than two scores is always stable.
#[must_use]
pub fn compute_trend(history: &VecDeque<f64>, window: usize, epsilon: f64) -> Trend {
    let k = window.min(history.len() / 2);
    if k == 0 {
        return Trend::Stable;
    }

    let len = history.len();
    let recent = mean(history.range(len - k..));
    let previous = mean(history.range(len - 2 * k..len - k));
    let delta = recent - previous;

    if delta > epsilon {
        Trend::Increasing
    } else if delta < -epsilon {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

fn mean<'a>(values: impl ExactSizeIterator<Item = &'a f64>) -> f64 {
    let n = values.len();
    #[allow(clippy::cast_precision_loss)]
    let n = n as f64;
    values.sum::<f64>() / n
}
