//! Return-series statistics used by the screener.
//!
//! Standard deviations are sample deviations (n - 1). Ratios that would
//! divide by zero, or that lack two samples, come out as 0.

/// Simple returns of a price series. The first element has no predecessor
/// and is reported as 0, so the output has the same length as the input.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return returns;
    }
    returns.push(0.0);
    for pair in prices.windows(2) {
        let change = if pair[0] != 0.0 {
            (pair[1] - pair[0]) / pair[0]
        } else {
            0.0
        };
        returns.push(if change.is_finite() { change } else { 0.0 });
    }
    returns
}

/// Last `n` values (all of them when fewer)
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation. `None` below two samples.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn annualize(mean: f64, std: Option<f64>, samples: usize) -> f64 {
    match std {
        Some(std) if std > 0.0 && std.is_finite() => {
            let ratio = mean / std * (samples as f64).sqrt();
            if ratio.is_finite() {
                ratio
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// mean / std × sqrt(n) over the given window
pub fn sharpe(returns: &[f64]) -> f64 {
    annualize(mean(returns), sample_std(returns), returns.len())
}

/// Like [`sharpe`] but the deviation only counts negative returns
pub fn sortino(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    annualize(mean(returns), sample_std(&downside), returns.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_returns() {
        let returns = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 3);
        assert_eq!(returns[0], 0.0);
        assert!((returns[1] - 0.1).abs() < 1e-12);
        assert!((returns[2] + 0.1).abs() < 1e-12);
        assert!(simple_returns(&[]).is_empty());
    }

    #[test]
    fn test_tail() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(tail(&values, 2), &[2.0, 3.0]);
        assert_eq!(tail(&values, 10), &values);
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138089935299395).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn test_sharpe_zero_when_flat() {
        assert_eq!(sharpe(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(sharpe(&[]), 0.0);
    }

    #[test]
    fn test_sharpe_scales_with_sqrt_n() {
        let returns = [0.01, 0.03, -0.01, 0.02];
        let expected = mean(&returns) / sample_std(&returns).unwrap() * 2.0;
        assert!((sharpe(&returns) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sortino_needs_two_losses() {
        assert_eq!(sortino(&[0.01, 0.02, -0.01]), 0.0);
        let returns = [0.03, -0.01, 0.02, -0.02];
        let downside_std = sample_std(&[-0.01, -0.02]).unwrap();
        let expected = mean(&returns) / downside_std * 2.0;
        assert!((sortino(&returns) - expected).abs() < 1e-12);
    }
}
