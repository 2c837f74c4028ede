//! Pure numeric helpers for the statistical model (C2): Poisson and
//! binomial mass/cumulative functions, implemented by hand in log-space
//! rather than pulling in a statistics crate for a handful of closed-form
//! distributions.

/// log(n!) via the Lanczos approximation for `ln(Gamma(n+1))`.
pub fn ln_factorial(n: u64) -> f64 {
    ln_gamma(n as f64 + 1.0)
}

/// Lanczos approximation of `ln(Gamma(x))`, good to ~15 significant digits
/// for `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // Reflection formula.
        std::f64::consts::PI.ln() - (std::f64::consts::PI * x).sin().ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut a = COEFFS[0];
        let t = x + G + 0.5;
        for (i, c) in COEFFS.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
    }
}

/// `P(X = k)` for `X ~ Poisson(lambda)`.
pub fn poisson_pmf(k: u64, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    (k as f64 * lambda.ln() - lambda - ln_factorial(k)).exp()
}

/// `P(X <= k)` for `X ~ Poisson(lambda)`.
pub fn poisson_cdf(k: u64, lambda: f64) -> f64 {
    let mut sum = 0.0;
    for i in 0..=k {
        sum += poisson_pmf(i, lambda);
    }
    sum.min(1.0)
}

/// Smallest `c >= 0` such that `P(X <= c | Poisson(lambda)) > target`.
/// Used by `control_fp`.
pub fn qpois(target: f64, lambda: f64) -> i64 {
    if lambda <= 0.0 {
        return 0;
    }
    let cap = ((lambda * 50.0) as u64).max(1_000);
    for c in 0..=cap {
        if poisson_cdf(c, lambda) > target {
            return c as i64;
        }
    }
    cap as i64
}

/// log(n choose k) via `ln_factorial`.
fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// `P(X = k)` for `X ~ Binomial(n, p)`.
pub fn binomial_pmf(k: u64, n: u64, p: f64) -> f64 {
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    (ln_choose(n, k) + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

/// `P(X <= k)` for `X ~ Binomial(n, p)`.
pub fn binomial_cdf(k: u64, n: u64, p: f64) -> f64 {
    let mut sum = 0.0;
    for i in 0..=k.min(n) {
        sum += binomial_pmf(i, n, p);
    }
    sum.min(1.0)
}

/// Smallest `c` such that `P(X <= c | Binomial(n, p)) >= quantile`.
pub fn binomial_quantile(quantile: f64, n: u64, p: f64) -> u64 {
    for c in 0..=n {
        if binomial_cdf(c, n, p) >= quantile {
            return c;
        }
    }
    n
}

/// Mixture CDF at `k` of two independent Poisson error events landing in a
/// `k`-mer window: models the "at least one of two errors falls in this
/// window" sensitivity target used by `control_fn`
/// (`qpoismixerror` in the original source).
pub fn poisson_mixture_cdf(k_obs: u64, lambda: f64, error_rate: f64, kmer_len: u32) -> f64 {
    // probability a k-mer window spanning `kmer_len` bases is itself
    // error-free under the per-base error rate.
    let p_clean = (1.0 - error_rate).powi(kmer_len as i32);
    // two-component mixture: "clean" windows follow Poisson(lambda),
    // "dirty" windows follow Poisson(lambda * p_clean) (errors suppress
    // observed coverage of that exact k-mer).
    let mut sum = 0.0;
    for i in 0..=k_obs {
        sum += p_clean * poisson_pmf(i, lambda) + (1.0 - p_clean) * poisson_pmf(i, lambda * p_clean);
    }
    sum.min(1.0)
}

/// Smallest `c` such that the two-error Poisson mixture CDF exceeds
/// `target`, used by `control_fn`.
pub fn qpoismixerror(target: f64, lambda: f64, error_rate: f64, kmer_len: u32) -> i64 {
    if lambda <= 0.0 {
        return 0;
    }
    let cap = ((lambda * 50.0) as u64).max(1_000);
    for c in 0..=cap {
        if poisson_mixture_cdf(c, lambda, error_rate, kmer_len) > target {
            return c as i64;
        }
    }
    cap as i64
}

/// Bayes classifier cutoff: smallest `c` at
/// which `log(P(c | error) * prior) - log(P(c | correct)) >= 0`, i.e. the
/// log-odds of "erroneous node" over "correct node" stops favoring error,
/// capped at the expected correct-read count (`PoisClassifCutoff` in the
/// original source).
pub fn poisson_classifier_cutoff(prior_odds: f64, lambda: f64, error_rate: f64, kmer_len: u32) -> i64 {
    if lambda <= 0.0 {
        return 0;
    }
    let lambda_correct = lambda * (1.0 - error_rate).powi(kmer_len as i32);
    let cap = (lambda * 10.0).ceil() as u64 + 10;
    for c in 0..=cap {
        let log_error = poisson_mixture_cdf(c, lambda, error_rate, kmer_len).max(1e-300).ln() + prior_odds.max(1e-300).ln();
        let log_correct = poisson_pmf(c, lambda_correct).max(1e-300).ln();
        if log_error - log_correct <= 0.0 {
            return (c as i64).min(lambda.floor() as i64);
        }
    }
    lambda.floor() as i64
}

/// Ordinary least squares fit `y = a + b*x` for two equal-length series.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearModel {
    pub intercept: f64,
    pub slope: f64,
    pub n: usize,
}

impl LinearModel {
    pub fn fit(x: &[f64], y: &[f64]) -> Self {
        assert_eq!(x.len(), y.len());
        let n = x.len();
        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;
        let mut cov_xy = 0.0;
        let mut var_x = 0.0;
        for i in 0..n {
            cov_xy += (x[i] - mean_x) * (y[i] - mean_y);
            var_x += (x[i] - mean_x) * (x[i] - mean_x);
        }
        let slope = if var_x == 0.0 { 0.0 } else { cov_xy / var_x };
        let intercept = mean_y - slope * mean_x;
        Self { intercept, slope, n }
    }

    #[inline]
    pub fn fitted(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Coefficient of determination `R^2`.
    pub fn r_square(&self, x: &[f64], y: &[f64]) -> f64 {
        let mean_y = y.iter().sum::<f64>() / y.len() as f64;
        let mut ss_error = 0.0;
        let mut ss_total = 0.0;
        for i in 0..x.len() {
            ss_total += (y[i] - mean_y).powi(2);
            ss_error += (y[i] - self.fitted(x[i])).powi(2);
        }
        if ss_total == 0.0 {
            return 1.0;
        }
        1.0 - ss_error / ss_total
    }

    /// `adjR^2 = 1 - (1 - R^2) * (n - 1) / (n - k - 1)` with one predictor.
    pub fn adjusted_r_square(&self, x: &[f64], y: &[f64]) -> f64 {
        let r2 = self.r_square(x, y);
        let n = self.n as f64;
        if n <= 2.0 {
            return r2;
        }
        1.0 - (1.0 - r2) * (n - 1.0) / (n - 2.0)
    }
}
