// src/algorithms/linear.rs

//! Weighted linear solvers used by the surrogate fitter and the LIME explainer.
//!
//! Everything works on a design that is centred and scaled with the
//! (normalised) sample weights, so tolerances are scale-free. Fitted
//! coefficients are always mapped back to the original feature scale:
//!
//! ```text
//! z_ij = (x_ij - mean_j) / scale_j
//! eta  = b0 + sum_j b_j z_ij  =  intercept + sum_j beta_j x_ij
//! ```
//!
//! The elastic-net objective follows glmnet:
//!
//! ```text
//! 1/2 sum_i v_i (y_i - eta_i)^2 + lambda * ((1 - a)/2 ||b||^2 + a ||b||_1)
//! ```
//!
//! with `v` the weights normalised to sum to one and `a` the L1 ratio.

use crate::core::{ExplainError, Result, Stage};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Relative pivot below which a standardized Gram matrix counts as singular.
const PIVOT_TOL: f64 = 1e-10;
/// Probability clamp used in logistic deviances.
const PROB_EPS: f64 = 1e-12;

/// A fitted linear predictor on the original feature scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

impl LinearFit {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.dot(&self.coefficients) + self.intercept
    }

    pub fn nonzero(&self) -> usize {
        self.coefficients.iter().filter(|c| **c != 0.0).count()
    }
}

/// Weighted column centring and scaling.
#[derive(Debug, Clone)]
struct Standardization {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardization {
    fn to_original(&self, b0: f64, b: &Array1<f64>) -> LinearFit {
        let coefficients: Array1<f64> = b
            .iter()
            .zip(self.scale.iter())
            .map(|(bj, sj)| if *sj > 0.0 { bj / sj } else { 0.0 })
            .collect();
        let intercept = b0 - coefficients.dot(&self.mean);
        LinearFit {
            intercept,
            coefficients,
        }
    }
}

/// Weights normalised to sum to one; rejects negative or all-zero weights.
fn normalize_weights(w: &Array1<f64>) -> Result<Array1<f64>> {
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ExplainError::invalid(
            Stage::Fitting,
            "sample weights must be finite and non-negative",
        ));
    }
    let total = w.sum();
    if total <= 0.0 {
        return Err(ExplainError::invalid(Stage::Fitting, "sample weights sum to zero"));
    }
    Ok(w / total)
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() || x.nrows() != w.len() {
        return Err(ExplainError::invalid(
            Stage::Fitting,
            format!(
                "design has {} rows but {} targets and {} weights",
                x.nrows(),
                y.len(),
                w.len()
            ),
        ));
    }
    if x.nrows() == 0 {
        return Err(ExplainError::invalid(Stage::Fitting, "cannot fit on zero samples"));
    }
    Ok(())
}

fn standardize(x: &Array2<f64>, v: &Array1<f64>) -> (Array2<f64>, Standardization) {
    let mean = x.t().dot(v);
    let mut z = x - &mean;
    let var = (&z * &z).t().dot(v);
    let scale: Array1<f64> = var
        .iter()
        .zip(mean.iter())
        .map(|(var, m)| {
            let tiny = m.abs().max(1.0) * 1e-12;
            if *var > tiny * tiny {
                var.sqrt()
            } else {
                0.0
            }
        })
        .collect();
    for (mut col, s) in z.axis_iter_mut(Axis(1)).zip(scale.iter()) {
        if *s > 0.0 {
            col /= *s;
        } else {
            col.fill(0.0);
        }
    }
    (z, Standardization { mean, scale })
}

/// Weighted Gram matrix `Zᵀ diag(v) Z`.
fn gram(z: &Array2<f64>, v: &Array1<f64>) -> Array2<f64> {
    let zw = z * &v.view().insert_axis(Axis(1));
    z.t().dot(&zw)
}

/// Lower Cholesky factor; on failure returns the index of the first
/// dependent column.
fn cholesky(a: &Array2<f64>) -> std::result::Result<Array2<f64>, usize> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        let reference = a[[j, j]].abs().max(1.0);
        if !(d > PIVOT_TOL * reference) {
            return Err(j);
        }
        let ljj = d.sqrt();
        l[[j, j]] = ljj;
        for i in (j + 1)..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / ljj;
        }
    }
    Ok(l)
}

fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[[i, k]] * y[k];
        }
        y[i] = s / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut s = y[i];
        for k in (i + 1)..n {
            s -= l[[k, i]] * x[k];
        }
        x[i] = s / l[[i, i]];
    }
    x
}

/// Checks that the weighted, standardized design (plus intercept) has full
/// column rank. On failure returns the index of the first dependent column.
pub fn check_full_rank(x: &Array2<f64>, w: &Array1<f64>) -> Result<std::result::Result<(), usize>> {
    let v = normalize_weights(w)?;
    if x.ncols() == 0 {
        return Ok(Ok(()));
    }
    let (z, _) = standardize(x, &v);
    Ok(cholesky(&gram(&z, &v)).map(|_| ()))
}

/// Weighted ridge regression with an unpenalized intercept:
/// minimizes `sum_i w_i (y_i - intercept - x_i·beta)^2 + ridge * ||beta||^2`.
///
/// `ridge = 0` is plain weighted least squares and fails with `SingularFit`
/// on a rank-deficient design.
pub fn weighted_least_squares(
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
    ridge: f64,
) -> Result<LinearFit> {
    check_shapes(x, y, w)?;
    if !(ridge.is_finite() && ridge >= 0.0) {
        return Err(ExplainError::invalid(
            Stage::Fitting,
            format!("ridge penalty must be >= 0, got {}", ridge),
        ));
    }
    let total = w.sum();
    let v = normalize_weights(w)?;
    let y_mean = y.dot(&v);
    let p = x.ncols();
    if p == 0 {
        return Ok(LinearFit {
            intercept: y_mean,
            coefficients: Array1::zeros(0),
        });
    }
    let (z, standardization) = standardize(x, &v);
    let yc = y - y_mean;

    #[cfg(feature = "linalg")]
    {
        if ridge == 0.0 {
            use ndarray_linalg::LeastSquaresSvd;
            let sqrt_v = v.mapv(f64::sqrt);
            let z_w = &z * &sqrt_v.view().insert_axis(Axis(1));
            let y_w = &yc * &sqrt_v;
            let results = z_w.least_squares(&y_w).map_err(|e| {
                ExplainError::singular(Stage::Fitting, format!("SVD least squares failed: {}", e))
            })?;
            if results.rank < p as i32 {
                return Err(ExplainError::singular(
                    Stage::Fitting,
                    format!("design has rank {} but {} columns", results.rank, p),
                ));
            }
            return Ok(standardization.to_original(y_mean, &results.solution));
        }
    }

    // In standardized coordinates the penalty on beta_j becomes ridge / (total * s_j^2) on b_j.
    let mut a = gram(&z, &v);
    for j in 0..p {
        let s = standardization.scale[j];
        if s > 0.0 {
            a[[j, j]] += ridge / (total * s * s);
        } else if ridge > 0.0 {
            a[[j, j]] = 1.0;
        }
    }
    let rhs = z.t().dot(&(&yc * &v));
    let l = cholesky(&a).map_err(|j| {
        ExplainError::singular(
            Stage::Fitting,
            format!("column {} is linearly dependent on earlier columns", j),
        )
    })?;
    let b = cholesky_solve(&l, &rhs);
    Ok(standardization.to_original(y_mean, &b))
}

/// Weighted coefficient of determination of `fit` on `(x, y)`.
pub fn weighted_r2(fit: &LinearFit, x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>) -> f64 {
    let total = w.sum();
    if total <= 0.0 {
        return 0.0;
    }
    let y_mean = y.dot(w) / total;
    let residual = y - &fit.predict(x);
    let ss_res: f64 = residual.iter().zip(w.iter()).map(|(r, w)| w * r * r).sum();
    let ss_tot: f64 = y.iter().zip(w.iter()).map(|(y, w)| w * (y - y_mean) * (y - y_mean)).sum();
    if ss_tot <= f64::EPSILON * total * y_mean.abs().max(1.0) {
        return if ss_res <= f64::EPSILON * total * y_mean.abs().max(1.0) { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn sigmoid(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

/// Mean weighted cross-entropy deviance of probabilities `mu` against soft targets `y`.
fn cross_entropy(y: &Array1<f64>, mu: &Array1<f64>, v: &Array1<f64>) -> f64 {
    let mut d = 0.0;
    for ((yi, mi), vi) in y.iter().zip(mu.iter()).zip(v.iter()) {
        let m = mi.clamp(PROB_EPS, 1.0 - PROB_EPS);
        d -= 2.0 * vi * (yi * m.ln() + (1.0 - yi) * (1.0 - m).ln());
    }
    d
}

/// Share of the null deviance a logistic fit explains (soft-target McFadden R²).
pub fn deviance_explained(
    fit: &LinearFit,
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
) -> f64 {
    let v = match normalize_weights(w) {
        Ok(v) => v,
        Err(_) => return 0.0,
    };
    let mu = fit.predict(x).mapv(sigmoid);
    let y_mean = y.dot(&v);
    let null = Array1::from_elem(y.len(), y_mean);
    let saturated = cross_entropy(y, y, &v);
    let d_model = cross_entropy(y, &mu, &v) - saturated;
    let d_null = cross_entropy(y, &null, &v) - saturated;
    if d_null <= 1e-12 {
        return if d_model <= 1e-12 { 1.0 } else { 0.0 };
    }
    1.0 - d_model / d_null
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Elastic-net penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub lambda: f64,
    /// 1.0 is the lasso, 0.0 is ridge.
    pub l1_ratio: f64,
}

#[derive(Debug, Clone, Copy)]
struct Convergence {
    max_iter: usize,
    tol: f64,
}

/// Coordinate descent with an explicit intercept on a standardized design.
/// `u` are the (working) weights; `beta`, `b0` are warm starts updated in place.
fn coordinate_descent(
    z: &Array2<f64>,
    t: &Array1<f64>,
    u: &Array1<f64>,
    penalty: Penalty,
    beta: &mut Array1<f64>,
    b0: &mut f64,
    conv: Convergence,
) {
    let u_total = u.sum();
    if u_total <= 0.0 {
        return;
    }
    let col_sq = (z * z).t().dot(u);
    let l1 = penalty.lambda * penalty.l1_ratio;
    let l2 = penalty.lambda * (1.0 - penalty.l1_ratio);
    let mut residual = t - &z.dot(&*beta) - *b0;

    for _ in 0..conv.max_iter {
        let shift = residual.dot(u) / u_total;
        *b0 += shift;
        residual -= shift;
        let mut max_change = shift.abs();

        for j in 0..z.ncols() {
            if col_sq[j] <= 0.0 {
                beta[j] = 0.0;
                continue;
            }
            let col = z.column(j);
            let rho = col
                .iter()
                .zip(residual.iter())
                .zip(u.iter())
                .map(|((zij, r), ui)| ui * zij * r)
                .sum::<f64>()
                + col_sq[j] * beta[j];
            let updated = soft_threshold(rho, l1) / (col_sq[j] + l2);
            let delta = updated - beta[j];
            if delta != 0.0 {
                residual.scaled_add(-delta, &col);
                beta[j] = updated;
                max_change = max_change.max(delta.abs() * col_sq[j].sqrt());
            }
        }
        if max_change < conv.tol {
            break;
        }
    }
}

/// Penalized logistic regression on soft targets `y` in `[0, 1]` by IRLS,
/// warm-starting from `(b0, beta)`. Works in standardized coordinates.
fn irls(
    z: &Array2<f64>,
    y: &Array1<f64>,
    v: &Array1<f64>,
    penalty: Penalty,
    beta: &mut Array1<f64>,
    b0: &mut f64,
    conv: Convergence,
) {
    let mut last = f64::INFINITY;
    for _ in 0..50 {
        let eta = z.dot(&*beta) + *b0;
        let mu = eta.mapv(sigmoid);
        let deviance = cross_entropy(y, &mu, v);
        if (last - deviance).abs() <= 1e-9 * deviance.abs().max(1e-3) {
            break;
        }
        last = deviance;
        let var = mu.mapv(|m| (m * (1.0 - m)).max(1e-5));
        let working: Array1<f64> = eta
            .iter()
            .zip(y.iter())
            .zip(mu.iter())
            .zip(var.iter())
            .map(|(((e, yi), mi), vi)| e + (yi - mi) / vi)
            .collect();
        let u = v * &var;
        coordinate_descent(z, &working, &u, penalty, beta, b0, conv);
    }
}

/// Fits a single penalized logistic model on soft targets.
pub fn fit_logistic(
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
    penalty: Penalty,
) -> Result<LinearFit> {
    check_shapes(x, y, w)?;
    check_probabilities(y)?;
    let v = normalize_weights(w)?;
    let (z, standardization) = standardize(x, &v);
    let mut beta = Array1::zeros(x.ncols());
    let mut b0 = logit(y.dot(&v));
    irls(&z, y, &v, penalty, &mut beta, &mut b0, Convergence { max_iter: 1000, tol: 1e-7 });
    Ok(standardization.to_original(b0, &beta))
}

fn check_probabilities(y: &Array1<f64>) -> Result<()> {
    if y.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(ExplainError::invalid(
            Stage::Fitting,
            "logistic targets must be probabilities in [0, 1]",
        ));
    }
    Ok(())
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}

/// Response family of a regularization path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family {
    Gaussian,
    Binomial,
}

/// How the path's lambda is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LambdaSelection {
    Bic,
    Aic,
    /// Every `round(1 / fraction)`-th sample is held out and scored.
    HoldOut { fraction: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathOptions {
    pub family: Family,
    pub l1_ratio: f64,
    pub n_lambda: usize,
    pub lambda_min_ratio: f64,
    pub selection: LambdaSelection,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for PathOptions {
    fn default() -> Self {
        PathOptions {
            family: Family::Gaussian,
            l1_ratio: 0.5,
            n_lambda: 50,
            lambda_min_ratio: 1e-4,
            selection: LambdaSelection::Bic,
            max_iter: 1000,
            tol: 1e-7,
        }
    }
}

/// One point of a fitted regularization path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub lambda: f64,
    pub fit: LinearFit,
    /// Lower is better.
    pub criterion: f64,
    pub nonzero: usize,
}

/// The retained point plus the number of lambdas that were tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSelection {
    pub chosen: PathPoint,
    pub n_evaluated: usize,
}

fn lambda_sequence(
    z: &Array2<f64>,
    y: &Array1<f64>,
    v: &Array1<f64>,
    options: &PathOptions,
) -> Vec<f64> {
    let y_mean = y.dot(v);
    let yc = y - y_mean;
    let gradient = z.t().dot(&(&yc * v));
    let largest = gradient.iter().fold(0.0f64, |m, g| m.max(g.abs()));
    let lambda_max = largest / options.l1_ratio.max(1e-3);
    if lambda_max <= 0.0 || options.n_lambda == 0 {
        return Vec::new();
    }
    let steps = options.n_lambda.max(2) - 1;
    (0..options.n_lambda)
        .map(|k| lambda_max * options.lambda_min_ratio.powf(k as f64 / steps as f64))
        .collect()
}

/// Fits every lambda of the path on `(x, y, w)`, warm-starting down the path.
/// Gaussian paths end with the unpenalized fit at lambda = 0 when
/// `with_endpoint` is set.
fn fit_sequence(
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
    lambdas: &[f64],
    options: &PathOptions,
    with_endpoint: bool,
) -> Result<Vec<(f64, LinearFit)>> {
    let v = normalize_weights(w)?;
    let (z, standardization) = standardize(x, &v);
    let conv = Convergence {
        max_iter: options.max_iter,
        tol: options.tol,
    };
    let mut beta = Array1::zeros(x.ncols());
    let mut b0 = match options.family {
        Family::Gaussian => y.dot(&v),
        Family::Binomial => logit(y.dot(&v)),
    };

    let mut fits = Vec::with_capacity(lambdas.len() + 1);
    for &lambda in lambdas {
        let penalty = Penalty {
            lambda,
            l1_ratio: options.l1_ratio,
        };
        match options.family {
            Family::Gaussian => coordinate_descent(&z, y, &v, penalty, &mut beta, &mut b0, conv),
            Family::Binomial => irls(&z, y, &v, penalty, &mut beta, &mut b0, conv),
        }
        fits.push((lambda, standardization.to_original(b0, &beta)));
    }
    if with_endpoint && options.family == Family::Gaussian {
        let mut ols = weighted_least_squares(x, y, w, 0.0)?;
        prune_roundoff(&mut ols, &standardization);
        fits.push((0.0, ols));
    }
    Ok(fits)
}

/// Zeroes coefficients whose standardized size is round-off relative to the
/// largest, folding their mean contribution into the intercept.
fn prune_roundoff(fit: &mut LinearFit, standardization: &Standardization) {
    let sizes: Vec<f64> = fit
        .coefficients
        .iter()
        .zip(standardization.scale.iter())
        .map(|(c, s)| (c * s).abs())
        .collect();
    let largest = sizes.iter().cloned().fold(0.0, f64::max);
    for (j, size) in sizes.into_iter().enumerate() {
        if size <= 1e-10 * largest && fit.coefficients[j] != 0.0 {
            fit.intercept += fit.coefficients[j] * standardization.mean[j];
            fit.coefficients[j] = 0.0;
        }
    }
}

fn loss(family: Family, fit: &LinearFit, x: &Array2<f64>, y: &Array1<f64>, v: &Array1<f64>) -> f64 {
    let eta = fit.predict(x);
    match family {
        Family::Gaussian => {
            let r = y - &eta;
            (&r * &r).dot(v)
        }
        Family::Binomial => cross_entropy(y, &eta.mapv(sigmoid), v),
    }
}

fn effective_size(w: &Array1<f64>) -> f64 {
    let sum = w.sum();
    let sq = w.dot(w);
    if sq > 0.0 {
        sum * sum / sq
    } else {
        0.0
    }
}

/// Keeps `candidate` if it scores better, or ties and is sparser.
fn better(candidate: &PathPoint, best: &PathPoint) -> bool {
    let tol = 1e-9 * best.criterion.abs().max(1.0);
    if candidate.criterion < best.criterion - tol {
        return true;
    }
    candidate.criterion <= best.criterion + tol && candidate.nonzero < best.nonzero
}

/// Sweeps the elastic-net path and keeps the best lambda.
pub fn fit_path(
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
    options: &PathOptions,
) -> Result<PathSelection> {
    check_shapes(x, y, w)?;
    if options.family == Family::Binomial {
        check_probabilities(y)?;
    }
    let v = normalize_weights(w)?;
    let (z, _) = standardize(x, &v);
    let lambdas = lambda_sequence(&z, y, &v, options);

    let fits = fit_sequence(x, y, w, &lambdas, options, true)?;
    let scores: Vec<f64> = match options.selection {
        LambdaSelection::Bic | LambdaSelection::Aic => {
            let n = effective_size(w);
            let per_df = if options.selection == LambdaSelection::Bic {
                n.max(1.0).ln()
            } else {
                2.0
            };
            fits.iter()
                .map(|(_, fit)| {
                    let l = loss(options.family, fit, x, y, &v);
                    let fit_term = match options.family {
                        Family::Gaussian => n * l.max(1e-300).ln(),
                        Family::Binomial => n * l,
                    };
                    fit_term + per_df * fit.nonzero() as f64
                })
                .collect()
        }
        LambdaSelection::HoldOut { fraction } => {
            holdout_scores(x, y, w, &lambdas, options, fraction)?
        }
    };

    let mut best: Option<PathPoint> = None;
    for ((lambda, fit), criterion) in fits.into_iter().zip(scores) {
        let point = PathPoint {
            lambda,
            nonzero: fit.nonzero(),
            fit,
            criterion,
        };
        log::trace!(
            "lambda {:.3e}: criterion {:.6}, {} nonzero",
            point.lambda,
            point.criterion,
            point.nonzero
        );
        best = match best {
            Some(current) if !better(&point, &current) => Some(current),
            _ => Some(point),
        };
    }
    let n_evaluated = lambdas.len() + usize::from(options.family == Family::Gaussian);

    // Constant response: the intercept-only model is exact.
    let chosen = match best {
        Some(point) => point,
        None => PathPoint {
            lambda: 0.0,
            fit: LinearFit {
                intercept: match options.family {
                    Family::Gaussian => y.dot(&v),
                    Family::Binomial => logit(y.dot(&v)),
                },
                coefficients: Array1::zeros(x.ncols()),
            },
            criterion: 0.0,
            nonzero: 0,
        },
    };
    Ok(PathSelection { chosen, n_evaluated })
}

fn holdout_scores(
    x: &Array2<f64>,
    y: &Array1<f64>,
    w: &Array1<f64>,
    lambdas: &[f64],
    options: &PathOptions,
    fraction: f64,
) -> Result<Vec<f64>> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ExplainError::invalid(
            Stage::Fitting,
            format!("hold-out fraction must lie in (0, 1), got {}", fraction),
        ));
    }
    let every = ((1.0 / fraction).round() as usize).max(2);
    let (held, train): (Vec<usize>, Vec<usize>) = (0..x.nrows()).partition(|i| i % every == 0);
    if train.len() <= x.ncols() + 1 || held.is_empty() {
        return Err(ExplainError::invalid(
            Stage::Fitting,
            format!(
                "hold-out split leaves {} training and {} held-out samples for {} columns",
                train.len(),
                held.len(),
                x.ncols()
            ),
        ));
    }
    let x_train = x.select(Axis(0), &train);
    let y_train = y.select(Axis(0), &train);
    let w_train = w.select(Axis(0), &train);
    let x_held = x.select(Axis(0), &held);
    let y_held = y.select(Axis(0), &held);
    let v_held = normalize_weights(&w.select(Axis(0), &held))?;

    // A level seen only in held-out rows leaves the training split rank
    // deficient; the unpenalized endpoint is then unscorable, not singular.
    let endpoint_scorable = check_full_rank(&x_train, &w_train)?.is_ok();
    let fits =
        fit_sequence(&x_train, &y_train, &w_train, lambdas, options, endpoint_scorable)?;
    let mut scores: Vec<f64> = fits
        .iter()
        .map(|(_, fit)| loss(options.family, fit, &x_held, &y_held, &v_held))
        .collect();
    if options.family == Family::Gaussian && !endpoint_scorable {
        log::debug!("training split is rank deficient; lambda = 0 is not scored");
        scores.push(f64::INFINITY);
    }
    Ok(scores)
}
