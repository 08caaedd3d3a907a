//! Derivative-free minimization with the Nelder-Mead simplex method.
//!
//! Deterministic for a given objective and starting point: the initial
//! simplex is built from fixed axis steps and ties are broken by vertex
//! order. The search stops only once both the objective values and the
//! vertices themselves have come together, so a simplex straddling the
//! minimum with equal values on either side keeps contracting.

/// Tuning for [`minimize`].
#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    /// Offset of each initial vertex from the starting point.
    pub initial_step: f64,
    /// Relative spread of objective values at which the search stops.
    pub tolerance: f64,
    /// Largest distance, per coordinate, of any vertex from the best one
    /// at which the search stops.
    pub point_tolerance: f64,
    /// Iteration budget.
    pub max_iterations: usize,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            tolerance: 1e-9,
            point_tolerance: 1e-6,
            max_iterations: 4000,
        }
    }
}

/// Outcome of a minimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective value at [`Self::point`].
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the tolerance was met before the budget ran out.
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;
const TINY: f64 = 1e-12;

/// Minimizes `objective` starting from `start`.
///
/// Non-finite objective values are treated as worse than any finite
/// value. An empty `start` returns immediately.
pub fn minimize(
    objective: impl Fn(&[f64]) -> f64,
    start: &[f64],
    options: &NelderMeadOptions,
) -> Minimum {
    let dims = start.len();
    let eval = |x: &[f64]| {
        let value = objective(x);
        if value.is_finite() { value } else { f64::INFINITY }
    };

    if dims == 0 {
        return Minimum {
            point: Vec::new(),
            value: eval(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dims + 1);
    simplex.push((start.to_vec(), eval(start)));
    for axis in 0..dims {
        let mut vertex = start.to_vec();
        vertex[axis] += options.initial_step;
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let converged = loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dims].1;
        let spread = 2.0 * (worst - best).abs();
        if spread <= options.tolerance * (worst.abs() + best.abs()) + TINY
            && diameter(&simplex) <= options.point_tolerance
        {
            break true;
        }
        if iterations >= options.max_iterations {
            break false;
        }
        iterations += 1;

        let centroid = centroid(&simplex[..dims]);
        let worst_point = simplex[dims].0.clone();
        let second_worst = simplex[dims - 1].1;

        let reflected = along(&centroid, &worst_point, -REFLECT);
        let reflected_value = eval(&reflected);

        if reflected_value < best {
            let expanded = along(&centroid, &worst_point, -EXPAND);
            let expanded_value = eval(&expanded);
            simplex[dims] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < second_worst {
            simplex[dims] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < worst {
            let outside = along(&centroid, &worst_point, -CONTRACT);
            let value = eval(&outside);
            (outside, value)
        } else {
            let inside = along(&centroid, &worst_point, CONTRACT);
            let value = eval(&inside);
            (inside, value)
        };

        if contracted_value < reflected_value.min(worst) {
            simplex[dims] = (contracted, contracted_value);
            continue;
        }

        let anchor = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(&vertex.0)
                .map(|(a, v)| a + SHRINK * (v - a))
                .collect();
            let value = eval(&shrunk);
            *vertex = (shrunk, value);
        }
    };

    let (point, value) = simplex.swap_remove(0);
    Minimum {
        point,
        value,
        iterations,
        converged,
    }
}

/// Largest coordinate distance of any vertex from the first (best) one.
fn diameter(simplex: &[(Vec<f64>, f64)]) -> f64 {
    let best = &simplex[0].0;
    simplex[1..]
        .iter()
        .flat_map(|(point, _)| point.iter().zip(best).map(|(x, b)| (x - b).abs()))
        .fold(0.0, f64::max)
}

/// Mean of the given vertices.
#[allow(clippy::cast_precision_loss)]
fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dims = vertices[0].0.len();
    let mut sum = vec![0.0; dims];
    for (point, _) in vertices {
        for (s, x) in sum.iter_mut().zip(point) {
            *s += x;
        }
    }
    let count = vertices.len() as f64;
    sum.into_iter().map(|s| s / count).collect()
}

/// `centroid + coefficient * (point - centroid)`.
fn along(centroid: &[f64], point: &[f64], coefficient: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + coefficient * (p - c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_quadratic_minimum() {
        let objective = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2) + 5.0;
        let minimum = minimize(objective, &[0.0, 0.0], &NelderMeadOptions::default());

        assert!(minimum.converged);
        assert!((minimum.value - 5.0).abs() < 1e-6, "value {}", minimum.value);
        assert!((minimum.point[0] - 3.0).abs() < 1e-2, "x {}", minimum.point[0]);
        assert!((minimum.point[1] + 1.0).abs() < 1e-2, "y {}", minimum.point[1]);
    }

    #[test]
    fn minimizes_rosenbrock() {
        let objective = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let options = NelderMeadOptions {
            tolerance: 1e-14,
            ..NelderMeadOptions::default()
        };
        let minimum = minimize(objective, &[-1.2, 1.0], &options);
        assert!(minimum.value < 1e-6, "value {}", minimum.value);
    }

    #[test]
    fn flat_objective_keeps_start_point() {
        let minimum = minimize(|_| 0.0, &[0.0, 0.0, 0.0], &NelderMeadOptions::default());
        assert!(minimum.converged);
        assert!(minimum.iterations > 0, "simplex must shrink before stopping");
        assert_eq!(minimum.point, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn does_not_stop_on_equal_values_either_side_of_minimum() {
        // 0.9 and 1.1 score the same, so value spread alone would stop there.
        let objective = |x: &[f64]| 48.0f64.mul_add((1.0 - x[0]).powi(2), 1.0);
        let minimum = minimize(objective, &[0.0], &NelderMeadOptions::default());

        assert!(minimum.converged);
        assert!((minimum.point[0] - 1.0).abs() < 1e-5, "x {}", minimum.point[0]);
        assert!((minimum.value - 1.0).abs() < 1e-9, "value {}", minimum.value);
    }

    #[test]
    fn reports_exhausted_budget() {
        let objective = |x: &[f64]| (x[0] - 100.0).powi(2);
        let options = NelderMeadOptions {
            max_iterations: 3,
            ..NelderMeadOptions::default()
        };
        let minimum = minimize(objective, &[0.0], &options);
        assert!(!minimum.converged);
        assert_eq!(minimum.iterations, 3);
    }

    #[test]
    fn avoids_non_finite_regions() {
        let objective = |x: &[f64]| {
            if x[0] < 0.0 {
                f64::NAN
            } else {
                (x[0] - 0.5).powi(2)
            }
        };
        let minimum = minimize(objective, &[0.2], &NelderMeadOptions::default());
        assert!(minimum.value.is_finite());
        assert!((minimum.point[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn is_deterministic() {
        let objective = |x: &[f64]| (x[0] - 1.0).powi(4) + (x[0] * x[1] - 2.0).powi(2);
        let a = minimize(objective, &[0.5, 0.5], &NelderMeadOptions::default());
        let b = minimize(objective, &[0.5, 0.5], &NelderMeadOptions::default());
        assert_eq!(a, b);
    }
}
