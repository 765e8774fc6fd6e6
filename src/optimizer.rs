use anyhow::Result;
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// Adam on parameter-shift gradients.
    #[default]
    Adam,
    /// Derivative-free simplex search.
    NelderMead,
}

/// Adaptive moment estimation with bias correction.
#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Updates `params` in place from `gradient`.
    pub fn step(&mut self, params: &mut [f64], gradient: &[f64]) -> Result<()> {
        if params.len() != gradient.len() {
            return Err(anyhow::anyhow!(
                "Gradient has {} entries but there are {} parameters",
                gradient.len(),
                params.len()
            ));
        }
        if self.m.len() != params.len() {
            self.m = vec![0.0; params.len()];
            self.v = vec![0.0; params.len()];
            self.t = 0;
        }

        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);

        for (i, (param, &g)) in params.iter_mut().zip(gradient).enumerate() {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;
            *param -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }

        Ok(())
    }
}

/// Runs `iterations` Nelder-Mead steps from a simplex of `start` and
/// `start + edge·e_k`, returning the best point found.
pub fn nelder_mead<P>(problem: P, start: &[f64], edge: f64, iterations: u64) -> Result<Vec<f64>>
where
    P: CostFunction<Param = Vec<f64>, Output = f64>,
{
    let mut simplex = vec![start.to_vec()];
    for k in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[k] += edge;
        simplex.push(vertex);
    }

    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex);
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(iterations))
        .run()?;

    let best = res
        .state
        .get_best_param()
        .ok_or_else(|| anyhow::anyhow!("No best parameter found in the optimization result"))?;
    Ok(best.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    struct Bowl;

    impl CostFunction for Bowl {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, p: &Self::Param) -> Result<Self::Output> {
            Ok((p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2))
        }
    }

    #[test]
    fn test_first_adam_step_moves_by_learning_rate() -> Result<()> {
        // bias correction makes the first step lr·sign(g)
        let mut adam = Adam::new(0.1);
        let mut params = vec![1.0, -2.0];
        adam.step(&mut params, &[0.5, -3.0])?;

        assert_approx_eq!(0.9, params[0], 1e-6);
        assert_approx_eq!(-1.9, params[1], 1e-6);
        Ok(())
    }

    #[test]
    fn test_adam_minimises_quadratic() -> Result<()> {
        let mut adam = Adam::new(0.1);
        let mut x = vec![0.0];
        for _ in 0..1000 {
            let gradient = vec![2.0 * (x[0] - 3.0)];
            adam.step(&mut x, &gradient)?;
        }
        assert_approx_eq!(3.0, x[0], 5e-2);
        Ok(())
    }

    #[test]
    fn test_adam_rejects_mismatched_gradient() {
        let mut adam = Adam::new(0.1);
        assert!(adam.step(&mut [0.0, 0.0], &[1.0]).is_err());
    }

    #[test]
    fn test_nelder_mead_improves_cost() -> Result<()> {
        let start = vec![0.0, 0.0];
        let best = nelder_mead(Bowl, &start, 0.5, 200)?;

        assert!(Bowl.cost(&best)? < Bowl.cost(&start)?);
        assert_approx_eq!(3.0, best[0], 5e-2);
        assert_approx_eq!(-1.0, best[1], 5e-2);
        Ok(())
    }
}
