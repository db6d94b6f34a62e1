use serde::{Deserialize, Serialize};

/// A skill estimate: mean `mu` with uncertainty `sigma`.
///
/// Used both as the prior fed into a computation and as the posterior stored
/// on a membership once its game has been recalculated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub mu: f64,
    pub sigma: f64
}

impl Rating {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Rating { mu, sigma }
    }

    /// Widens the spread by the drift constant: `sqrt(sigma^2 + tau^2)`.
    pub fn with_drift(self, tau: f64) -> Self {
        Rating {
            mu: self.mu,
            sigma: (self.sigma.powi(2) + tau.powi(2)).sqrt()
        }
    }

    /// Moves `weight` of the way from this rating towards `target`.
    /// A weight of 1 yields `target`, a weight of 0 yields `self`.
    pub fn interpolate(self, target: Rating, weight: f64) -> Self {
        Rating {
            mu: self.mu + weight * (target.mu - self.mu),
            sigma: self.sigma + weight * (target.sigma - self.sigma)
        }
    }

    pub fn is_finite(&self) -> bool {
        self.mu.is_finite() && self.sigma.is_finite()
    }
}
