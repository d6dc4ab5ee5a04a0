//! Native CMA-ES
mod cmaes;
mod covariance;
mod parameters;

pub use self::cmaes::{CmaEs, CmaEsOptions};
