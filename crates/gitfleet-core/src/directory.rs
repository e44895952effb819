//! Project Directory contract.

use crate::error::FleetResult;
use crate::project::Project;

/// Resolves requested project names or paths to concrete [`Project`] records.
///
/// An empty `names` slice selects every project. The returned order is the
/// selection order used for the whole run.
pub trait ProjectDirectory {
    fn resolve(&self, names: &[String], allow_missing: bool) -> FleetResult<Vec<Project>>;
}
