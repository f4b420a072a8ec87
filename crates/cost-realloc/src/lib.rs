#![deny(warnings)]

//! Account-level cost reallocation engine.
//!
//! Takes a cost ledger for one plant order and redistributes cost and
//! labor-hour quantities between "site" and "factory" categories, following
//! either a discrete per-account module table or a fleet-wide
//! mass-manufacturing policy. The mode selector here reads one configuration
//! flag and routes to the matching reallocator; both paths consume the ledger
//! by value and return a new ledger together with a per-account mask of which
//! rows were touched.

mod discrete;
mod fractions;
mod mass_mfg;

pub use discrete::{apply_module_specs, discrete_realloc};
pub use fractions::{
    parse_fraction_overrides, resolve_factory_fractions, FactoryFractionMap, FractionParseError,
    DEFAULT_FACTORY_FRACTIONS,
};
pub use mass_mfg::mass_manufacture;

use cost_core::{keys, CostLedger, ModularizationMask, PlantCharacteristics, ScalarConfig};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors from the reallocation engine.
///
/// Recoverable conditions (malformed fraction overrides, absent module data)
/// never surface here; they are logged and degraded to safe no-ops close to
/// their source. What does surface is anything that would otherwise turn into
/// silently wrong financial numbers.
#[derive(Debug, Error)]
pub enum ReallocError {
    /// A scalar multiplier required on the discrete path is absent.
    #[error("missing required scalar {0:?}")]
    MissingScalar(&'static str),
    /// An efficiency divisor was zero or negative after scaling.
    #[error("offsite efficiency for {context} must be positive, got {value}")]
    NonPositiveEfficiency {
        /// Which efficiency value: a module account or the mass-mfg scalar.
        context: String,
        /// The offending value.
        value: f64,
    },
    /// Factory setup cost cannot be amortized over a non-positive volume.
    #[error("production volume must be positive to amortize factory setup cost, got {0}")]
    NonPositiveVolume(f64),
    /// Module factory costs are spread over the order count.
    #[error("order count must be at least 1 on the discrete path")]
    ZeroOrders,
    /// Module table existed but its contents were malformed.
    #[error(transparent)]
    Data(#[from] cost_data::DataError),
}

/// Reallocate one plant order's ledger.
///
/// Dispatches on the `"Enable Mass Manufacturing"` flag (default off): when
/// set, every account is shifted toward factory production using the
/// effective factory-fraction policy; otherwise the module table at
/// `module_table` drives a discrete per-account shift. Returns the rewritten
/// ledger and the modularization mask, index-aligned with the ledger rows.
pub fn reallocate(
    ledger: CostLedger,
    scalars: &ScalarConfig,
    orders: u32,
    characteristics: Option<&PlantCharacteristics>,
    module_table: &Path,
) -> Result<(CostLedger, ModularizationMask), ReallocError> {
    if scalars.flag_or(keys::ENABLE_MASS_MANUFACTURING, false) {
        info!("mass manufacturing mode enabled");
        let fractions = resolve_factory_fractions(&DEFAULT_FACTORY_FRACTIONS, characteristics);
        mass_manufacture(ledger, scalars, orders, &fractions)
    } else {
        discrete_realloc(ledger, scalars, orders, module_table)
    }
}
