//! Discrete per-module reallocation.
//!
//! Each module specification row names an account-code prefix; every ledger
//! account under that prefix has its material and a fraction of its labor
//! moved to the factory, and the account matching the row exactly absorbs
//! the module's amortized factory cost.

use crate::mass_mfg::TRANSPORT_MARKUP;
use crate::ReallocError;
use cost_core::{keys, CostLedger, ModularizationMask, ScalarConfig};
use cost_data::ModuleSpec;
use std::path::Path;
use tracing::{info, warn};

struct ModuleMultipliers {
    factory_cost: f64,
    offsite_work: f64,
    offsite_efficiency: f64,
}

/// The three multipliers are required before any file I/O: their absence
/// would silently mis-scale every module row, so it propagates instead of
/// degrading to a no-op like a missing table does.
fn required_multipliers(scalars: &ScalarConfig) -> Result<ModuleMultipliers, ReallocError> {
    let require = |key: &'static str| scalars.number(key).ok_or(ReallocError::MissingScalar(key));
    Ok(ModuleMultipliers {
        factory_cost: require(keys::FACTORY_COST_MULT)?,
        offsite_work: require(keys::OFFSITE_WORK_MULT)?,
        offsite_efficiency: require(keys::OFFSITE_EFFICIENCY_MULT)?,
    })
}

/// Reallocate using the module specification table at `module_table`.
///
/// When no module data is available (missing file or missing `Modules`
/// sheet) the ledger passes through unchanged under an all-false mask; a
/// table that exists but is malformed propagates as an error.
pub fn discrete_realloc(
    ledger: CostLedger,
    scalars: &ScalarConfig,
    orders: u32,
    module_table: &Path,
) -> Result<(CostLedger, ModularizationMask), ReallocError> {
    let multipliers = required_multipliers(scalars)?;
    match cost_data::load_module_table(module_table)? {
        Some(specs) => apply_rows(ledger, &specs, &multipliers, orders),
        None => {
            warn!(
                path = %module_table.display(),
                "no module data available, skipping reallocation"
            );
            let mask = ModularizationMask::empty(ledger.len());
            Ok((ledger, mask))
        }
    }
}

/// Apply already-loaded module rows to the ledger.
///
/// Split out from [`discrete_realloc`] so callers holding an in-memory table
/// (tests, benches) skip the file boundary; reads the same three multiplier
/// scalars.
pub fn apply_module_specs(
    ledger: CostLedger,
    specs: &[ModuleSpec],
    scalars: &ScalarConfig,
    orders: u32,
) -> Result<(CostLedger, ModularizationMask), ReallocError> {
    let multipliers = required_multipliers(scalars)?;
    apply_rows(ledger, specs, &multipliers, orders)
}

fn apply_rows(
    mut ledger: CostLedger,
    specs: &[ModuleSpec],
    multipliers: &ModuleMultipliers,
    orders: u32,
) -> Result<(CostLedger, ModularizationMask), ReallocError> {
    if orders == 0 {
        return Err(ReallocError::ZeroOrders);
    }
    let mut mask = ModularizationMask::empty(ledger.len());
    let mut labor_savings = 0.0;

    for spec in specs {
        let offsite_work = spec.percent_offsite_work * multipliers.offsite_work;
        let offsite_efficiency = spec.offsite_efficiency * multipliers.offsite_efficiency;
        if offsite_efficiency <= 0.0 || !offsite_efficiency.is_finite() {
            return Err(ReallocError::NonPositiveEfficiency {
                context: spec.account.clone(),
                value: offsite_efficiency,
            });
        }
        let factory_cost = spec.factory_cost_usd * multipliers.factory_cost;
        info!(module = %spec.account, offsite_work, "modularizing account group");

        let mut hours_matched = 0.0;
        for (index, entry) in ledger.entries.iter_mut().enumerate() {
            if !entry.account.as_str().starts_with(spec.account.as_str()) {
                continue;
            }
            let costs = &mut entry.costs;
            costs.factory_equipment_cost += costs.site_material_cost;
            costs.factory_equipment_cost += offsite_work / offsite_efficiency * costs.site_labor_cost;
            costs.site_labor_cost *= 1.0 - offsite_work;
            hours_matched += costs.site_labor_hours;
            costs.site_labor_hours *= 1.0 - offsite_work;
            costs.site_material_cost = 0.0;
            costs.factory_equipment_cost *= TRANSPORT_MARKUP;
            mask.mark(index);
        }
        labor_savings += hours_matched * (1.0 - offsite_work);

        // The module's own factory cost lands on the exact-match account
        // only, amortized over the fleet, after the transport markup.
        if let Some(exact) = ledger
            .entries
            .iter_mut()
            .find(|e| e.account.as_str() == spec.account)
        {
            exact.costs.factory_equipment_cost += factory_cost / f64::from(orders);
        }
    }

    info!(labor_savings, modularized = mask.count_marked(), "modularization pass complete");
    Ok((ledger, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cost_core::{AccountId, CostRecord};

    fn ledger_of(rows: &[(&str, f64, f64, f64, f64)]) -> CostLedger {
        let mut ledger = CostLedger::new();
        for (id, fec, smc, slc, slh) in rows {
            ledger.push(
                AccountId(id.to_string()),
                CostRecord {
                    factory_equipment_cost: *fec,
                    site_material_cost: *smc,
                    site_labor_cost: *slc,
                    site_labor_hours: *slh,
                },
            );
        }
        ledger
    }

    fn unit_multipliers() -> ScalarConfig {
        let mut scalars = ScalarConfig::new();
        scalars.set_number(keys::FACTORY_COST_MULT, 1.0);
        scalars.set_number(keys::OFFSITE_WORK_MULT, 1.0);
        scalars.set_number(keys::OFFSITE_EFFICIENCY_MULT, 1.0);
        scalars
    }

    fn spec(account: &str, cost: f64, work: f64, efficiency: f64) -> ModuleSpec {
        ModuleSpec {
            account: account.to_string(),
            factory_cost_usd: cost,
            percent_offsite_work: work,
            offsite_efficiency: efficiency,
        }
    }

    #[test]
    fn missing_multiplier_is_fatal_before_file_io() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 0.0, 0.0)]);
        let mut scalars = ScalarConfig::new();
        scalars.set_number(keys::FACTORY_COST_MULT, 1.0);
        scalars.set_number(keys::OFFSITE_WORK_MULT, 1.0);
        // "Offsite efficiency mult" absent: must fail even though the module
        // file also does not exist.
        let err = discrete_realloc(ledger, &scalars, 10, Path::new("absent.xlsx")).unwrap_err();
        assert!(matches!(
            err,
            ReallocError::MissingScalar(key) if key == keys::OFFSITE_EFFICIENCY_MULT
        ));
    }

    #[test]
    fn missing_table_passes_ledger_through() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_of(&[("A.21", 5.0, 6.0, 7.0, 8.0)]);
        let before = ledger.clone();
        let (after, mask) = discrete_realloc(
            ledger,
            &unit_multipliers(),
            10,
            &dir.path().join("absent.xlsx"),
        )
        .unwrap();
        assert_eq!(after, before);
        assert_eq!(mask.count_marked(), 0);
        assert_eq!(mask.len(), after.len());
    }

    #[test]
    fn prefix_rows_transform_matching_accounts_only() {
        let ledger = ledger_of(&[
            ("A.21.01", 0.0, 100.0, 100.0, 10.0),
            ("A.21.02", 0.0, 50.0, 200.0, 20.0),
            ("A.22", 0.0, 40.0, 40.0, 4.0),
        ]);
        let specs = [spec("A.21", 0.0, 0.5, 2.0)];
        let (after, mask) =
            apply_module_specs(ledger, &specs, &unit_multipliers(), 10).unwrap();

        // A.21.01: 1.02 * (0 + 100 + 0.5/2.0 * 100) = 1.02 * 125
        let first = &after.entries[0].costs;
        assert!((first.factory_equipment_cost - 1.02 * 125.0).abs() < 1e-9);
        assert!((first.site_labor_cost - 50.0).abs() < 1e-9);
        assert!((first.site_labor_hours - 5.0).abs() < 1e-9);
        assert_eq!(first.site_material_cost, 0.0);

        // A.22 does not match the prefix and is untouched.
        let third = &after.entries[2].costs;
        assert_eq!(third.site_material_cost, 40.0);
        assert!(mask.is_marked(0) && mask.is_marked(1) && !mask.is_marked(2));
    }

    #[test]
    fn exact_match_account_absorbs_amortized_factory_cost() {
        let ledger = ledger_of(&[
            ("A.21", 0.0, 0.0, 0.0, 0.0),
            ("A.21.01", 0.0, 0.0, 0.0, 0.0),
        ]);
        let specs = [spec("A.21", 1000.0, 0.0, 1.0)];
        let (after, _) = apply_module_specs(ledger, &specs, &unit_multipliers(), 10).unwrap();
        // Only the exact "A.21" row gains 1000/10, after the markup (here a
        // no-op on a zero balance).
        assert!((after.entries[0].costs.factory_equipment_cost - 100.0).abs() < 1e-9);
        assert_eq!(after.entries[1].costs.factory_equipment_cost, 0.0);
    }

    #[test]
    fn multipliers_scale_row_quantities() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 100.0, 10.0)]);
        let mut scalars = ScalarConfig::new();
        scalars.set_number(keys::FACTORY_COST_MULT, 2.0);
        scalars.set_number(keys::OFFSITE_WORK_MULT, 0.5);
        scalars.set_number(keys::OFFSITE_EFFICIENCY_MULT, 2.0);
        let specs = [spec("A.21", 500.0, 0.8, 1.0)];
        let (after, _) = apply_module_specs(ledger, &specs, &scalars, 10).unwrap();
        let costs = &after.entries[0].costs;
        // work = 0.8*0.5 = 0.4, efficiency = 1.0*2.0 = 2.0, cost = 500*2 = 1000
        let expected = 1.02 * (0.4 / 2.0 * 100.0) + 1000.0 / 10.0;
        assert!((costs.factory_equipment_cost - expected).abs() < 1e-9);
        assert!((costs.site_labor_cost - 60.0).abs() < 1e-9);
        assert!((costs.site_labor_hours - 6.0).abs() < 1e-9);
    }

    #[test]
    fn mask_ors_across_overlapping_rows() {
        let ledger = ledger_of(&[
            ("A.21.01", 0.0, 10.0, 10.0, 1.0),
            ("A.22", 0.0, 10.0, 10.0, 1.0),
        ]);
        let specs = [spec("A.21", 0.0, 0.1, 1.0), spec("A.2", 0.0, 0.1, 1.0)];
        let (_, mask) = apply_module_specs(ledger, &specs, &unit_multipliers(), 10).unwrap();
        // A.21.01 is covered by both rows, A.22 by the second only.
        assert!(mask.is_marked(0) && mask.is_marked(1));
        assert_eq!(mask.count_marked(), 2);
    }

    #[test]
    fn nonpositive_row_efficiency_is_fatal() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 1.0, 1.0)]);
        let specs = [spec("A.21", 0.0, 0.5, 0.0)];
        let err = apply_module_specs(ledger, &specs, &unit_multipliers(), 10).unwrap_err();
        assert!(matches!(
            err,
            ReallocError::NonPositiveEfficiency { context, .. } if context == "A.21"
        ));
    }

    #[test]
    fn zero_orders_is_fatal() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 0.0, 0.0)]);
        let specs = [spec("A.21", 100.0, 0.0, 1.0)];
        let err = apply_module_specs(ledger, &specs, &unit_multipliers(), 0).unwrap_err();
        assert!(matches!(err, ReallocError::ZeroOrders));
    }

    #[test]
    fn regex_metacharacters_in_patterns_are_literal() {
        // "A.21" must not match "AX21..." the way a regex dot would.
        let ledger = ledger_of(&[("AX21.01", 0.0, 10.0, 10.0, 1.0)]);
        let specs = [spec("A.21", 0.0, 0.5, 1.0)];
        let (after, mask) = apply_module_specs(ledger, &specs, &unit_multipliers(), 10).unwrap();
        assert_eq!(after.entries[0].costs.site_material_cost, 10.0);
        assert_eq!(mask.count_marked(), 0);
    }
}
