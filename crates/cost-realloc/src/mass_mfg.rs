//! Fleet-wide mass-manufacturing reallocation.
//!
//! Every account is shifted toward factory production: material moves over
//! entirely, a per-account fraction of site labor moves at a factory
//! efficiency discount, and the one-time factory setup cost is amortized
//! into the first ledger row.

use crate::fractions::FactoryFractionMap;
use crate::ReallocError;
use cost_core::{keys, CostLedger, ModularizationMask, ScalarConfig};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Transportation markup applied to factory equipment cost, once per account,
/// after all additions for that account.
pub(crate) const TRANSPORT_MARKUP: f64 = 1.02;

const DEFAULT_DEGREE_OF_FACTORY_ASSEMBLY: f64 = 0.95;
const DEFAULT_MASS_MFG_EFFICIENCY: f64 = 2.5;

/// Labor-hour bookkeeping for reporting. Not part of the return contract.
#[derive(Clone, Debug, Default, PartialEq)]
struct LaborSavings {
    total_hours: f64,
    by_category: BTreeMap<String, f64>,
}

impl LaborSavings {
    fn record(&mut self, category: &str, hours: f64) {
        self.total_hours += hours;
        *self.by_category.entry(category.to_string()).or_insert(0.0) += hours;
    }

    fn emit(&self) {
        info!(total_hours = self.total_hours, "site labor hours moved to factory");
        for (category, hours) in &self.by_category {
            info!(category = %category, hours, "labor hours moved, by cost area");
        }
    }
}

/// Apply the mass-manufacturing policy to every account.
///
/// Per account: resolve the factory fraction `f` (first matching prefix in
/// `fractions`, else the `"Degree of Factory Assembly"` scalar, default
/// 0.95), move all site material and `f` of site labor — discounted by
/// `"Mass Mfg Efficiency"` (default 2.5) — into factory equipment cost,
/// scale remaining site labor and hours by `1 - f`, and mark the factory
/// total up by 2% for transportation. Afterwards `"Factory Setup Cost"`
/// divided by `"Production Volume"` (default: the order count) lands on the
/// first account only, with no markup. The mask marks every account.
pub fn mass_manufacture(
    mut ledger: CostLedger,
    scalars: &ScalarConfig,
    orders: u32,
    fractions: &FactoryFractionMap,
) -> Result<(CostLedger, ModularizationMask), ReallocError> {
    let degree = scalars.number_or(
        keys::DEGREE_OF_FACTORY_ASSEMBLY,
        DEFAULT_DEGREE_OF_FACTORY_ASSEMBLY,
    );
    let efficiency = scalars.number_or(keys::MASS_MFG_EFFICIENCY, DEFAULT_MASS_MFG_EFFICIENCY);
    if efficiency <= 0.0 || !efficiency.is_finite() {
        return Err(ReallocError::NonPositiveEfficiency {
            context: keys::MASS_MFG_EFFICIENCY.to_string(),
            value: efficiency,
        });
    }
    let setup_cost = scalars.number_or(keys::FACTORY_SETUP_COST, 0.0);
    let volume = scalars.number_or(keys::PRODUCTION_VOLUME, f64::from(orders));

    info!(
        degree_pct = degree * 100.0,
        efficiency, "applying factory assembly to all accounts"
    );

    let mut savings = LaborSavings::default();
    for entry in &mut ledger.entries {
        let f = fractions
            .resolve(entry.account.as_str())
            .unwrap_or(degree);
        let costs = &mut entry.costs;
        costs.factory_equipment_cost += costs.site_material_cost;
        let labor_to_factory = f * costs.site_labor_cost;
        costs.factory_equipment_cost += labor_to_factory / efficiency;
        costs.site_labor_cost *= 1.0 - f;
        savings.record(entry.account.category(), costs.site_labor_hours * f);
        costs.site_labor_hours *= 1.0 - f;
        costs.site_material_cost = 0.0;
        costs.factory_equipment_cost *= TRANSPORT_MARKUP;
        debug!(account = %entry.account, fraction = f, "account shifted to factory");
    }

    if setup_cost != 0.0 {
        if volume <= 0.0 || !volume.is_finite() {
            return Err(ReallocError::NonPositiveVolume(volume));
        }
        if let Some(first) = ledger.entries.first_mut() {
            first.costs.factory_equipment_cost += setup_cost / volume;
            info!(
                account = %first.account,
                setup_per_unit = setup_cost / volume,
                "factory setup cost amortized into first account"
            );
        }
    }
    savings.emit();

    let mask = ModularizationMask::complete(ledger.len());
    Ok((ledger, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cost_core::{AccountId, CostRecord};
    use proptest::prelude::*;

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

    fn mass_scalars(degree: f64, efficiency: f64) -> ScalarConfig {
        let mut scalars = ScalarConfig::new();
        scalars.set_number(keys::DEGREE_OF_FACTORY_ASSEMBLY, degree);
        scalars.set_number(keys::MASS_MFG_EFFICIENCY, efficiency);
        scalars
    }

    #[test]
    fn setup_cost_lands_on_first_account_without_markup() {
        let ledger = ledger_of(&[
            ("A.21", 0.0, 100.0, 200.0, 50.0),
            ("A.22", 0.0, 100.0, 200.0, 50.0),
        ]);
        let mut scalars = mass_scalars(0.5, 2.0);
        scalars.set_number(keys::FACTORY_SETUP_COST, 1000.0);
        scalars.set_number(keys::PRODUCTION_VOLUME, 10.0);
        let fractions = FactoryFractionMap::default();
        let (after, _) = mass_manufacture(ledger, &scalars, 1, &fractions).unwrap();
        // Both accounts transform identically; only the first gains 1000/10,
        // added after the transport markup.
        let base = 1.02 * (100.0 + 0.5 * 200.0 / 2.0);
        assert!((after.entries[0].costs.factory_equipment_cost - (base + 100.0)).abs() < 1e-9);
        assert!((after.entries[1].costs.factory_equipment_cost - base).abs() < 1e-9);
    }

    #[test]
    fn production_volume_defaults_to_order_count() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 0.0, 0.0)]);
        let mut scalars = mass_scalars(0.5, 2.0);
        scalars.set_number(keys::FACTORY_SETUP_COST, 500.0);
        let fractions = FactoryFractionMap::default();
        let (after, _) = mass_manufacture(ledger, &scalars, 5, &fractions).unwrap();
        assert!((after.entries[0].costs.factory_equipment_cost - 100.0).abs() < 1e-9);
    }

    #[test]
    fn prefix_fraction_beats_degree_fallback() {
        let ledger = ledger_of(&[
            ("A.21.01", 0.0, 0.0, 100.0, 10.0),
            ("B.50", 0.0, 0.0, 100.0, 10.0),
        ]);
        let scalars = mass_scalars(0.9, 1.0);
        let mut fractions = FactoryFractionMap::default();
        fractions.set("A.21", 0.2);
        let (after, _) = mass_manufacture(ledger, &scalars, 1, &fractions).unwrap();
        // A.21.01 resolves to 0.2; B.50 falls back to the 0.9 degree scalar.
        assert!((after.entries[0].costs.site_labor_cost - 80.0).abs() < 1e-9);
        assert!((after.entries[1].costs.site_labor_cost - 10.0).abs() < 1e-9);
    }

    #[test]
    fn mask_covers_every_account() {
        let ledger = ledger_of(&[
            ("A.21", 1.0, 1.0, 1.0, 1.0),
            ("A.22", 1.0, 1.0, 1.0, 1.0),
            ("C.1", 1.0, 1.0, 1.0, 1.0),
        ]);
        let fractions = FactoryFractionMap::default();
        let (after, mask) =
            mass_manufacture(ledger, &mass_scalars(0.5, 2.0), 1, &fractions).unwrap();
        assert_eq!(mask.count_marked(), after.len());
    }

    #[test]
    fn nonpositive_efficiency_is_fatal() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 1.0, 1.0)]);
        let fractions = FactoryFractionMap::default();
        let err = mass_manufacture(ledger, &mass_scalars(0.5, 0.0), 1, &fractions).unwrap_err();
        assert!(matches!(err, ReallocError::NonPositiveEfficiency { .. }));
    }

    #[test]
    fn setup_cost_with_zero_volume_is_fatal() {
        let ledger = ledger_of(&[("A.21", 0.0, 0.0, 1.0, 1.0)]);
        let mut scalars = mass_scalars(0.5, 2.0);
        scalars.set_number(keys::FACTORY_SETUP_COST, 100.0);
        let fractions = FactoryFractionMap::default();
        let err = mass_manufacture(ledger, &scalars, 0, &fractions).unwrap_err();
        assert!(matches!(err, ReallocError::NonPositiveVolume(_)));
    }

    #[test]
    fn savings_bucket_by_cost_area() {
        let mut savings = LaborSavings::default();
        savings.record("A.21", 10.0);
        savings.record("A.21", 5.0);
        savings.record("A.22", 2.5);
        assert_eq!(savings.total_hours, 17.5);
        assert_eq!(savings.by_category.get("A.21"), Some(&15.0));
        assert_eq!(savings.by_category.get("A.22"), Some(&2.5));
    }

    proptest! {
        #[test]
        fn conservation_per_nonfirst_account(
            fec in 0.0f64..1e6,
            smc in 0.0f64..1e6,
            slc in 0.0f64..1e6,
            slh in 0.0f64..1e4,
            degree in 0.0f64..1.0,
            efficiency in 0.5f64..5.0,
        ) {
            let ledger = ledger_of(&[
                ("A.10", 1.0, 1.0, 1.0, 1.0),
                ("Z.99", fec, smc, slc, slh),
            ]);
            let scalars = mass_scalars(degree, efficiency);
            let fractions = FactoryFractionMap::default();
            let (after, _) = mass_manufacture(ledger, &scalars, 1, &fractions).unwrap();
            let costs = &after.entries[1].costs;
            let expected = 1.02 * (fec + smc + degree * slc / efficiency);
            prop_assert!((costs.factory_equipment_cost - expected).abs() <= 1e-6 * expected.max(1.0));
            prop_assert_eq!(costs.site_material_cost, 0.0);
            prop_assert!(costs.site_labor_cost >= 0.0);
            prop_assert!(costs.site_labor_hours >= 0.0);
        }
    }
}
