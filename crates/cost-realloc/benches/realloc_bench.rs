use cost_core::{keys, AccountId, CostLedger, CostRecord, ScalarConfig};
use cost_data::ModuleSpec;
use cost_realloc::{
    apply_module_specs, mass_manufacture, FactoryFractionMap, DEFAULT_FACTORY_FRACTIONS,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_ledger(n_accounts: usize) -> CostLedger {
    let mut ledger = CostLedger::new();
    for i in 0..n_accounts {
        ledger.push(
            AccountId(format!("A.2{}.{:03}", i % 6 + 1, i)),
            CostRecord {
                factory_equipment_cost: 1_000.0 + i as f64,
                site_material_cost: 2_000.0,
                site_labor_cost: 3_000.0,
                site_labor_hours: 120.0,
            },
        );
    }
    ledger
}

fn bench_mass_mfg(c: &mut Criterion) {
    let ledger = build_ledger(500);
    let mut scalars = ScalarConfig::new();
    scalars.set_number(keys::DEGREE_OF_FACTORY_ASSEMBLY, 0.9);
    scalars.set_number(keys::FACTORY_SETUP_COST, 1_000_000.0);
    let fractions = FactoryFractionMap::from_defaults(&DEFAULT_FACTORY_FRACTIONS);
    c.bench_function("mass mfg 500 accounts", |b| {
        b.iter(|| {
            let out = mass_manufacture(ledger.clone(), &scalars, 10, &fractions);
            let _ = black_box(out);
        })
    });
}

fn bench_discrete(c: &mut Criterion) {
    let ledger = build_ledger(500);
    let mut scalars = ScalarConfig::new();
    scalars.set_number(keys::FACTORY_COST_MULT, 1.0);
    scalars.set_number(keys::OFFSITE_WORK_MULT, 1.0);
    scalars.set_number(keys::OFFSITE_EFFICIENCY_MULT, 1.0);
    let specs: Vec<ModuleSpec> = (1..=6)
        .map(|i| ModuleSpec {
            account: format!("A.2{i}"),
            factory_cost_usd: 500_000.0,
            percent_offsite_work: 0.6,
            offsite_efficiency: 1.4,
        })
        .collect();
    c.bench_function("discrete 6 modules x 500 accounts", |b| {
        b.iter(|| {
            let out = apply_module_specs(ledger.clone(), &specs, &scalars, 10);
            let _ = black_box(out);
        })
    });
}

criterion_group!(benches, bench_mass_mfg, bench_discrete);
criterion_main!(benches);
