#![deny(warnings)]

//! Headless CLI for the plant cost model: loads a basis ledger and policy
//! inputs, runs the cost reallocation engine once per Monte Carlo run, and
//! reports per-run totals.

mod sampling;

use anyhow::{bail, Context, Result};
use cost_core::{CostLedger, ModularizationMask, ScalarConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    plant: String,
    basis: PathBuf,
    modules: PathBuf,
    scalars: Option<PathBuf>,
    characteristics: Option<PathBuf>,
    orders: u32,
    runs: u32,
    seed: u64,
    noise: f64,
    out: Option<PathBuf>,
}

const USAGE: &str = "usage: plantcost <plant> [--basis FILE] [--modules FILE] \
[--scalars FILE] [--chars FILE] [--orders N] [--runs N] [--seed N] [--noise F] [--out FILE]";

fn parse_args() -> Result<Args> {
    let mut plant: Option<String> = None;
    let mut basis: Option<PathBuf> = None;
    let mut modules: Option<PathBuf> = None;
    let mut scalars: Option<PathBuf> = None;
    let mut characteristics: Option<PathBuf> = None;
    let mut orders: u32 = 10;
    let mut runs: u32 = 1;
    let mut seed: u64 = 42;
    let mut noise: f64 = 0.0;
    let mut out: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--basis" => basis = it.next().map(PathBuf::from),
            "--modules" => modules = it.next().map(PathBuf::from),
            "--scalars" => scalars = it.next().map(PathBuf::from),
            "--chars" => characteristics = it.next().map(PathBuf::from),
            "--orders" => orders = it.next().and_then(|s| s.parse().ok()).unwrap_or(orders),
            "--runs" => runs = it.next().and_then(|s| s.parse().ok()).unwrap_or(runs),
            "--seed" => seed = it.next().and_then(|s| s.parse().ok()).unwrap_or(seed),
            "--noise" => noise = it.next().and_then(|s| s.parse().ok()).unwrap_or(noise),
            "--out" => out = it.next().map(PathBuf::from),
            other if !other.starts_with('-') && plant.is_none() => plant = Some(other.to_string()),
            other => bail!("unrecognized argument {other:?}\n{USAGE}"),
        }
    }
    let Some(plant) = plant else {
        bail!("{USAGE}");
    };
    if !(0.0..1.0).contains(&noise) {
        bail!("--noise must be in [0, 1)");
    }

    let data_dir = PathBuf::from("data");
    Ok(Args {
        basis: basis.unwrap_or_else(|| data_dir.join(format!("basis_{plant}.csv"))),
        modules: modules.unwrap_or_else(|| data_dir.join(format!("inputfile_{plant}.xlsx"))),
        plant,
        scalars,
        characteristics,
        orders,
        runs,
        seed,
        noise,
        out,
    })
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args()?;
    info!(plant = %args.plant, git_sha = env!("GIT_SHA"), "starting plant cost model");

    let template = cost_data::load_ledger_csv(&args.basis)
        .with_context(|| format!("loading basis ledger {}", args.basis.display()))?;
    info!(accounts = template.len(), "basis ledger loaded");

    let scalars = match &args.scalars {
        Some(path) => cost_data::load_scalars_json(path)
            .with_context(|| format!("loading scalar configuration {}", path.display()))?,
        None => ScalarConfig::new(),
    };
    let characteristics = args
        .characteristics
        .as_ref()
        .map(|path| {
            cost_data::load_characteristics_json(path)
                .with_context(|| format!("loading plant characteristics {}", path.display()))
        })
        .transpose()?;

    let mut last: Option<(CostLedger, ModularizationMask)> = None;
    for run in 0..args.runs {
        let run_scalars = sampling::perturb_multipliers(&scalars, args.noise, args.seed, run);
        let (ledger, mask) = cost_realloc::reallocate(
            template.clone(),
            &run_scalars,
            args.orders,
            characteristics.as_ref(),
            &args.modules,
        )
        .with_context(|| format!("reallocating run {run}"))?;
        println!(
            "Run {run} | factory: ${:.0} | site: ${:.0} | site hours: {:.0} | modularized: {}/{}",
            ledger.total_factory_cost(),
            ledger.total_site_cost(),
            ledger.total_site_hours(),
            mask.count_marked(),
            ledger.len()
        );
        last = Some((ledger, mask));
    }

    if let (Some(out), Some((ledger, _))) = (&args.out, &last) {
        cost_data::write_ledger_csv(out, ledger)
            .with_context(|| format!("writing reallocated ledger {}", out.display()))?;
        info!(path = %out.display(), "reallocated ledger written");
    }

    Ok(())
}
