#![deny(warnings)]

//! External table loading for the plant cost model.
//!
//! Three kinds of inputs cross this boundary: the module specification table
//! (`.xlsx` workbook with a `Modules` sheet, or a `.csv` with the same
//! headers), the basis cost ledger CSV, and flat JSON files for scalar
//! configuration and plant characteristics.
//!
//! Module-table loading distinguishes "no module data available" — a missing
//! file or missing `Modules` sheet, reported as `Ok(None)` so callers can
//! fall back to a no-op reallocation — from malformed data, which is a typed
//! error: silently treating a corrupt table as absent would hide wrong
//! financial numbers.

use calamine::{open_workbook, Data, Reader, Xlsx};
use cost_core::{validate_ledger, AccountId, CostLedger, CostRecord, PlantCharacteristics, ScalarConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Sheet holding the module specification table in workbook inputs.
pub const MODULES_SHEET: &str = "Modules";

const COL_ACCOUNT: &str = "Account";
const COL_FACTORY_COST: &str = "Factory Cost (2018 USD)";
const COL_OFFSITE_WORK: &str = "Percent Offsite Work";
const COL_OFFSITE_EFFICIENCY: &str = "Offsite Efficiency";

/// One module specification row: an account prefix pattern and the raw
/// (unscaled) cost/work/efficiency quantities for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Account prefix the row applies to, e.g. "A.21".
    pub account: String,
    /// Factory cost for the module, unscaled.
    pub factory_cost_usd: f64,
    /// Fraction of site labor moved offsite, unscaled.
    pub percent_offsite_work: f64,
    /// Offsite labor efficiency divisor, unscaled.
    pub offsite_efficiency: f64,
}

/// Errors from external table loading.
#[derive(Debug, Error)]
pub enum DataError {
    /// Underlying file read failed for a file that exists.
    #[error("i/o error reading {path}: {source}")]
    Io {
        /// Offending file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Module tables are `.xlsx` or `.csv` only.
    #[error("unsupported module table format {extension:?} for {path}")]
    UnsupportedFormat {
        /// Offending file.
        path: String,
        /// Extension that was not recognized.
        extension: String,
    },
    /// Workbook exists but could not be opened or read.
    #[error("unreadable workbook {path}: {detail}")]
    Workbook {
        /// Offending file.
        path: String,
        /// Parser detail.
        detail: String,
    },
    /// A required column header is absent.
    #[error("module table {path} is missing column {column:?}")]
    MissingColumn {
        /// Offending file.
        path: String,
        /// Missing header.
        column: &'static str,
    },
    /// A cell could not be read as the required number.
    #[error("malformed value {value:?} for column {column:?} in {path}")]
    MalformedCell {
        /// Offending file.
        path: String,
        /// Column the cell belongs to.
        column: &'static str,
        /// Raw cell text.
        value: String,
    },
    /// CSV structure error (ragged rows, bad quoting, bad field types).
    #[error("csv error in {path}: {detail}")]
    Csv {
        /// Offending file.
        path: String,
        /// Parser detail.
        detail: String,
    },
    /// JSON configuration file did not deserialize.
    #[error("malformed JSON in {path}: {detail}")]
    Json {
        /// Offending file.
        path: String,
        /// Parser detail.
        detail: String,
    },
    /// Loaded ledger violated a domain invariant.
    #[error(transparent)]
    InvalidLedger(#[from] cost_core::ValidationError),
}

fn io_err(path: &Path, source: std::io::Error) -> DataError {
    DataError::Io { path: path.display().to_string(), source }
}

/// Load the module specification table.
///
/// Returns `Ok(None)` when no module data is available (file absent, or a
/// workbook without a `Modules` sheet); any structural or numeric defect in
/// data that *is* present propagates as an error.
pub fn load_module_table(path: &Path) -> Result<Option<Vec<ModuleSpec>>, DataError> {
    if !path.exists() {
        warn!(path = %path.display(), "module table not found");
        return Ok(None);
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match extension.as_str() {
        "xlsx" => load_module_table_xlsx(path),
        "csv" => load_module_table_csv(path).map(Some),
        _ => Err(DataError::UnsupportedFormat { path: path.display().to_string(), extension }),
    }
}

fn load_module_table_xlsx(path: &Path) -> Result<Option<Vec<ModuleSpec>>, DataError> {
    let mut workbook: Xlsx<std::io::BufReader<File>> = open_workbook(path).map_err(|e: calamine::XlsxError| DataError::Workbook {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    if !workbook.sheet_names().iter().any(|s| s == MODULES_SHEET) {
        warn!(path = %path.display(), sheet = MODULES_SHEET, "workbook has no module sheet");
        return Ok(None);
    }
    let range = workbook
        .worksheet_range(MODULES_SHEET)
        .map_err(|e| DataError::Workbook {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(DataError::MissingColumn {
        path: path.display().to_string(),
        column: COL_ACCOUNT,
    })?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let col = |name: &'static str| -> Result<usize, DataError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(DataError::MissingColumn { path: path.display().to_string(), column: name })
    };
    let i_account = col(COL_ACCOUNT)?;
    let i_cost = col(COL_FACTORY_COST)?;
    let i_work = col(COL_OFFSITE_WORK)?;
    let i_eff = col(COL_OFFSITE_EFFICIENCY)?;

    let mut specs = Vec::new();
    for row in rows {
        let account = row
            .get(i_account)
            .map(|c| c.to_string().trim().to_string())
            .unwrap_or_default();
        if account.is_empty() {
            continue;
        }
        specs.push(ModuleSpec {
            account,
            factory_cost_usd: number_cell(path, row, i_cost, COL_FACTORY_COST)?,
            percent_offsite_work: number_cell(path, row, i_work, COL_OFFSITE_WORK)?,
            offsite_efficiency: number_cell(path, row, i_eff, COL_OFFSITE_EFFICIENCY)?,
        });
    }
    Ok(Some(specs))
}

fn number_cell(
    path: &Path,
    row: &[Data],
    index: usize,
    column: &'static str,
) -> Result<f64, DataError> {
    let parsed = match row.get(index) {
        Some(Data::Float(f)) => Some(*f),
        Some(Data::Int(i)) => Some(*i as f64),
        Some(Data::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(DataError::MalformedCell {
            path: path.display().to_string(),
            column,
            value: row.get(index).map(|c| c.to_string()).unwrap_or_default(),
        }),
    }
}

fn load_module_table_csv(path: &Path) -> Result<Vec<ModuleSpec>, DataError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::Csv { path: path.display().to_string(), detail: e.to_string() })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let col = |name: &'static str| -> Result<usize, DataError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(DataError::MissingColumn { path: path.display().to_string(), column: name })
    };
    let i_account = col(COL_ACCOUNT)?;
    let i_cost = col(COL_FACTORY_COST)?;
    let i_work = col(COL_OFFSITE_WORK)?;
    let i_eff = col(COL_OFFSITE_EFFICIENCY)?;

    let mut specs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DataError::Csv {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let account = record.get(i_account).unwrap_or("").trim().to_string();
        if account.is_empty() {
            continue;
        }
        let field = |index: usize, column: &'static str| -> Result<f64, DataError> {
            let raw = record.get(index).unwrap_or("").trim();
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(DataError::MalformedCell {
                    path: path.display().to_string(),
                    column,
                    value: raw.to_string(),
                }),
            }
        };
        specs.push(ModuleSpec {
            account,
            factory_cost_usd: field(i_cost, COL_FACTORY_COST)?,
            percent_offsite_work: field(i_work, COL_OFFSITE_WORK)?,
            offsite_efficiency: field(i_eff, COL_OFFSITE_EFFICIENCY)?,
        });
    }
    Ok(specs)
}

#[derive(Serialize, Deserialize)]
struct LedgerCsvRow {
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Factory Equipment Cost")]
    factory_equipment_cost: f64,
    #[serde(rename = "Site Material Cost")]
    site_material_cost: f64,
    #[serde(rename = "Site Labor Cost")]
    site_labor_cost: f64,
    #[serde(rename = "Site Labor Hours")]
    site_labor_hours: f64,
}

/// Load a basis cost ledger from CSV and validate its invariants.
pub fn load_ledger_csv(path: &Path) -> Result<CostLedger, DataError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let mut ledger = CostLedger::new();
    for row in reader.deserialize::<LedgerCsvRow>() {
        let row = row.map_err(|e| DataError::Csv {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        ledger.push(
            AccountId(row.account.trim().to_string()),
            CostRecord {
                factory_equipment_cost: row.factory_equipment_cost,
                site_material_cost: row.site_material_cost,
                site_labor_cost: row.site_labor_cost,
                site_labor_hours: row.site_labor_hours,
            },
        );
    }
    validate_ledger(&ledger)?;
    Ok(ledger)
}

/// Write a reallocated ledger back out as CSV, same columns as the basis file.
pub fn write_ledger_csv(path: &Path, ledger: &CostLedger) -> Result<(), DataError> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    for entry in &ledger.entries {
        writer
            .serialize(LedgerCsvRow {
                account: entry.account.as_str().to_string(),
                factory_equipment_cost: entry.costs.factory_equipment_cost,
                site_material_cost: entry.costs.site_material_cost,
                site_labor_cost: entry.costs.site_labor_cost,
                site_labor_hours: entry.costs.site_labor_hours,
            })
            .map_err(|e| DataError::Csv {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
    }
    writer
        .flush()
        .map_err(|e| io_err(path, e))
}

/// Load a scalar configuration from a flat JSON object.
pub fn load_scalars_json(path: &Path) -> Result<ScalarConfig, DataError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    serde_json::from_reader(file).map_err(|e| DataError::Json {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

/// Load plant characteristics from a flat JSON object of strings.
pub fn load_characteristics_json(path: &Path) -> Result<PlantCharacteristics, DataError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    serde_json::from_reader(file).map_err(|e| DataError::Json {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}
