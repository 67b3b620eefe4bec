// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use blood_ledger::{
    BloodType, Donation, HashEncoding, InventoryStore, LedgerConfig, LedgerEngine, LedgerError,
};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Blood Ledger - Process donation and transfer CSV files
///
/// Reads donations and transfer requests from a CSV file, records every
/// fulfilled request in a hash-chained ledger, and writes the ledger to stdout.
#[derive(Parser, Debug)]
#[command(name = "blood-ledger")]
#[command(about = "A hash-chained blood bank ledger that processes operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: type,party,blood_type,units,age
    /// Example: cargo run -- operations.csv > ledger.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Seed one lot of 60-100 units per blood type before processing
    #[arg(long)]
    seed_stock: bool,

    /// RNG seed for reproducible stock seeding
    #[arg(long, value_name = "SEED", requires = "seed_stock")]
    rng_seed: Option<u64>,

    /// Field layout used when fingerprinting records
    #[arg(long, value_enum, default_value_t = EncodingArg::Concatenated)]
    hash_encoding: EncodingArg,

    /// Output format for the ledger history
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    Concatenated,
    LengthPrefixed,
}

impl From<EncodingArg> for HashEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Concatenated => HashEncoding::Concatenated,
            EncodingArg::LengthPrefixed => HashEncoding::LengthPrefixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let config = LedgerConfig::default().with_hash_encoding(args.hash_encoding.into());
    let engine = LedgerEngine::with_config(InventoryStore::new(), config);

    if args.seed_stock {
        let mut rng = match args.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let lots = engine.seed_initial_stock(&mut rng);
        info!(lots = lots.len(), "initial stock seeded");
    }

    if let Err(e) = process_operations(&engine, BufReader::new(file)) {
        eprintln!("Error processing operations: {}", e);
        process::exit(1);
    }

    let written = match args.format {
        OutputFormat::Csv => write_history(&engine, std::io::stdout()),
        OutputFormat::Json => write_history_json(&engine, std::io::stdout()),
    };
    if let Err(e) = written {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    for (blood_type, units) in engine.inventory_summary() {
        info!(%blood_type, units, "remaining inventory");
    }

    let verification = engine.verify_chain();
    info!("{verification}");
    if !verification.is_valid() {
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, party, blood_type, units, age`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    op_type: String,
    party: String,
    blood_type: String,
    units: i64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    age: Option<u8>,
}

#[derive(Debug, PartialEq, Eq)]
enum Operation {
    Donation(Donation),
    Request {
        recipient: String,
        blood_type: BloodType,
        units: u32,
    },
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `Ok(None)` for unknown operation types.
    fn into_operation(self) -> Result<Option<Operation>, LedgerError> {
        let blood_type: BloodType = self.blood_type.parse()?;
        let units = u32::try_from(self.units)
            .ok()
            .filter(|units| *units > 0)
            .ok_or(LedgerError::InvalidQuantity)?;

        match self.op_type.to_lowercase().as_str() {
            "donation" => {
                let age = self.age.ok_or(LedgerError::MissingDonorAge)?;
                Ok(Some(Operation::Donation(Donation {
                    donor_name: self.party,
                    age,
                    blood_type,
                    units,
                })))
            }
            "request" => Ok(Some(Operation::Request {
                recipient: self.party,
                blood_type,
                units,
            })),
            _ => Ok(None),
        }
    }
}

/// Process operations from a CSV reader into `engine`.
///
/// Rows are streamed. Malformed rows, invalid operations, and rejected
/// requests are logged and skipped. Transfers are stamped with the wall clock,
/// held back to the last record's timestamp if the clock has moved backwards.
///
/// # CSV Format
///
/// Expected columns: `type, party, blood_type, units, age`
/// - `type`: `donation` or `request`
/// - `party`: Donor name or requesting recipient
/// - `blood_type`: One of `A+ A- B+ B- O+ O- AB+ AB-`
/// - `units`: Positive integer
/// - `age`: Donor age (donations only)
///
/// # Example
///
/// ```csv
/// type,party,blood_type,units,age
/// donation,Alice,O+,5,34
/// request,HospitalX,O+,3,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(engine: &LedgerEngine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // age is empty for requests
        .has_headers(true)
        .from_reader(reader);

    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row, "skipping malformed row: {}", e);
                continue;
            }
        };

        let operation = match record.into_operation() {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                debug!(row, "skipping unsupported row");
                continue;
            }
            Err(e) => {
                warn!(row, "skipping invalid row: {}", e);
                continue;
            }
        };

        let outcome = match operation {
            Operation::Donation(donation) => engine.register_donation(donation).map(|_| ()),
            Operation::Request {
                recipient,
                blood_type,
                units,
            } => {
                engine
                    .request_transfer_not_before_last(recipient, blood_type, units, Utc::now())
                    .map(|_| ())
            }
        };
        match outcome {
            Ok(()) => {}
            Err(e) if e.is_invalid_request() => warn!(row, "invalid operation: {}", e),
            Err(e) => warn!(row, "operation rejected: {}", e),
        }
    }

    Ok(())
}

/// Write the ledger history to a CSV writer.
///
/// # CSV Format
///
/// Columns: `sequence, recipient, blood_type, units, timestamp, record_hash, previous_hash`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_history<W: Write>(engine: &LedgerEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for record in engine.history() {
        wtr.serialize(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the ledger history as a pretty-printed JSON array.
pub fn write_history_json<W: Write>(engine: &LedgerEngine, mut writer: W) -> Result<(), csv::Error> {
    serde_json::to_writer_pretty(&mut writer, &engine.history())
        .map_err(|e| csv::Error::from(std::io::Error::from(e)))?;
    writeln!(writer)?;
    Ok(())
}
