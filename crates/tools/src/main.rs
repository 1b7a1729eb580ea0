use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formats::SourcePaths;
use foundation::math::GeoPoint;
use layers::{CriteriaPatch, Range};
use tools::{fuse_files, query, read_collection, write_json};

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline parking bay fusion and filtering")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join the five raw sources into one bay collection (JSON array)
    Fuse {
        /// Bay geometry GeoJSON
        #[arg(long)]
        bays: PathBuf,

        /// Sensor occupancy table
        #[arg(long)]
        occupancy: PathBuf,

        /// Disability restriction table
        #[arg(long)]
        disability: PathBuf,

        /// Road segment to pay-stay zone table
        #[arg(long)]
        zones: PathBuf,

        /// Pay-stay zone cost table
        #[arg(long)]
        costs: PathBuf,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Filter a fused collection, one JSON line per visible bay
    Query {
        /// Output of `parkbay fuse`
        collection: PathBuf,

        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Kilometers: MIN MAX
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
        radius: Option<Vec<f64>>,

        /// Cents per hour: MIN MAX
        #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
        cost: Option<Vec<f64>>,

        /// Minimum stay in minutes
        #[arg(long, allow_negative_numbers = true)]
        duration: Option<i64>,

        #[arg(long)]
        free: bool,

        #[arg(long)]
        accessible: bool,
    },
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    match Args::parse().command {
        Command::Fuse {
            bays,
            occupancy,
            disability,
            zones,
            costs,
            out,
        } => {
            let paths = SourcePaths {
                bays,
                occupancy,
                disability,
                zones,
                costs,
            };
            let fused = fuse_files(&paths).map_err(|e| e.to_string())?;
            write_json(&fused.collection, out.as_deref())?;
            let report = serde_json::to_string(&fused.report).map_err(|e| e.to_string())?;
            eprintln!("fused: {report}");
            Ok(())
        }
        Command::Query {
            collection,
            lat,
            lon,
            radius,
            cost,
            duration,
            free,
            accessible,
        } => {
            let patch = CriteriaPatch {
                free_only: free.then_some(true),
                accessible_only: accessible.then_some(true),
                radius_range: radius.as_deref().and_then(pair),
                cost_range: cost.as_deref().and_then(pair),
                duration_minimum: duration,
                reference_location: lat.zip(lon).map(|(lat, lon)| GeoPoint::new(lat, lon)),
            };
            let collection = read_collection(&collection)?;
            let rows = query(&collection, &patch).map_err(|e| e.to_string())?;
            for row in &rows {
                let line = serde_json::to_string(row).map_err(|e| e.to_string())?;
                println!("{line}");
            }
            eprintln!("{} of {} bays visible", rows.len(), collection.len());
            Ok(())
        }
    }
}

fn pair(values: &[f64]) -> Option<Range<f64>> {
    match values {
        [min, max] => Some(Range::new(*min, *max)),
        _ => None,
    }
}
