use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dat2videomaps::convert::{convert, ConvertError};
use dat2videomaps::manifest::ManifestError;
use dat2videomaps::schema::SchemaError;
use tracing::{error, info};
use uom::si::f64::Length;
use uom::si::length::nautical_mile;

#[derive(Parser)]
#[command(name = "dat2videomaps")]
#[command(about = "Converts DAT video maps into a compressed map database", long_about = None)]
struct Cli {
    /// Distance in nautical miles beyond which map data is discarded
    #[arg(long, default_value_t = 75.0)]
    radius: f64,

    /// Manifest JSON listing the DAT files to convert
    manifest: PathBuf,

    /// Basename of the generated files
    basename: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();

    match convert(
        &cli.manifest,
        &cli.basename,
        Length::new::<nautical_mile>(cli.radius),
    ) {
        Ok(outputs) => {
            info!(
                "wrote {} and {}",
                outputs.videomaps.display(),
                outputs.manifest.display()
            );
            ExitCode::SUCCESS
        }
        Err(ConvertError::Manifest(ManifestError::Schema(SchemaError::Violations(violations)))) => {
            for violation in violations.iter() {
                error!("{violation}");
            }
            error!("errors in JSON, exiting");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
