//! Binary artifacts handed to the scope: the compressed map database and the
//! set of map names it contains.

use std::collections::BTreeSet;
use std::io::{self, BufWriter, Write as _};
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;
use tracing::info;

use crate::videomap::VideoMaps;

pub const VIDEOMAPS_SUFFIX: &str = "-videomaps.bin.gz";
pub const MANIFEST_SUFFIX: &str = "-manifest.bin";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write output file: {0}")]
    FileWrite(#[from] io::Error),
    #[error("failed to encode output: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

pub type OutputResult = Result<PathBuf, OutputError>;

pub fn videomaps_path(basename: &str) -> PathBuf {
    PathBuf::from(format!("{basename}{VIDEOMAPS_SUFFIX}"))
}

pub fn manifest_path(basename: &str) -> PathBuf {
    PathBuf::from(format!("{basename}{MANIFEST_SUFFIX}"))
}

/// Writes all maps, gzip compressed, to `<basename>-videomaps.bin.gz`.
pub fn write_videomaps(maps: &VideoMaps, basename: &str) -> OutputResult {
    let path = videomaps_path(basename);
    let file = fs_err::File::create(&path)?;

    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    bincode::serde::encode_into_std_write(&maps.0, &mut encoder, bincode::config::standard())?;
    encoder.finish()?.flush()?;

    info!("wrote {} maps to {}", maps.len(), path.display());
    Ok(path)
}

/// Writes the distinct map names, uncompressed, to `<basename>-manifest.bin`.
pub fn write_names(names: &BTreeSet<String>, basename: &str) -> OutputResult {
    let path = manifest_path(basename);
    let mut writer = BufWriter::new(fs_err::File::create(&path)?);

    bincode::serde::encode_into_std_write(names, &mut writer, bincode::config::standard())?;
    writer.flush()?;

    info!("wrote {} map names to {}", names.len(), path.display());
    Ok(path)
}
