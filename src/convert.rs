use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uom::si::f64::Length;

use crate::manifest::{parse_manifest, ManifestError};
use crate::output::{write_names, write_videomaps, OutputError};
use crate::videomap::{assemble, AssembleError};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to read manifest: {0}")]
    ManifestRead(#[from] io::Error),
    #[error("{0}")]
    Manifest(#[from] ManifestError),
    #[error("{0}")]
    Assemble(#[from] AssembleError),
    #[error("{0}")]
    Output(#[from] OutputError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outputs {
    pub videomaps: PathBuf,
    pub manifest: PathBuf,
}

/// Converts every DAT file named in the manifest and writes both output files.
///
/// Nothing is written unless every map could be assembled.
pub fn convert(
    manifest: &Path,
    basename: &str,
    default_radius: Length,
) -> Result<Outputs, ConvertError> {
    let content = fs_err::read(manifest)?;
    let entries = parse_manifest(&content)?;
    let maps = assemble(&entries, default_radius)?;

    Ok(Outputs {
        videomaps: write_videomaps(&maps, basename)?,
        manifest: write_names(&maps.names(), basename)?,
    })
}
