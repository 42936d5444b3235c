use std::collections::BTreeSet;
use std::io;

use bevy_derive::{Deref, DerefMut};
use geo::MultiLineString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uom::si::f64::Length;
use uom::si::length::nautical_mile;

use crate::dat::{DatError, DatFile};
use crate::filter::retain_within;
use crate::manifest::ManifestEntry;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("failed to read DAT file: {0}")]
    FileRead(#[from] io::Error),
    #[error("{filename}: {source}")]
    Dat {
        filename: String,
        #[source]
        source: DatError,
    },
    #[error("multiple maps have the same id: {0}")]
    DuplicateId(i64),
}

/// A single video map, as consumed by the scope.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MapRecord {
    pub group: i64,
    pub label: String,
    pub name: String,
    pub id: i64,
    pub lines: MultiLineString,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Deref, DerefMut)]
pub struct VideoMaps(pub Vec<MapRecord>);

impl VideoMaps {
    /// Distinct map names, used to check for a map without loading any geometry.
    pub fn names(&self) -> BTreeSet<String> {
        self.iter().map(|map| map.name.clone()).collect()
    }
}

pub struct MapAssembler {
    default_radius: Length,
    maps: VideoMaps,
}

impl MapAssembler {
    pub fn new(default_radius: Length) -> Self {
        Self {
            default_radius,
            maps: VideoMaps::default(),
        }
    }

    /// Reads the entry's DAT file from disk and adds the resulting map.
    pub fn add(&mut self, entry: &ManifestEntry) -> Result<(), AssembleError> {
        let content = fs_err::read(&entry.filename)?;
        self.add_dat(entry, &content)
    }

    pub fn add_dat(&mut self, entry: &ManifestEntry, content: &[u8]) -> Result<(), AssembleError> {
        let dat = DatFile::parse(content).map_err(|source| AssembleError::Dat {
            filename: entry.filename.clone(),
            source,
        })?;

        let radius = entry.radius(self.default_radius);
        let map = MapRecord {
            group: entry.group,
            label: entry.label.clone(),
            name: entry.name.clone(),
            id: entry.id,
            lines: retain_within(dat.lines, dat.center, radius),
        };

        if self.maps.iter().any(|other| other.id == map.id) {
            return Err(AssembleError::DuplicateId(map.id));
        }

        info!(
            "read {} ({} line strips within {:.1} nm)",
            entry.filename,
            map.lines.0.len(),
            radius.get::<nautical_mile>()
        );
        self.maps.push(map);
        Ok(())
    }

    /// Maps added so far, in manifest order.
    pub fn maps(&self) -> &VideoMaps {
        &self.maps
    }

    pub fn finish(self) -> VideoMaps {
        self.maps
    }
}

/// Assembles every entry in manifest order, failing on the first error.
pub fn assemble(
    entries: &[ManifestEntry],
    default_radius: Length,
) -> Result<VideoMaps, AssembleError> {
    let mut assembler = MapAssembler::new(default_radius);
    for entry in entries {
        assembler.add(entry)?;
    }
    Ok(assembler.finish())
}
