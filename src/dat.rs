//! Parser for fixed-column DAT video map files.
//!
//! Only two kinds of content are understood: the `9900` center header record
//! and straight line strips made of `LINE ` separators and `GP ` points.
//!
//! ```text
//! !ZZZ9900    42 20 55.0000  071 00 22.0000
//! LINE !
//! GP 42 20 55.0000  071 00 22.0000  !
//! ```

use std::io;
use std::ops::Range;

use geo::{Coord, LineString, MultiLineString, Point};
use thiserror::Error;
use tracing::debug;

use crate::{read_to_string, DegMinSecExt as _};

const CENTER_CODE: &[u8] = b"9900";
const CENTER_CODE_COLUMNS: Range<usize> = 4..8;
const CENTER_COORDINATE_COLUMN: usize = 12;
const LINE_RECORD: &[u8] = b"LINE ";
const POINT_RECORD: &[u8] = b"GP ";
const POINT_RECORD_LEN: usize = 34;

struct DmsColumns {
    deg: Range<usize>,
    min: Range<usize>,
    sec: Range<usize>,
    sec_dec: Range<usize>,
}

// relative to the start of the coordinate
const LATITUDE: DmsColumns = DmsColumns {
    deg: 0..2,
    min: 3..5,
    sec: 6..8,
    sec_dec: 9..13,
};
const LONGITUDE: DmsColumns = DmsColumns {
    deg: 15..18,
    min: 19..21,
    sec: 22..24,
    sec_dec: 25..29,
};

/// Decimal seconds are given in ten-thousandths.
const SEC_DEC_SCALE: f64 = 10_000.0;

#[derive(Error, Debug)]
pub enum DatError {
    #[error("failed to read DAT file: {0}")]
    FileRead(#[from] io::Error),
    #[error("line {line}: unexpected line in DAT file: \"{content}\"")]
    UnexpectedLine { line: usize, content: String },
    #[error("line {line}: non-numeric value found at column {column}: \"{field}\"")]
    NonNumeric {
        line: usize,
        column: usize,
        field: String,
    },
    #[error("line {line}: coordinate is truncated: \"{content}\"")]
    Truncated { line: usize, content: String },
    #[error("center not found in DAT file")]
    MissingCenter,
}

/// Errors local to a single coordinate, line information is attached by the caller.
#[derive(Debug, PartialEq)]
enum FieldError {
    NonNumeric { column: usize, field: String },
    Truncated,
}

impl FieldError {
    fn at_line(self, line: usize, content: &[u8]) -> DatError {
        match self {
            FieldError::NonNumeric { column, field } => DatError::NonNumeric {
                line,
                column,
                field,
            },
            FieldError::Truncated => DatError::Truncated {
                line,
                content: String::from_utf8_lossy(content).to_string(),
            },
        }
    }
}

pub type DatResult = Result<DatFile, DatError>;

#[derive(Clone, Debug, PartialEq)]
pub struct DatFile {
    pub center: Point,
    pub lines: MultiLineString,
}

fn parse_digits(field: &[u8]) -> Result<u32, FieldError> {
    field.iter().enumerate().try_fold(0, |acc, (column, ch)| {
        if ch.is_ascii_digit() {
            Ok(acc * 10 + u32::from(ch - b'0'))
        } else {
            Err(FieldError::NonNumeric {
                column,
                field: String::from_utf8_lossy(field).to_string(),
            })
        }
    })
}

fn parse_dms(coordinate: &[u8], columns: &DmsColumns) -> Result<(i16, u8, f64), FieldError> {
    let field = |range: &Range<usize>| {
        coordinate
            .get(range.clone())
            .ok_or(FieldError::Truncated)
            .and_then(parse_digits)
    };
    let deg = field(&columns.deg)?;
    let min = field(&columns.min)?;
    let sec = field(&columns.sec)?;
    let sec_dec = field(&columns.sec_dec)?;

    // at most 3 digits for degrees and 2 for minutes, the casts are lossless
    Ok((
        deg as i16,
        min as u8,
        f64::from(sec) + f64::from(sec_dec) / SEC_DEC_SCALE,
    ))
}

/// Decodes `DD MM SS.SSSS  DDD MM SS.SSSS`, longitudes are assumed west and stored negated.
fn parse_lat_lng(coordinate: &[u8]) -> Result<Coord, FieldError> {
    let lat = parse_dms(coordinate, &LATITUDE)?;
    let lng = parse_dms(coordinate, &LONGITUDE)?;
    let coord = Coord::from_deg_min_sec(lat, lng);
    Ok(Coord {
        x: -coord.x,
        y: coord.y,
    })
}

fn unexpected_line(line: usize, content: &[u8]) -> DatError {
    DatError::UnexpectedLine {
        line,
        content: String::from_utf8_lossy(content).to_string(),
    }
}

impl DatFile {
    pub fn parse(content: &[u8]) -> DatResult {
        let unparsed_file = read_to_string(content)?;

        let mut center = None;
        let mut lines = vec![];
        let mut current_strip = vec![];

        for (i, text) in unparsed_file.lines().enumerate() {
            let line_number = i + 1;
            let line = text.as_bytes();

            if line.len() > 8 && line[0] == b'!' {
                if &line[CENTER_CODE_COLUMNS] == CENTER_CODE {
                    let coordinate = line.get(CENTER_COORDINATE_COLUMN..).unwrap_or_default();
                    let coord = parse_lat_lng(coordinate)
                        .map_err(|e| e.at_line(line_number, line))?;
                    center = Some(Point::from(coord));
                }
                continue;
            }

            let Some(bang) = line.iter().position(|&ch| ch == b'!') else {
                return Err(unexpected_line(line_number, line));
            };
            let record = &line[..bang];

            if record.is_empty() {
                continue;
            } else if record == LINE_RECORD {
                if !current_strip.is_empty() {
                    lines.push(LineString::new(std::mem::take(&mut current_strip)));
                }
            } else if record.len() == POINT_RECORD_LEN && record.starts_with(POINT_RECORD) {
                let coord = parse_lat_lng(&record[POINT_RECORD.len()..])
                    .map_err(|e| e.at_line(line_number, line))?;
                current_strip.push(coord);
            } else {
                return Err(unexpected_line(line_number, record));
            }
        }

        if !current_strip.is_empty() {
            lines.push(LineString::new(current_strip));
        }

        let center = center.ok_or(DatError::MissingCenter)?;
        debug!(
            "parsed {} line strips around {}",
            lines.len(),
            center.deg_min_sec_fmt()
        );

        Ok(DatFile {
            center,
            lines: MultiLineString::new(lines),
        })
    }
}
