//! ESRI ASCII grid header (`.asc`), read only far enough to get the extent.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{SetupError, SetupResult};
use crate::geometry::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsciiGridHeader {
    pub ncols: usize,
    pub nrows: usize,
    /// Lower-left corner of the lower-left cell.
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata_value: Option<f64>,
}

impl AsciiGridHeader {
    pub fn parse(text: &str) -> SetupResult<Self> {
        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut centred = false;
        let mut cellsize = None;
        let mut nodata_value = None;

        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let key = key.to_ascii_lowercase();
            let number = || {
                value.parse::<f64>().map_err(|_| {
                    SetupError::MalformedInput(format!(
                        "ASCII grid header '{key}' has value '{value}'"
                    ))
                })
            };
            match key.as_str() {
                "ncols" => ncols = Some(number()? as usize),
                "nrows" => nrows = Some(number()? as usize),
                "xllcorner" => xll = Some(number()?),
                "yllcorner" => yll = Some(number()?),
                "xllcenter" => {
                    xll = Some(number()?);
                    centred = true;
                }
                "yllcenter" => {
                    yll = Some(number()?);
                    centred = true;
                }
                "cellsize" => cellsize = Some(number()?),
                "nodata_value" => nodata_value = Some(number()?),
                // First data row: the header is over.
                _ => break,
            }
        }

        let missing =
            |name: &str| SetupError::MalformedInput(format!("ASCII grid header lacks {name}"));
        let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
        let half = if centred { cellsize / 2.0 } else { 0.0 };
        Ok(Self {
            ncols: ncols.ok_or_else(|| missing("ncols"))?,
            nrows: nrows.ok_or_else(|| missing("nrows"))?,
            xllcorner: xll.ok_or_else(|| missing("xllcorner"))? - half,
            yllcorner: yll.ok_or_else(|| missing("yllcorner"))? - half,
            cellsize,
            nodata_value,
        })
    }

    /// Read the header lines of `path` without loading the cell values.
    pub fn read(path: &Path) -> SetupResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut header = String::new();
        for line in reader.lines().take(6) {
            header.push_str(&line?);
            header.push('\n');
        }
        Self::parse(&header)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            xmin: self.xllcorner,
            ymin: self.yllcorner,
            xmax: self.xllcorner + self.ncols as f64 * self.cellsize,
            ymax: self.yllcorner + self.nrows as f64 * self.cellsize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ncols 4\nnrows 2\nxllcorner 1000\nyllcorner 2000\ncellsize 100\n\
                          NODATA_value -9999\n0 0 0 0\n";

    #[test]
    fn test_parse_corner_header() {
        let h = AsciiGridHeader::parse(HEADER).unwrap();
        assert_eq!(h.ncols, 4);
        assert_eq!(h.nodata_value, Some(-9999.0));
        let b = h.bounds();
        assert_eq!(
            (b.xmin, b.ymin, b.xmax, b.ymax),
            (1000.0, 2000.0, 1400.0, 2200.0)
        );
    }

    #[test]
    fn test_centre_header_shifts_by_half_cell() {
        let header = "ncols 1\nnrows 1\nxllcenter 50\nyllcenter 50\ncellsize 100\n";
        let h = AsciiGridHeader::parse(header).unwrap();
        assert_eq!(h.bounds().xmin, 0.0);
        assert_eq!(h.bounds().ymax, 100.0);
    }

    #[test]
    fn test_missing_cellsize_is_error() {
        let header = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\n";
        assert!(AsciiGridHeader::parse(header).is_err());
    }
}
