// Zones - 3x3 placement grid over the ROI
//
// Row-major indexing: 0,1,2 top row; 3,4,5 middle; 6,7,8 bottom; left to right.

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::Roi;
use crate::error::ClassificationError;

pub const GRID_SIZE: u32 = 3;
pub const ZONE_COUNT: usize = 9;

/// Validated zone index 0-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ZoneIndex(u8);

impl ZoneIndex {
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < ZONE_COUNT).then_some(Self(index))
    }

    pub fn from_cell(row: u32, col: u32) -> Option<Self> {
        if row >= GRID_SIZE || col >= GRID_SIZE {
            return None;
        }
        Some(Self((row * GRID_SIZE + col) as u8))
    }

    pub fn index(&self) -> usize {
        usize::from(self.0)
    }

    pub fn row(&self) -> u32 {
        u32::from(self.0) / GRID_SIZE
    }

    pub fn col(&self) -> u32 {
        u32::from(self.0) % GRID_SIZE
    }

    pub fn all() -> impl Iterator<Item = ZoneIndex> {
        (0..ZONE_COUNT as u8).map(ZoneIndex)
    }
}

impl TryFrom<i64> for ZoneIndex {
    type Error = ClassificationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(ZoneIndex::new)
            .ok_or(ClassificationError::OutOfRange { zone: value })
    }
}

impl From<ZoneIndex> for u8 {
    fn from(zone: ZoneIndex) -> Self {
        zone.0
    }
}

impl fmt::Display for ZoneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid overlay resolved against a pixel ROI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneGrid {
    roi: Roi,
}

impl ZoneGrid {
    pub fn new(roi: Roi) -> Self {
        Self { roi }
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    /// Zone under a tap in frame coordinates; None outside the ROI
    pub fn zone_at(&self, x: u32, y: u32) -> Option<ZoneIndex> {
        if !self.roi.contains(x, y) {
            return None;
        }
        let col = (u64::from(x - self.roi.x) * u64::from(GRID_SIZE) / u64::from(self.roi.width)) as u32;
        let row = (u64::from(y - self.roi.y) * u64::from(GRID_SIZE) / u64::from(self.roi.height)) as u32;
        ZoneIndex::from_cell(row.min(GRID_SIZE - 1), col.min(GRID_SIZE - 1))
    }

    /// Pixel rectangle of one cell; the last row/column absorbs the remainder
    pub fn cell_rect(&self, zone: ZoneIndex) -> Roi {
        let col_edge = |c: u32| self.roi.x + self.roi.width * c / GRID_SIZE;
        let row_edge = |r: u32| self.roi.y + self.roi.height * r / GRID_SIZE;
        let x0 = col_edge(zone.col());
        let x1 = col_edge(zone.col() + 1);
        let y0 = row_edge(zone.row());
        let y1 = row_edge(zone.row() + 1);
        Roi::new(x0, y0, (x1 - x0).max(1), (y1 - y0).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_indexing() {
        assert_eq!(ZoneIndex::from_cell(0, 0).unwrap().index(), 0);
        assert_eq!(ZoneIndex::from_cell(0, 2).unwrap().index(), 2);
        assert_eq!(ZoneIndex::from_cell(1, 0).unwrap().index(), 3);
        assert_eq!(ZoneIndex::from_cell(2, 2).unwrap().index(), 8);
        assert!(ZoneIndex::from_cell(3, 0).is_none());
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert_eq!(ZoneIndex::try_from(4).unwrap().index(), 4);
        assert_eq!(
            ZoneIndex::try_from(9),
            Err(ClassificationError::OutOfRange { zone: 9 })
        );
        assert_eq!(
            ZoneIndex::try_from(-1),
            Err(ClassificationError::OutOfRange { zone: -1 })
        );
    }

    #[test]
    fn test_zone_at_maps_taps() {
        let grid = ZoneGrid::new(Roi::new(30, 60, 90, 90));
        assert_eq!(grid.zone_at(30, 60).unwrap().index(), 0);
        assert_eq!(grid.zone_at(119, 60).unwrap().index(), 2);
        assert_eq!(grid.zone_at(75, 105).unwrap().index(), 4);
        assert_eq!(grid.zone_at(30, 149).unwrap().index(), 6);
        assert_eq!(grid.zone_at(119, 149).unwrap().index(), 8);
        assert!(grid.zone_at(29, 60).is_none());
        assert!(grid.zone_at(120, 100).is_none());
    }

    #[test]
    fn test_cell_rects_tile_the_roi() {
        let roi = Roi::new(0, 0, 100, 50);
        let grid = ZoneGrid::new(roi);
        let area: u64 = ZoneIndex::all().map(|z| grid.cell_rect(z).area()).sum();
        assert_eq!(area, roi.area());
        for zone in ZoneIndex::all() {
            let (cx, cy) = grid.cell_rect(zone).center();
            assert_eq!(grid.zone_at(cx, cy), Some(zone));
        }
    }

    #[test]
    fn test_zone_serde_validates() {
        let zone: ZoneIndex = serde_json::from_str("7").unwrap();
        assert_eq!(zone.index(), 7);
        assert!(serde_json::from_str::<ZoneIndex>("12").is_err());
        assert_eq!(serde_json::to_string(&zone).unwrap(), "7");
    }
}
