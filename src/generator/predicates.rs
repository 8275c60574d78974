// src/generator/predicates.rs

//! "Are these two inputs neighbours?" predicates over input file names.

use std::path::Path;

use regex::Regex;

use crate::types::PredicateKind;

/// Binary relation evaluated for every ordered pair of distinct inputs.
pub trait NeighbourPredicate: Send + Sync {
    fn are_neighbours(&self, lhs: &Path, rhs: &Path) -> bool;
}

impl<F> NeighbourPredicate for F
where
    F: Fn(&Path, &Path) -> bool + Send + Sync,
{
    fn are_neighbours(&self, lhs: &Path, rhs: &Path) -> bool {
        self(lhs, rhs)
    }
}

/// Grid coordinate encoded in a file name as `<stem>_<x>_<y>.<ext>`.
///
/// Names whose numbers do not fit an `i32` carry no coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCoordinate {
    pub x: i32,
    pub y: i32,
}

impl GridCoordinate {
    /// Per-axis distance, computed in `i64` so it cannot overflow.
    pub fn delta(self, other: GridCoordinate) -> (i64, i64) {
        (
            (i64::from(self.x) - i64::from(other.x)).abs(),
            (i64::from(self.y) - i64::from(other.y)).abs(),
        )
    }

    pub fn distance(self, other: GridCoordinate) -> f64 {
        let (dx, dy) = self.delta(other);
        (dx as f64).hypot(dy as f64)
    }
}

fn coordinate(pattern: &Regex, path: &Path) -> Option<GridCoordinate> {
    let name = path.file_name()?.to_str()?;
    let caps = pattern.captures(name)?;
    Some(GridCoordinate {
        x: caps.get(2)?.as_str().parse().ok()?,
        y: caps.get(3)?.as_str().parse().ok()?,
    })
}

/// Shapefile tiles `<stem>_<x>_<y>.shp`, neighbours within distance 1.5
/// (the eight surrounding tiles).
#[derive(Debug, Clone)]
pub struct TilesPredicate {
    pattern: Regex,
}

impl TilesPredicate {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"^(.+)_(-?\d+)_(-?\d+)\.shp$")?,
        })
    }

    pub fn coordinate(&self, path: &Path) -> Option<GridCoordinate> {
        coordinate(&self.pattern, path)
    }
}

impl NeighbourPredicate for TilesPredicate {
    fn are_neighbours(&self, lhs: &Path, rhs: &Path) -> bool {
        match (self.coordinate(lhs), self.coordinate(rhs)) {
            (Some(l), Some(r)) => l.distance(r) <= 1.5,
            _ => false,
        }
    }
}

/// World Settlement Footprint rasters `<name>_<lon>_<lat>.<ext>`, which
/// come in 2-degree steps; neighbours iff both axes differ by at most 2.
#[derive(Debug, Clone)]
pub struct WsfPredicate {
    pattern: Regex,
}

impl WsfPredicate {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"^(.+)_(-?\d+)_(-?\d+)\..+$")?,
        })
    }

    pub fn coordinate(&self, path: &Path) -> Option<GridCoordinate> {
        coordinate(&self.pattern, path)
    }
}

impl NeighbourPredicate for WsfPredicate {
    fn are_neighbours(&self, lhs: &Path, rhs: &Path) -> bool {
        match (self.coordinate(lhs), self.coordinate(rhs)) {
            (Some(l), Some(r)) => {
                let (dx, dy) = l.delta(r);
                dx <= 2 && dy <= 2
            }
            _ => false,
        }
    }
}

/// Build the configured predicate.
pub fn for_kind(kind: PredicateKind) -> Result<Box<dyn NeighbourPredicate>, regex::Error> {
    Ok(match kind {
        PredicateKind::Tiles => Box::new(TilesPredicate::new()?),
        PredicateKind::Wsf => Box::new(WsfPredicate::new()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> &Path {
        Path::new(s)
    }

    #[test]
    fn tiles_touching_diagonally_are_neighbours() {
        let tiles = TilesPredicate::new().unwrap();
        assert!(tiles.are_neighbours(p("in/area_0_0.shp"), p("in/area_1_1.shp")));
        assert!(tiles.are_neighbours(p("area_-1_0.shp"), p("area_0_0.shp")));
        assert!(!tiles.are_neighbours(p("area_0_0.shp"), p("area_2_0.shp")));
        assert!(!tiles.are_neighbours(p("area_0_0.tif"), p("area_0_1.tif")));
    }

    #[test]
    fn tile_coordinates_use_the_last_two_numbers() {
        let tiles = TilesPredicate::new().unwrap();
        assert_eq!(
            tiles.coordinate(p("/data/my_area_12_-3.shp")),
            Some(GridCoordinate { x: 12, y: -3 })
        );
        assert_eq!(tiles.coordinate(p("/data/area.shp")), None);
    }

    #[test]
    fn wsf_uses_two_degree_window() {
        let wsf = WsfPredicate::new().unwrap();
        assert!(wsf.are_neighbours(p("WSF2019_v1_10_44.tif"), p("WSF2019_v1_12_46.tif")));
        assert!(!wsf.are_neighbours(p("WSF2019_v1_10_44.tif"), p("WSF2019_v1_14_44.tif")));
        assert!(!wsf.are_neighbours(p("WSF2019.tif"), p("WSF2019_v1_10_44.tif")));
    }

    #[test]
    fn extreme_coordinates_never_overflow() {
        let tiles = TilesPredicate::new().unwrap();
        let wsf = WsfPredicate::new().unwrap();

        let max = p("a_2147483647_0.shp");
        let min = p("a_-2147483648_0.shp");
        assert!(!tiles.are_neighbours(max, min));
        assert!(!wsf.are_neighbours(min, max));
        assert!(tiles.are_neighbours(max, p("a_2147483646_1.shp")));

        // Out of range for the grid: no coordinate, so never a neighbour.
        let huge = p("a_9223372036854775807_0.shp");
        assert_eq!(tiles.coordinate(huge), None);
        assert!(!tiles.are_neighbours(huge, p("a_-1_0.shp")));
        assert!(!wsf.are_neighbours(p("a_-1_0.shp"), huge));
    }

    #[test]
    fn closures_are_predicates() {
        let always = |_: &Path, _: &Path| true;
        assert!(always.are_neighbours(p("a"), p("b")));
        let boxed = for_kind(PredicateKind::Tiles).unwrap();
        assert!(!boxed.are_neighbours(p("a"), p("b")));
    }
}
