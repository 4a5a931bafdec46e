//! Candidate pair generation for the overlap rule
//!
//! A strategy only has to return a superset of the pairs whose bounding
//! boxes intersect; the exact test happens afterwards.

use ahash::{AHashMap, AHashSet};
use geo::Intersects;
use geo_types::Rect;

pub trait CandidatePairs {
    /// Pairs `(i, j)` with `i < j`, sorted ascending
    fn candidates(&self, boxes: &[Option<Rect<f64>>]) -> Vec<(usize, usize)>;
}

/// Compare every pair; quadratic but exact for small layers
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPairs;

impl CandidatePairs for AllPairs {
    fn candidates(&self, boxes: &[Option<Rect<f64>>]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..boxes.len() {
            let Some(a) = boxes[i] else { continue };
            for (j, b) in boxes.iter().enumerate().skip(i + 1) {
                if matches!(b, Some(b) if a.intersects(b)) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

/// Sparse hash grid over bounding boxes
///
/// Every box is registered in each cell it covers; two features become a
/// candidate pair when they share a cell and their boxes intersect.
#[derive(Debug, Clone, Copy)]
pub struct GridPairs {
    cell_size: f64,
}

impl GridPairs {
    /// Cells per axis above which a box is kept out of the grid
    const MAX_CELLS_PER_AXIS: i64 = 64;

    pub fn new(cell_size: f64) -> Self {
        Self { cell_size }
    }

    #[inline]
    fn cell_coord(&self, v: f64) -> i64 {
        (v / self.cell_size).floor() as i64
    }
}

impl CandidatePairs for GridPairs {
    fn candidates(&self, boxes: &[Option<Rect<f64>>]) -> Vec<(usize, usize)> {
        let mut cells: AHashMap<(i64, i64), Vec<usize>> = AHashMap::new();
        // Boxes spanning too many cells are compared against everything
        let mut oversized = Vec::new();

        for (i, rect) in boxes.iter().enumerate() {
            let Some(rect) = rect else { continue };
            let (x0, x1) = (self.cell_coord(rect.min().x), self.cell_coord(rect.max().x));
            let (y0, y1) = (self.cell_coord(rect.min().y), self.cell_coord(rect.max().y));

            if x1 - x0 >= Self::MAX_CELLS_PER_AXIS || y1 - y0 >= Self::MAX_CELLS_PER_AXIS {
                oversized.push(i);
                continue;
            }
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    cells.entry((cx, cy)).or_default().push(i);
                }
            }
        }

        let mut pairs: AHashSet<(usize, usize)> = AHashSet::new();
        let mut consider = |i: usize, j: usize| {
            let (i, j) = (i.min(j), i.max(j));
            if i == j || pairs.contains(&(i, j)) {
                return;
            }
            if let (Some(a), Some(b)) = (boxes[i], boxes[j]) {
                if a.intersects(&b) {
                    pairs.insert((i, j));
                }
            }
        };

        for members in cells.values() {
            for (k, &i) in members.iter().enumerate() {
                for &j in &members[k + 1..] {
                    consider(i, j);
                }
            }
        }
        for &i in &oversized {
            for j in 0..boxes.len() {
                consider(i, j);
            }
        }

        let mut pairs: Vec<_> = pairs.into_iter().collect();
        pairs.sort_unstable();
        pairs
    }
}
