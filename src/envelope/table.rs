use serde::{Deserialize, Serialize};

/// Bracketing node indices for `x` in a sorted grid, shifted into range at
/// the ends so the pair is always valid.
fn bracket(pts: &[f64], x: f64) -> (usize, usize) {
    let n = pts.len();
    let ir = pts.partition_point(|&p| p < x).clamp(1, n - 1);
    (ir - 1, ir)
}

fn frac(x: f64, x0: f64, x1: f64) -> f64 {
    if x1 > x0 {
        ((x - x0) / (x1 - x0)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One-dimensional lookup table over a sorted grid, each node holding a
/// fixed-width vector of values. Queries interpolate linearly inside the
/// grid and clamp to the end nodes outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table1 {
    pts: Vec<f64>,
    vals: Vec<Vec<f64>>,
}

impl Table1 {
    pub fn new(pts: Vec<f64>, vals: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(pts.len(), vals.len());
        debug_assert!(!pts.is_empty());
        debug_assert!(pts.windows(2).all(|w| w[0] <= w[1]));
        Self { pts, vals }
    }

    pub fn points(&self) -> &[f64] {
        &self.pts
    }

    pub fn first_point(&self) -> f64 {
        self.pts[0]
    }

    pub fn last_point(&self) -> f64 {
        self.pts[self.pts.len() - 1]
    }

    pub fn get(&self, x: f64) -> Vec<f64> {
        if self.pts.len() == 1 {
            return self.vals[0].clone();
        }
        let (il, ir) = bracket(&self.pts, x);
        let u = frac(x, self.pts[il], self.pts[ir]);
        self.vals[il]
            .iter()
            .zip(&self.vals[ir])
            .map(|(a, b)| a + (b - a) * u)
            .collect()
    }
}

/// Two-dimensional table: an outer grid whose nodes each carry an inner
/// [`Table1`]. The inner grids may differ per node (ragged); the inner
/// queries clamp, so blending two rows of different extent stays defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table2 {
    pts: Vec<f64>,
    rows: Vec<Table1>,
}

impl Table2 {
    pub fn new(pts: Vec<f64>, rows: Vec<Table1>) -> Self {
        debug_assert_eq!(pts.len(), rows.len());
        debug_assert!(!pts.is_empty());
        Self { pts, rows }
    }

    pub fn points(&self) -> &[f64] {
        &self.pts
    }

    pub fn rows(&self) -> &[Table1] {
        &self.rows
    }

    pub fn get(&self, x: f64, y: f64) -> Vec<f64> {
        if self.pts.len() == 1 {
            return self.rows[0].get(y);
        }
        let (il, ir) = bracket(&self.pts, x);
        let u = frac(x, self.pts[il], self.pts[ir]);
        let a = self.rows[il].get(y);
        let b = self.rows[ir].get(y);
        a.iter().zip(&b).map(|(a, b)| a + (b - a) * u).collect()
    }
}

/// Three-dimensional table of nested [`Table2`] rows, ragged like them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table3 {
    pts: Vec<f64>,
    rows: Vec<Table2>,
}

impl Table3 {
    pub fn new(pts: Vec<f64>, rows: Vec<Table2>) -> Self {
        debug_assert_eq!(pts.len(), rows.len());
        debug_assert!(!pts.is_empty());
        Self { pts, rows }
    }

    pub fn points(&self) -> &[f64] {
        &self.pts
    }

    pub fn get(&self, x: f64, y: f64, z: f64) -> Vec<f64> {
        if self.pts.len() == 1 {
            return self.rows[0].get(y, z);
        }
        let (il, ir) = bracket(&self.pts, x);
        let u = frac(x, self.pts[il], self.pts[ir]);
        let a = self.rows[il].get(y, z);
        let b = self.rows[ir].get(y, z);
        a.iter().zip(&b).map(|(a, b)| a + (b - a) * u).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table1_interpolates_and_clamps() {
        let t = Table1::new(
            vec![0.0, 1.0, 3.0],
            vec![vec![0.0, 10.0], vec![2.0, 20.0], vec![4.0, 0.0]],
        );
        assert_relative_eq!(t.get(0.5)[0], 1.0);
        assert_relative_eq!(t.get(0.5)[1], 15.0);
        assert_relative_eq!(t.get(2.0)[0], 3.0);
        // Clamped outside the grid.
        assert_relative_eq!(t.get(-5.0)[0], 0.0);
        assert_relative_eq!(t.get(9.0)[1], 0.0);
    }

    #[test]
    fn test_table1_exact_at_nodes() {
        let t = Table1::new(vec![1.0, 2.0], vec![vec![5.0], vec![7.0]]);
        assert_relative_eq!(t.get(1.0)[0], 5.0);
        assert_relative_eq!(t.get(2.0)[0], 7.0);
    }

    #[test]
    fn test_table2_ragged_rows() {
        // Row at x=0 spans y 0..10, row at x=1 only y 0..5.
        let r0 = Table1::new(vec![0.0, 10.0], vec![vec![0.0], vec![10.0]]);
        let r1 = Table1::new(vec![0.0, 5.0], vec![vec![0.0], vec![20.0]]);
        let t = Table2::new(vec![0.0, 1.0], vec![r0, r1]);
        assert_relative_eq!(t.get(0.0, 5.0)[0], 5.0);
        assert_relative_eq!(t.get(1.0, 5.0)[0], 20.0);
        // Past the short row's extent its end value holds.
        assert_relative_eq!(t.get(0.5, 10.0)[0], 15.0);
        assert_relative_eq!(t.get(0.5, 5.0)[0], 12.5);
    }

    #[test]
    fn test_table3_blends_planes() {
        let mk2 = |scale: f64| {
            let r = Table1::new(vec![0.0, 1.0], vec![vec![0.0], vec![scale]]);
            Table2::new(vec![0.0], vec![r])
        };
        let t = Table3::new(vec![0.0, 2.0], vec![mk2(10.0), mk2(30.0)]);
        assert_relative_eq!(t.get(1.0, 0.0, 1.0)[0], 20.0);
        assert_relative_eq!(t.get(3.0, 0.0, 0.5)[0], 15.0);
    }
}
