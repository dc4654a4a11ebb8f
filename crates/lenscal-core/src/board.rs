use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("board needs at least one interior corner per axis (columns={columns}, rows={rows})")]
    ZeroDimension { columns: u32, rows: u32 },
    #[error("board corner count overflows (columns={columns}, rows={rows})")]
    TooLarge { columns: u32, rows: u32 },
}

/// Interior-corner layout of a planar chessboard target.
///
/// `columns` and `rows` count *interior corners*, not squares: a board with
/// 10x7 squares has `columns = 9`, `rows = 6`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BoardGeometrySpec")]
pub struct BoardGeometry {
    columns: u32,
    rows: u32,
}

#[derive(Deserialize)]
struct BoardGeometrySpec {
    columns: u32,
    rows: u32,
}

impl TryFrom<BoardGeometrySpec> for BoardGeometry {
    type Error = BoardError;

    fn try_from(spec: BoardGeometrySpec) -> Result<Self, Self::Error> {
        BoardGeometry::new(spec.columns, spec.rows)
    }
}

impl BoardGeometry {
    pub fn new(columns: u32, rows: u32) -> Result<Self, BoardError> {
        if columns == 0 || rows == 0 {
            return Err(BoardError::ZeroDimension { columns, rows });
        }
        if (columns as usize).checked_mul(rows as usize).is_none() {
            return Err(BoardError::TooLarge { columns, rows });
        }
        Ok(Self { columns, rows })
    }

    #[inline]
    pub fn columns(&self) -> u32 {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of interior corners (`columns * rows`).
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// `(row, column)` of the corner at linear index `index`.
    #[inline]
    pub fn grid_position(&self, index: usize) -> (usize, usize) {
        let cols = self.columns as usize;
        (index / cols, index % cols)
    }

    /// Board-local 3D coordinates of every interior corner, one grid cell per unit.
    ///
    /// Point `i` is `(i / columns, i % columns, 0)`. The sequence is the same
    /// for every accepted sample and matches the row-major order produced by
    /// the corner detector.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        (0..self.corner_count())
            .map(|i| {
                let (row, col) = self.grid_position(i);
                Point3::new(row as f64, col as f64, 0.0)
            })
            .collect()
    }
}

impl std::fmt::Display for BoardGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}
