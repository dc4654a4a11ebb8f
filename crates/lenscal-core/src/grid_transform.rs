use serde::{Deserialize, Serialize};

/// Integer 2D grid transform (a 2x2 matrix) used to canonicalise the
/// orientation of a detected corner grid.
///
/// `(i', j') = (a*i + b*j, c*i + d*j)`.
///
/// The 8 symmetries of the square grid (dihedral group `D4`) are listed in
/// [`GRID_TRANSFORMS_D4`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridTransform {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
}

impl GridTransform {
    pub const IDENTITY: GridTransform = GridTransform {
        a: 1,
        b: 0,
        c: 0,
        d: 1,
    };

    #[inline]
    pub fn apply(&self, i: i32, j: i32) -> [i32; 2] {
        [self.a * i + self.b * j, self.c * i + self.d * j]
    }

    /// Invert the transform if it is unimodular (det = +-1).
    pub fn inverse(&self) -> Option<GridTransform> {
        let det = self.determinant();
        if det != 1 && det != -1 {
            return None;
        }
        Some(GridTransform {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
        })
    }

    #[inline]
    pub fn determinant(&self) -> i32 {
        self.a * self.d - self.b * self.c
    }

    /// `true` when the transform exchanges the two grid axes.
    #[inline]
    pub fn swaps_axes(&self) -> bool {
        self.a == 0
    }

    /// Extent `(w', h')` of a `w x h` grid after the transform.
    pub fn transformed_extent(&self, w: i32, h: i32) -> (i32, i32) {
        if self.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

/// The 8 dihedral transforms `D4` on the integer grid.
pub const GRID_TRANSFORMS_D4: [GridTransform; 8] = [
    // rotations: 0, 90, 180, 270 degrees
    GridTransform {
        a: 1,
        b: 0,
        c: 0,
        d: 1,
    },
    GridTransform {
        a: 0,
        b: 1,
        c: -1,
        d: 0,
    },
    GridTransform {
        a: -1,
        b: 0,
        c: 0,
        d: -1,
    },
    GridTransform {
        a: 0,
        b: -1,
        c: 1,
        d: 0,
    },
    // reflections
    GridTransform {
        a: -1,
        b: 0,
        c: 0,
        d: 1,
    },
    GridTransform {
        a: 1,
        b: 0,
        c: 0,
        d: -1,
    },
    GridTransform {
        a: 0,
        b: 1,
        c: 1,
        d: 0,
    },
    GridTransform {
        a: 0,
        b: -1,
        c: -1,
        d: 0,
    },
];
