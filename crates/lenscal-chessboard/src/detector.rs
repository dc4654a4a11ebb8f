use crate::geom::dominant_grid_axis;
use crate::gridgraph::{
    assign_grid_coordinates, connected_components, median_nearest_distance, GridGraph,
};
use crate::params::ChessboardParams;
use lenscal_core::{BoardGeometry, Corner, GridTransform, GRID_TRANSFORMS_D4};
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Orders a cloud of ChESS corners into a complete chessboard grid.
///
/// Pipeline:
/// 1. Filter corners by strength.
/// 2. Estimate the corner spacing (median nearest-neighbour distance) and
///    the dominant grid axis from the corner orientations.
/// 3. Build a 4-connected neighbour graph (kd-tree candidates, orientation
///    and 45 degree edge checks, best neighbour per direction).
/// 4. BFS each connected component into integer grid coordinates.
/// 5. Keep the first component forming a complete, conflict-free
///    `columns x rows` grid and bring it into canonical orientation.
#[derive(Clone, Debug, Default)]
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// Return the board's interior corners in row-major order, or `None`
    /// when the complete pattern is not present.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, corners, board),
            fields(num_corners = corners.len(), board = %board)
        )
    )]
    pub fn detect_from_corners(
        &self,
        corners: &[Corner],
        board: BoardGeometry,
    ) -> Option<Vec<Point2<f32>>> {
        let strong: Vec<Corner> = corners
            .iter()
            .copied()
            .filter(|c| c.strength >= self.params.min_strength)
            .collect();

        debug!(
            "{} of {} corners pass the strength filter",
            strong.len(),
            corners.len()
        );
        if strong.len() < board.corner_count() {
            return None;
        }

        let spacing = median_nearest_distance(&strong)?;
        let axis =
            dominant_grid_axis(strong.iter().map(|c| (c.orientation, c.strength.max(1e-6))))?;
        let graph = GridGraph::new(&strong, &self.params.graph_params(spacing), axis);

        let mut components = connected_components(&graph);
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));

        for component in components
            .iter()
            .filter(|c| c.len() == board.corner_count())
        {
            let Some(coords) = assign_grid_coordinates(&graph, component) else {
                debug!("component of {} corners has conflicting coordinates", component.len());
                continue;
            };
            let cells: Vec<(Point2<f32>, i32, i32)> = coords
                .into_iter()
                .map(|(idx, i, j)| (strong[idx].position, i, j))
                .collect();
            if let Some(ordered) = canonical_order(&cells, board) {
                return Some(ordered);
            }
        }
        None
    }
}

/// Row-major ordering of a complete grid under `transform`, or `None` when
/// the transformed grid does not cover exactly `columns x rows` cells.
fn ordered_under(
    cells: &[(Point2<f32>, i32, i32)],
    transform: GridTransform,
    board: BoardGeometry,
) -> Option<Vec<Point2<f32>>> {
    let cols = board.columns() as i32;
    let rows = board.rows() as i32;

    let mapped: Vec<(Point2<f32>, [i32; 2])> = cells
        .iter()
        .map(|&(p, i, j)| (p, transform.apply(i, j)))
        .collect();
    let min_c = mapped.iter().map(|(_, c)| c[0]).min()?;
    let min_r = mapped.iter().map(|(_, c)| c[1]).min()?;

    let mut out: Vec<Option<Point2<f32>>> = vec![None; board.corner_count()];
    for (p, [c, r]) in mapped {
        let (c, r) = (c - min_c, r - min_r);
        if c >= cols || r >= rows {
            return None;
        }
        let slot = &mut out[(r * cols + c) as usize];
        if slot.is_some() {
            return None;
        }
        *slot = Some(p);
    }
    out.into_iter().collect()
}

/// Among the dihedral orderings of the grid, pick the one whose first corner
/// is closest to the image origin; ties go to the row direction pointing
/// most towards `+x`.
fn canonical_order(
    cells: &[(Point2<f32>, i32, i32)],
    board: BoardGeometry,
) -> Option<Vec<Point2<f32>>> {
    let cols = board.columns() as usize;
    let mut best: Option<(f32, f32, Vec<Point2<f32>>)> = None;

    for transform in GRID_TRANSFORMS_D4 {
        let Some(points) = ordered_under(cells, transform, board) else {
            continue;
        };
        let origin_dist = points[0].coords.norm_squared();
        let row_dx = if cols > 1 {
            points[1].x - points[0].x
        } else {
            0.0
        };
        let better = match &best {
            None => true,
            Some((d, dx, _)) => {
                let tie = (origin_dist - d).abs() <= 1e-6 * d.max(1.0);
                if tie {
                    row_dx > *dx
                } else {
                    origin_dist < *d
                }
            }
        };
        if better {
            best = Some((origin_dist, row_dx, points));
        }
    }

    best.map(|(_, _, points)| points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn synthetic_board(
        cols: usize,
        rows: usize,
        origin: (f32, f32),
        spacing: f32,
        angle: f32,
    ) -> Vec<Corner> {
        let (s, c) = angle.sin_cos();
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let (u, v) = (i as f32 * spacing, j as f32 * spacing);
                let x = origin.0 + c * u - s * v;
                let y = origin.1 + s * u + c * v;
                let base = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(Corner::new(x, y, base + angle, 1.0));
            }
        }
        corners
    }

    #[test]
    fn orders_axis_aligned_board_row_major() {
        let board = BoardGeometry::new(5, 4).unwrap();
        let mut corners = synthetic_board(5, 4, (40.0, 30.0), 20.0, 0.0);
        corners.reverse();

        let points = ChessboardDetector::default()
            .detect_from_corners(&corners, board)
            .expect("board found");
        assert_eq!(points.len(), 20);
        for (k, p) in points.iter().enumerate() {
            let (row, col) = board.grid_position(k);
            assert!((p.x - (40.0 + col as f32 * 20.0)).abs() < 1e-3);
            assert!((p.y - (30.0 + row as f32 * 20.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn transposed_board_is_reordered() {
        // 4 corners wide, 5 tall in the image; the board is declared 5x4.
        let board = BoardGeometry::new(5, 4).unwrap();
        let corners = synthetic_board(4, 5, (50.0, 50.0), 18.0, 0.0);
        let points = ChessboardDetector::default()
            .detect_from_corners(&corners, board)
            .expect("board found");
        assert_eq!(points.len(), 20);
        // First corner is the one nearest the image origin.
        assert!((points[0].x - 50.0).abs() < 1e-3 && (points[0].y - 50.0).abs() < 1e-3);
        // Consecutive points within a row are one grid step apart.
        for r in 0..4 {
            for c in 0..4 {
                let a = points[r * 5 + c];
                let b = points[r * 5 + c + 1];
                assert!(((b - a).norm() - 18.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn rotated_board_is_found() {
        let board = BoardGeometry::new(6, 4).unwrap();
        let corners = synthetic_board(6, 4, (200.0, 40.0), 25.0, 0.5);
        let points = ChessboardDetector::default()
            .detect_from_corners(&corners, board)
            .expect("board found");
        assert_eq!(points.len(), 24);
        let d01 = (points[1] - points[0]).norm();
        assert!((d01 - 25.0).abs() < 1e-3);
    }

    #[test]
    fn incomplete_board_is_a_miss() {
        let board = BoardGeometry::new(5, 4).unwrap();
        let mut corners = synthetic_board(5, 4, (40.0, 30.0), 20.0, 0.0);
        corners.pop();
        assert!(ChessboardDetector::default()
            .detect_from_corners(&corners, board)
            .is_none());
    }

    #[test]
    fn board_with_outlier_is_still_found() {
        let board = BoardGeometry::new(4, 3).unwrap();
        let mut corners = synthetic_board(4, 3, (100.0, 100.0), 20.0, 0.0);
        corners.push(Corner::new(400.0, 400.0, 0.3, 1.0));
        let points = ChessboardDetector::default()
            .detect_from_corners(&corners, board)
            .expect("board found");
        assert_eq!(points.len(), 12);
        assert!((points[0].x - 100.0).abs() < 1e-3);
    }

    #[test]
    fn weak_corners_are_filtered() {
        let board = BoardGeometry::new(4, 3).unwrap();
        let mut corners = synthetic_board(4, 3, (100.0, 100.0), 20.0, 0.0);
        corners[5].strength = 0.01;
        let detector = ChessboardDetector::new(ChessboardParams {
            min_strength: 0.5,
            ..Default::default()
        });
        assert!(detector.detect_from_corners(&corners, board).is_none());
    }
}
