use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use kiddo::{KdTree, SquaredEuclidean};
use lenscal_core::Corner;
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};

/// Step along the grid axes, in the frame of the dominant grid axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    /// Integer grid step `(di, dj)`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Classify an edge against the grid axes `u = (cos a, sin a)` and `v = u` rotated by +90 degrees.
fn classify_direction(edge: &Vector2<f32>, axis_angle: f32) -> NeighborDirection {
    let u = Vector2::new(axis_angle.cos(), axis_angle.sin());
    let v = Vector2::new(-u.y, u.x);
    let (eu, ev) = (edge.dot(&u), edge.dot(&v));
    if eu.abs() > ev.abs() {
        if eu >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if ev >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
    axis_angle: f32,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // 1. Adjacent chessboard corners have orthogonal diagonals.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    // 2. Distance within the expected spacing window.
    let vec_to_neighbor = neighbor.position - corner.position;
    let distance = vec_to_neighbor.norm();
    if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
        return None;
    }

    // 3. Corner orientation is the diagonal, so a grid edge sits at ~45
    //    degrees to the orientation of both endpoints.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let expected = std::f32::consts::FRAC_PI_4;
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - expected).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - expected).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    let direction = classify_direction(&vec_to_neighbor, axis_angle);

    let score_orientation = (std::f32::consts::FRAC_PI_2
        - angle_diff_abs(corner.orientation, neighbor.orientation))
    .abs();

    Some(NodeNeighbor {
        direction,
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbor per direction, choosing the lowest-score candidate.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates.into_iter() {
        let slot = match candidate.direction {
            NeighborDirection::Right => &mut best[0],
            NeighborDirection::Left => &mut best[1],
            NeighborDirection::Up => &mut best[2],
            NeighborDirection::Down => &mut best[3],
        };

        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };

        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

/// 4-connected neighbour graph over a corner cloud.
pub struct GridGraph {
    /// For each node, at most one neighbour per direction.
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams, axis_angle: f32) -> Self {
        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        let radius_sq = params.max_spacing_pix * params.max_spacing_pix;
        let mut neighbors = Vec::with_capacity(corners.len());

        for (i, corner) in corners.iter().enumerate() {
            let mut node_neighbors = Vec::new();

            let query_point = [corner.position.x, corner.position.y];
            let mut results = tree.within_unsorted::<SquaredEuclidean>(&query_point, radius_sq);
            results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            results.truncate(params.k_neighbors + 1);

            for nn in results.into_iter() {
                let neighbor_index = nn.item as usize;
                if neighbor_index == i {
                    continue;
                }
                if let Some(entry) = is_good_neighbor(
                    corner,
                    &corners[neighbor_index],
                    neighbor_index,
                    params,
                    axis_angle,
                ) {
                    node_neighbors.push(entry);
                }
            }

            neighbors.push(select_neighbors(node_neighbors));
        }

        Self { neighbors }
    }
}

/// Median distance from each corner to its nearest other corner.
pub fn median_nearest_distance(corners: &[Corner]) -> Option<f32> {
    if corners.len() < 2 {
        return None;
    }
    let mut distances: Vec<f32> = corners
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            corners
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, o)| (o.position - c.position).norm())
                .filter(|d| *d > 0.0)
                .min_by(|a, b| a.total_cmp(b))
        })
        .collect();
    if distances.is_empty() {
        return None;
    }
    distances.sort_by(|a, b| a.total_cmp(b));
    Some(distances[distances.len() / 2])
}

/// Connected components of the (undirected view of the) graph.
pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let n = graph.neighbors.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (node, list) in graph.neighbors.iter().enumerate() {
        for nb in list {
            adjacency[node].push(nb.index);
            adjacency[nb.index].push(node);
        }
    }

    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);

            for &next in &adjacency[node] {
                if !visited[next] {
                    stack.push(next);
                }
            }
        }

        components.push(component);
    }

    components
}

/// BFS integer coordinates for a component.
///
/// Returns `None` when two edges disagree about a node's position or two
/// nodes land on the same cell. Coordinates are shifted so the minimum is
/// `(0, 0)`.
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    component: &[usize],
) -> Option<Vec<(usize, i32, i32)>> {
    let start = *component.first()?;
    let mut assigned: HashMap<usize, (i32, i32)> = HashMap::with_capacity(component.len());
    let mut queue = VecDeque::new();
    assigned.insert(start, (0, 0));
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        let (i, j) = assigned[&node];
        for nb in &graph.neighbors[node] {
            let (di, dj) = nb.direction.delta();
            let expected = (i + di, j + dj);
            match assigned.get(&nb.index) {
                Some(&existing) if existing != expected => return None,
                Some(_) => {}
                None => {
                    assigned.insert(nb.index, expected);
                    queue.push_back(nb.index);
                }
            }
        }
    }

    // Edges pointing into the component from nodes reached via reverse links.
    for &node in component {
        let &(i, j) = assigned.get(&node)?;
        for nb in &graph.neighbors[node] {
            let (di, dj) = nb.direction.delta();
            if assigned.get(&nb.index) != Some(&(i + di, j + dj)) {
                return None;
            }
        }
    }

    let min_i = assigned.values().map(|c| c.0).min()?;
    let min_j = assigned.values().map(|c| c.1).min()?;
    let mut cells: HashMap<(i32, i32), usize> = HashMap::with_capacity(assigned.len());
    let mut out = Vec::with_capacity(assigned.len());
    for (&node, &(i, j)) in &assigned {
        let cell = (i - min_i, j - min_j);
        if cells.insert(cell, node).is_some() {
            return None;
        }
        out.push((node, cell.0, cell.1));
    }
    out.sort_unstable_by_key(|&(node, _, _)| node);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner::new(x, y, orientation, 1.0)
    }

    fn neighbor_map(neighbors: &[NodeNeighbor]) -> HashMap<NeighborDirection, &NodeNeighbor> {
        neighbors.iter().map(|n| (n.direction, n)).collect()
    }

    fn params() -> GridGraphParams {
        GridGraphParams {
            min_spacing_pix: 5.0,
            max_spacing_pix: 15.0,
            ..Default::default()
        }
    }

    fn grid(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(make_corner(i as f32 * spacing, j as f32 * spacing, orientation));
            }
        }
        corners
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let spacing = 10.0;
        let cols = 3;
        let corners = grid(3, 3, spacing);
        let graph = GridGraph::new(&corners, &params(), 0.0);

        let idx = |i: usize, j: usize| j * cols + i;

        let center = neighbor_map(&graph.neighbors[idx(1, 1)]);
        assert_eq!(4, center.len());
        assert_eq!(idx(0, 1), center[&NeighborDirection::Left].index);
        assert_eq!(idx(2, 1), center[&NeighborDirection::Right].index);
        assert_eq!(idx(1, 0), center[&NeighborDirection::Up].index);
        assert_eq!(idx(1, 2), center[&NeighborDirection::Down].index);
        for n in center.values() {
            assert!((n.distance - spacing).abs() < 1e-4);
        }

        let top_left = neighbor_map(&graph.neighbors[idx(0, 0)]);
        assert_eq!(2, top_left.len());
        assert!(top_left.contains_key(&NeighborDirection::Right));
        assert!(top_left.contains_key(&NeighborDirection::Down));
    }

    #[test]
    fn rejects_neighbors_when_orientation_relation_invalid() {
        let corners = vec![make_corner(0.0, 0.0, FRAC_PI_4), make_corner(10.0, 0.0, FRAC_PI_4)];
        let graph = GridGraph::new(&corners, &params(), 0.0);
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn rejects_neighbors_outside_distance_window() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(30.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(), 0.0);
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn keeps_best_candidate_per_direction() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 0.0, 3.0 * FRAC_PI_4),
            make_corner(12.0, 0.0, 3.0 * FRAC_PI_4 + 0.1),
            make_corner(-10.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(), 0.0);

        let map = neighbor_map(&graph.neighbors[0]);
        assert_eq!(2, map.len());
        assert_eq!(1, map[&NeighborDirection::Right].index);
        assert_eq!(3, map[&NeighborDirection::Left].index);
    }

    #[test]
    fn bfs_assigns_consistent_coordinates() {
        let corners = grid(4, 3, 10.0);
        let graph = GridGraph::new(&corners, &params(), 0.0);
        let components = connected_components(&graph);
        assert_eq!(components.len(), 1);

        let coords = assign_grid_coordinates(&graph, &components[0]).expect("consistent");
        assert_eq!(coords.len(), 12);
        for (node, i, j) in coords {
            assert_eq!((node % 4, node / 4), (i as usize, j as usize));
        }
    }

    #[test]
    fn median_spacing_of_grid() {
        let corners = grid(5, 4, 12.0);
        let m = median_nearest_distance(&corners).expect("spacing");
        assert!((m - 12.0).abs() < 1e-4);
    }
}
