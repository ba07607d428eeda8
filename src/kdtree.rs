use nalgebra::Vector3;
use ndarray::prelude::*;
use ordered_float::OrderedFloat;

use std::collections::BinaryHeap;

const LEAF_SIZE: usize = 16;

enum KdNode {
    Leaf {
        points: Vec<Vector3<f64>>,
        indices: Vec<usize>,
    },
    NonLeaf {
        axis: usize,
        middle_value: f64,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
}

/// KdTree for fast nearest neighbor search over 3D points.
pub struct KdTree {
    root: Box<KdNode>,
    len: usize,
}

impl KdTree {
    /// Create a new KdTree from a set of points.
    /// The points are stored in a 2D array, where each row is a point.
    ///
    /// # Arguments
    ///
    /// * points - (N x 3) array of points.
    pub fn new(points: &ArrayView2<f64>) -> Self {
        // Recursive creation.
        fn rec(points: &ArrayView2<f64>, mut indices: Vec<usize>, depth: usize) -> KdNode {
            // Stop recursion if this should be a leaf node.
            if indices.len() <= LEAF_SIZE {
                return KdNode::Leaf {
                    points: indices
                        .iter()
                        .map(|idx| {
                            Vector3::new(points[[*idx, 0]], points[[*idx, 1]], points[[*idx, 2]])
                        })
                        .collect(),
                    indices,
                };
            }

            let k = depth % 3;
            indices.sort_by(|idx1, idx2| points[[*idx1, k]].total_cmp(&points[[*idx2, k]]));

            let mid = indices.len() / 2;
            let right_indices = indices.split_off(mid);
            KdNode::NonLeaf {
                axis: k,
                middle_value: points[[right_indices[0], k]],
                left: Box::new(rec(points, indices, depth + 1)),
                right: Box::new(rec(points, right_indices, depth + 1)),
            }
        }

        let len = points.nrows();
        KdTree {
            root: Box::new(rec(points, Vec::from_iter(0..len), 0)),
            len,
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find the nearest neighbor to a query point within a maximum distance.
    ///
    /// # Arguments
    ///
    /// * point - The query point.
    /// * max_distance - Points farther than this are ignored.
    ///
    /// # Returns
    ///
    /// The index of the nearest neighbor and its squared distance, or `None`
    /// if no point lies within `max_distance`.
    pub fn nearest3d(&self, point: &Vector3<f64>, max_distance: f64) -> Option<(usize, f64)> {
        fn rec(node: &KdNode, point: &Vector3<f64>, best: &mut (Option<usize>, f64)) {
            match node {
                KdNode::Leaf {
                    points: leaf_points,
                    indices,
                } => {
                    for (leaf_point, index) in leaf_points.iter().zip(indices.iter()) {
                        let dist = (point - leaf_point).norm_squared();
                        if dist <= best.1 {
                            *best = (Some(*index), dist);
                        }
                    }
                }
                KdNode::NonLeaf {
                    axis,
                    middle_value,
                    left,
                    right,
                } => {
                    let diff = point[*axis] - middle_value;
                    let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                    rec(near, point, best);
                    if diff * diff <= best.1 {
                        rec(far, point, best);
                    }
                }
            }
        }

        let mut best = (None, max_distance * max_distance);
        rec(&self.root, point, &mut best);
        best.0.map(|index| (index, best.1))
    }

    /// Find the `k` nearest neighbors of a query point.
    ///
    /// # Returns
    ///
    /// Indices and squared distances, sorted from the closest to the farthest.
    pub fn knearest3d(&self, point: &Vector3<f64>, k: usize) -> Vec<(usize, f64)> {
        fn rec(
            node: &KdNode,
            point: &Vector3<f64>,
            k: usize,
            heap: &mut BinaryHeap<(OrderedFloat<f64>, usize)>,
        ) {
            match node {
                KdNode::Leaf {
                    points: leaf_points,
                    indices,
                } => {
                    for (leaf_point, index) in leaf_points.iter().zip(indices.iter()) {
                        let dist = OrderedFloat((point - leaf_point).norm_squared());
                        if heap.len() < k {
                            heap.push((dist, *index));
                        } else if heap.peek().map_or(false, |(worst, _)| dist < *worst) {
                            heap.pop();
                            heap.push((dist, *index));
                        }
                    }
                }
                KdNode::NonLeaf {
                    axis,
                    middle_value,
                    left,
                    right,
                } => {
                    let diff = point[*axis] - middle_value;
                    let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                    rec(near, point, k, heap);
                    let visit_far = heap.len() < k
                        || heap
                            .peek()
                            .map_or(true, |(worst, _)| diff * diff < worst.into_inner());
                    if visit_far {
                        rec(far, point, k, heap);
                    }
                }
            }
        }

        if k == 0 {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        rec(&self.root, point, k, &mut heap);
        heap.into_sorted_vec()
            .into_iter()
            .map(|(dist, index)| (index, dist.into_inner()))
            .collect()
    }

    /// Nearest neighbors of every row of `queries` within `max_distance`.
    pub fn nearest(&self, queries: &ArrayView2<f64>, max_distance: f64) -> Vec<Option<usize>> {
        queries
            .rows()
            .into_iter()
            .map(|query| {
                self.nearest3d(&Vector3::new(query[0], query[1], query[2]), max_distance)
                    .map(|(index, _)| index)
            })
            .collect()
    }
}
