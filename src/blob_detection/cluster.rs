//! Grouping of sampled candidate points into blobs

use crate::frame::{Point, Rect};
use std::collections::{HashMap, VecDeque};

/// Connected cluster of sampled points
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub members: Vec<Point>,
    pub centroid: Point,
    /// Approximate pixel count: members times step squared
    pub size: u32,
    pub bounds: Rect,
}

impl Blob {
    pub fn from_members(members: Vec<Point>, step: u32) -> Self {
        let n = members.len().max(1) as i64;
        let (sum_x, sum_y) = members
            .iter()
            .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x as i64, sy + p.y as i64));
        let centroid = Point::new(
            (sum_x as f64 / n as f64).round() as i32,
            (sum_y as f64 / n as f64).round() as i32,
        );

        let min_x = members.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = members.iter().map(|p| p.x).max().unwrap_or(0);
        let min_y = members.iter().map(|p| p.y).min().unwrap_or(0);
        let max_y = members.iter().map(|p| p.y).max().unwrap_or(0);
        let bounds = Rect::new(
            min_x.max(0) as u32,
            min_y.max(0) as u32,
            (max_x - min_x) as u32 + step,
            (max_y - min_y) as u32 + step,
        );

        Self {
            size: members.len() as u32 * step * step,
            members,
            centroid,
            bounds,
        }
    }

    /// Estimated pixels over bounding box area
    pub fn fill_ratio(&self) -> f64 {
        let area = (self.bounds.width * self.bounds.height).max(1);
        self.size as f64 / area as f64
    }

    /// Longest side over shortest side
    pub fn aspect_ratio(&self) -> f64 {
        let long = self.bounds.width.max(self.bounds.height) as f64;
        let short = self.bounds.width.min(self.bounds.height).max(1) as f64;
        long / short
    }
}

/// Breadth-first grouping: points within `max_distance` (Euclidean) share a cluster
///
/// Neighbor lookups go through a grid of `max_distance` cells, so only the
/// surrounding nine cells are compared.
pub fn cluster_points(points: &[Point], max_distance: f64) -> Vec<Vec<Point>> {
    if points.is_empty() {
        return Vec::new();
    }
    let cell = max_distance.max(1.0).ceil() as i32;
    let max_sq = max_distance * max_distance;
    let key = |p: &Point| (p.x.div_euclid(cell), p.y.div_euclid(cell));

    let mut grid: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
    for (i, p) in points.iter().enumerate() {
        grid.entry(key(p)).or_default().push(i);
    }

    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let mut members = Vec::new();

        while let Some(i) = queue.pop_front() {
            let p = points[i];
            members.push(p);
            let (cx, cy) = key(&p);
            for gy in cy - 1..=cy + 1 {
                for gx in cx - 1..=cx + 1 {
                    let Some(bucket) = grid.get(&(gx, gy)) else {
                        continue;
                    };
                    for &j in bucket {
                        if visited[j] {
                            continue;
                        }
                        let q = points[j];
                        let dx = (p.x - q.x) as f64;
                        let dy = (p.y - q.y) as f64;
                        if dx * dx + dy * dy <= max_sq {
                            visited[j] = true;
                            queue.push_back(j);
                        }
                    }
                }
            }
        }
        clusters.push(members);
    }
    clusters
}
