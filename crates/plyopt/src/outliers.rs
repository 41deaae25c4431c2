//! Statistical outlier removal.
//!
//! Each point is scored by the mean distance to its `k` nearest neighbours.
//! Points scoring above `mean + std_ratio * std` of all scores are dropped.

use plyfmt::PlyCloud;
use rayon::prelude::*;
use rstar::RTree;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierStats {
    pub mean: f64,
    pub std: f64,
    pub threshold: f64,
}

/// Mean distance from each point to its `k` nearest neighbours, the point
/// itself excluded. `k` is capped at `len - 1`.
pub fn mean_neighbor_distances(positions: &[[f32; 3]], k: usize) -> Vec<f64> {
    let k = k.min(positions.len().saturating_sub(1));
    if k == 0 {
        return vec![0.0; positions.len()];
    }

    let tree = RTree::bulk_load(positions.to_vec());

    positions
        .par_iter()
        .map(|p| {
            let sum: f64 = tree
                .nearest_neighbor_iter_with_distance_2(p)
                .skip(1)
                .take(k)
                .map(|(_, d2)| (d2 as f64).sqrt())
                .sum();
            sum / k as f64
        })
        .collect()
}

/// Returns the keep mask and the score statistics. Clouds too small to have
/// neighbours keep every point and report no stats.
pub fn outlier_mask(positions: &[[f32; 3]], k: usize, std_ratio: f64) -> (Vec<bool>, Option<OutlierStats>) {
    if positions.len() < 2 || k == 0 {
        return (vec![true; positions.len()], None);
    }

    let scores = mean_neighbor_distances(positions, k);
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    let threshold = mean + std_ratio * std;

    let mask = scores.iter().map(|&s| s <= threshold).collect();
    (mask, Some(OutlierStats { mean, std, threshold }))
}

/// Copies the points whose mask entry is set. Faces are dropped since the
/// vertex indices no longer line up.
pub fn select(cloud: &PlyCloud, mask: &[bool]) -> PlyCloud {
    fn pick(src: &[[f32; 3]], mask: &[bool]) -> Vec<[f32; 3]> {
        src.iter()
            .zip(mask)
            .filter_map(|(v, &keep)| keep.then_some(*v))
            .collect()
    }

    PlyCloud {
        positions: pick(&cloud.positions, mask),
        colors: cloud.colors.as_deref().map(|c| pick(c, mask)),
        normals: cloud.normals.as_deref().map(|n| pick(n, mask)),
        faces: Vec::new(),
    }
}

/// Runs the full removal step on `cloud`.
pub fn remove_statistical_outliers(cloud: &PlyCloud, k: usize, std_ratio: f64) -> (PlyCloud, Option<OutlierStats>) {
    let (mask, stats) = outlier_mask(&cloud.positions, k, std_ratio);
    (select(cloud, &mask), stats)
}
