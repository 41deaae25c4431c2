//! Voxel-grid downsampling: every occupied `floor(p / voxel)` cell collapses
//! to the centroid of its points.

use hashbrown::HashMap;
use plyfmt::PlyCloud;
use rayon::prelude::*;

type CellKey = [i64; 3];

#[derive(Default, Clone, Copy)]
struct Cell {
    pos: [f64; 3],
    color: [f64; 3],
    normal: [f64; 3],
    count: u32,
}

impl Cell {
    fn merge(&mut self, other: &Cell) {
        for i in 0..3 {
            self.pos[i] += other.pos[i];
            self.color[i] += other.color[i];
            self.normal[i] += other.normal[i];
        }
        self.count += other.count;
    }
}

#[inline]
pub fn cell_of(p: [f32; 3], voxel: f32) -> CellKey {
    let inv = 1.0 / voxel as f64;
    [
        (p[0] as f64 * inv).floor() as i64,
        (p[1] as f64 * inv).floor() as i64,
        (p[2] as f64 * inv).floor() as i64,
    ]
}

/// Downsamples `cloud`. Colours are averaged; normals are averaged and
/// renormalized. Output cells are ordered by cell index.
pub fn voxel_downsample(cloud: &PlyCloud, voxel: f32) -> PlyCloud {
    let colors = cloud.colors.as_deref();
    let normals = cloud.normals.as_deref();

    let cells: HashMap<CellKey, Cell> = (0..cloud.len())
        .into_par_iter()
        .fold(HashMap::new, |mut acc: HashMap<CellKey, Cell>, i| {
            let p = cloud.positions[i];
            let entry = acc.entry(cell_of(p, voxel)).or_default();
            let c = colors.map_or([0.0; 3], |c| c[i]);
            let n = normals.map_or([0.0; 3], |n| n[i]);
            entry.merge(&Cell {
                pos: p.map(f64::from),
                color: c.map(f64::from),
                normal: n.map(f64::from),
                count: 1,
            });
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (key, cell) in b {
                a.entry(key).or_default().merge(&cell);
            }
            a
        });

    let mut cells: Vec<(CellKey, Cell)> = cells.into_iter().collect();
    cells.sort_unstable_by_key(|(key, _)| *key);

    let avg = |v: [f64; 3], n: u32| v.map(|x| (x / n as f64) as f32);

    PlyCloud {
        positions: cells.iter().map(|(_, c)| avg(c.pos, c.count)).collect(),
        colors: colors.map(|_| cells.iter().map(|(_, c)| avg(c.color, c.count)).collect()),
        normals: normals.map(|_| {
            cells
                .iter()
                .map(|(_, c)| {
                    let len = (c.normal[0] * c.normal[0]
                        + c.normal[1] * c.normal[1]
                        + c.normal[2] * c.normal[2])
                        .sqrt();
                    if len > 0.0 {
                        c.normal.map(|x| (x / len) as f32)
                    } else {
                        [0.0; 3]
                    }
                })
                .collect()
        }),
        faces: Vec::new(),
    }
}
