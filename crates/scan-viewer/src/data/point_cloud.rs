use crate::bounds::Aabb;
use crate::data::types::PointVertex;
use glam::Vec3;
use plyfmt::{parse_ply_bytes, PlyCloud};
use rayon::prelude::*;
use std::io;

/// Colour used when the asset carries none.
pub const DEFAULT_POINT_COLOR: [f32; 3] = [0.0, 1.0, 0.0];

/// A decoded scan, ready for upload.
#[derive(Debug, Clone)]
pub struct PointCloud {
    pub vertices: Vec<PointVertex>,
    pub has_colors: bool,
    /// True when normals came from the file or were derived from faces.
    pub has_normals: bool,
    /// Bounds in the scan's own (untransformed) frame.
    pub bounds: Aabb,
}

impl PointCloud {
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice())
    }
}

/// Decodes a PLY buffer into renderable points.
///
/// Normals come from the file when present, otherwise they are derived from
/// faces; a face-less cloud without normals is left unlit (zero normals).
pub fn build_point_cloud(bytes: &[u8]) -> io::Result<PointCloud> {
    let ply = parse_ply_bytes(bytes)?;
    Ok(from_ply(ply))
}

pub fn from_ply(ply: PlyCloud) -> PointCloud {
    let PlyCloud {
        positions,
        colors,
        normals,
        faces,
    } = ply;

    let has_colors = colors.is_some();
    let normals = match normals {
        Some(n) => Some(n),
        None if !faces.is_empty() => Some(face_normals(&positions, &faces)),
        None => None,
    };
    let has_normals = normals.is_some();

    let vertices: Vec<PointVertex> = positions
        .par_iter()
        .enumerate()
        .map(|(i, p)| PointVertex {
            position: *p,
            color: colors.as_ref().map_or(DEFAULT_POINT_COLOR, |c| c[i]),
            normal: normals.as_ref().map_or([0.0; 3], |n| n[i]),
        })
        .collect();

    let points: Vec<Vec3> = positions.iter().copied().map(Vec3::from).collect();
    let bounds = Aabb::from_points(&points);

    log::debug!(
        "Point cloud: {} points, colors={}, normals={}, bounds=min({:.2},{:.2},{:.2}) max({:.2},{:.2},{:.2})",
        vertices.len(),
        has_colors,
        has_normals,
        bounds.min.x, bounds.min.y, bounds.min.z,
        bounds.max.x, bounds.max.y, bounds.max.z,
    );

    PointCloud {
        vertices,
        has_colors,
        has_normals,
        bounds,
    }
}

/// Area-weighted vertex normals from triangle faces. Vertices not touched by
/// any face keep a zero normal.
pub fn face_normals(positions: &[[f32; 3]], faces: &[[u32; 3]]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];

    for f in faces {
        let [a, b, c] = f.map(|i| i as usize);
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        // Cross product length is twice the triangle area.
        let n = (Vec3::from(*pb) - Vec3::from(*pa)).cross(Vec3::from(*pc) - Vec3::from(*pa));
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }

    acc.par_iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect()
}
