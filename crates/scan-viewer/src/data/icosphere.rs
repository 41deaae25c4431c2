use crate::data::types::MeshVertex;
use glam::Vec3;
use std::collections::HashMap;

/// Unit-radius geodesic sphere. `detail` subdivides every icosahedron face
/// into four, so detail 1 yields 42 vertices and 80 triangles.
pub fn icosphere(detail: u32) -> (Vec<MeshVertex>, Vec<u16>) {
    let t = (1.0 + 5.0f32.sqrt()) * 0.5;

    let mut positions: Vec<Vec3> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .into_iter()
    .map(|p| Vec3::from(p).normalize())
    .collect();

    #[rustfmt::skip]
    let mut faces: Vec<[u16; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    for _ in 0..detail {
        let mut midpoints: HashMap<(u16, u16), u16> = HashMap::new();
        let mut midpoint = |a: u16, b: u16, positions: &mut Vec<Vec3>| -> u16 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let p = ((positions[a as usize] + positions[b as usize]) * 0.5).normalize();
                positions.push(p);
                (positions.len() - 1) as u16
            })
        };

        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }

    let vertices = positions
        .iter()
        .map(|p| MeshVertex {
            position: p.to_array(),
            normal: p.to_array(),
        })
        .collect();
    let indices = faces.into_iter().flatten().collect();

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_one_counts() {
        let (v, i) = icosphere(1);
        assert_eq!(v.len(), 42);
        assert_eq!(i.len(), 80 * 3);
    }

    #[test]
    fn vertices_lie_on_unit_sphere_with_outward_winding() {
        let (v, i) = icosphere(1);
        for vert in &v {
            assert!((Vec3::from(vert.position).length() - 1.0).abs() < 1e-5);
        }
        for tri in i.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| Vec3::from(v[tri[k] as usize].position));
            let n = (b - a).cross(c - a);
            assert!(n.dot(a + b + c) > 0.0);
        }
    }
}
