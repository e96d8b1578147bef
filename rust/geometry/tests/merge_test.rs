// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use propcombine_geometry::{
    basis_correction, rotation_matrix, Mesh, MeshCodec, SmdCodec, Vector3,
};
use rustc_hash::FxHashMap;
use std::fs;

const PLANK_SMD: &str = "version 1
nodes
0 \"plank\" -1
end
skeleton
time 0
0 0 0 0 0 0 0
end
triangles
Wood_Plank
0 0 0 0 0 0 1 0 0
0 8 0 0 0 0 1 1 0
0 0 0 2 0 0 1 0 1
Wood_End
0 8 0 0 0 1 0 1 0
0 8 0 2 0 1 0 1 1
0 0 0 2 0 1 0 0 1
end
";

fn bounds_of(mesh: &Mesh) -> ([f32; 3], [f32; 3]) {
    let (min, max) = mesh.bounds();
    ([min.x, min.y, min.z], [max.x, max.y, max.z])
}

#[test]
fn test_plank_stack_through_codec() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("plank_ref.smd");
    fs::write(&source, PLANK_SMD).unwrap();

    let mut plank = SmdCodec.read(&source).unwrap();
    plank.scale_positions(2.0);
    let mut skin = FxHashMap::default();
    skin.insert("wood_plank".to_string(), "wood_plank_wet".to_string());
    plank.rename_materials(&skin);
    plank.rotate(&basis_correction());

    // Two planks, the second turned around and lifted
    let mut stack = Mesh::new();
    stack.append_transformed(&plank, &rotation_matrix(0.0, 0.0, 0.0), &Vector3::zeros());
    stack.append_transformed(
        &plank,
        &rotation_matrix(0.0, 180.0, 0.0),
        &Vector3::new(0.0, 0.0, 4.0),
    );

    assert_eq!(stack.triangle_count(), 4);
    assert_eq!(stack.vertex_count(), 12);
    assert_eq!(stack.materials, vec!["wood_plank_wet".to_string(), "Wood_End".to_string()]);

    // Authored along +X, turned onto +Y by the basis, then mirrored to -Y
    let (min, max) = bounds_of(&stack);
    assert_relative_eq!(min[1], -16.0, epsilon = 1e-4);
    assert_relative_eq!(max[1], 16.0, epsilon = 1e-4);
    assert_relative_eq!(max[2], 8.0, epsilon = 1e-4);
    assert_relative_eq!(min[0], 0.0, epsilon = 1e-4);
    assert_relative_eq!(max[0], 0.0, epsilon = 1e-4);

    let target = dir.path().join("stack_ref.smd");
    SmdCodec.write(&stack, &target).unwrap();
    let reread = SmdCodec.read(&target).unwrap();
    assert_eq!(reread.triangle_count(), 4);
    assert_eq!(bounds_of(&reread), bounds_of(&stack));
}

#[test]
fn test_normals_follow_rotation() {
    let mut mesh = propcombine_geometry::parse_smd(PLANK_SMD).unwrap();
    mesh.rotate(&basis_correction());

    // Second triangle's normal was +Y; a quarter turn sends it to -X
    let n = &mesh.normals[9..12];
    assert_relative_eq!(n[0], -1.0, epsilon = 1e-6);
    assert_relative_eq!(n[1], 0.0, epsilon = 1e-6);
    assert_relative_eq!(n[2], 0.0, epsilon = 1e-6);
}
