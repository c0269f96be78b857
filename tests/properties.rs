use proptest::prelude::*;

use co2_voxel_backend::grid::{ActiveCell, Bounds, CellSize, CellSpacing, GridGeometry, reduce};
use co2_voxel_backend::mesh::build_mesh;
use co2_voxel_backend::parsers::read_property_values;
use co2_voxel_backend::utils::property_field::PropertyField;

proptest! {
    #[test]
    fn rle_blocks_expand_to_their_counts(
        runs in prop::collection::vec((1usize..20, 0u32..1000), 0..30)
    ) {
        let body: Vec<String> = runs
            .iter()
            .map(|(count, value)| format!("{}*{}", count, *value as f64 / 1000.0))
            .collect();
        let text = format!("YMFS\n{}\n/\n", body.join(" "));
        let values = read_property_values(text.as_bytes()).unwrap();

        let total: usize = runs.iter().map(|(count, _)| count).sum();
        prop_assert_eq!(values.len(), total);

        let mut offset = 0;
        for (count, value) in &runs {
            let expected = *value as f64 / 1000.0;
            prop_assert!(values[offset..offset + count].iter().all(|v| *v == expected));
            offset += count;
        }
    }

    #[test]
    fn mesh_has_eight_vertices_and_twelve_triangles_per_cell(n in 0usize..64) {
        let cells: Vec<ActiveCell> = (0..n)
            .map(|i| ActiveCell { x: i as f64, y: 0.0, z: 0.0, value: 0.5 })
            .collect();
        let mesh = build_mesh(&cells, &CellSize { dx: 1.0, dy: 1.0, dz: 1.0 });
        prop_assert_eq!(mesh.vertex_count(), 8 * n);
        prop_assert_eq!(mesh.triangle_count(), 12 * n);
        prop_assert_eq!(mesh.intensity.len(), 12 * n);
        prop_assert!(mesh.i.iter().chain(&mesh.j).chain(&mesh.k).all(|&idx| (idx as usize) < 8 * n));
    }

    #[test]
    fn reduced_cells_respect_threshold(
        values in prop::collection::vec(0.0f64..1.0, 0..80),
        threshold in 0.0f64..1.0,
    ) {
        let geometry = GridGeometry::from_bounds(
            [4, 4, 4],
            Bounds { x: [0.0, 4.0], y: [0.0, 4.0], z: [0.0, 4.0] },
            CellSpacing::Cells,
        );
        let field = PropertyField::new("YMFS", values.clone());
        let cells = reduce(&field, &geometry, threshold);

        let padding = 64usize.saturating_sub(values.len());
        let mut expected = values.iter().take(64).filter(|v| **v >= threshold).count();
        if threshold <= 0.0 {
            expected += padding;
        }
        prop_assert_eq!(cells.len(), expected);
        prop_assert!(cells.iter().all(|c| c.value >= threshold));
    }
}
