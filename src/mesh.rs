use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::grid::{ActiveCell, CellSize};

/// 立方体 8 个角点的单位偏移，顺序固定
pub const CUBE_CORNERS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// 每个立方体 12 个三角形（6 个面，每面 2 个），所有调用点共用同一绕序
pub const FACE_TEMPLATE: [[u32; 3]; 12] = [
    [0, 1, 2],
    [0, 2, 3],
    [4, 6, 5],
    [4, 7, 6],
    [0, 4, 5],
    [0, 5, 1],
    [2, 6, 7],
    [2, 7, 3],
    [0, 3, 7],
    [0, 7, 4],
    [1, 5, 6],
    [1, 6, 2],
];

/// 渲染网格：展平的顶点坐标与三角形索引
/// 只在渲染时构建，不持久化
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub i: Vec<u32>,
    pub j: Vec<u32>,
    pub k: Vec<u32>,
    /// 每个三角形的颜色映射值；注入井网格为空
    pub intensity: Vec<f64>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.x.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.i.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// 逐个立方体追加顶点与三角形，维护运行中的顶点计数
pub struct MeshBuilder {
    mesh: Mesh,
    vertex_index: u32,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cubes: usize) -> Self {
        let vertices = cubes * CUBE_CORNERS.len();
        let triangles = cubes * FACE_TEMPLATE.len();
        MeshBuilder {
            mesh: Mesh {
                x: Vec::with_capacity(vertices),
                y: Vec::with_capacity(vertices),
                z: Vec::with_capacity(vertices),
                i: Vec::with_capacity(triangles),
                j: Vec::with_capacity(triangles),
                k: Vec::with_capacity(triangles),
                intensity: Vec::with_capacity(triangles),
            },
            vertex_index: 0,
        }
    }

    /// 追加一个立方体；`intensity` 复制到它的全部 12 个三角形
    pub fn push_cube(&mut self, corners: &[[f64; 3]; 8], intensity: Option<f64>) {
        for [x, y, z] in corners {
            self.mesh.x.push(*x);
            self.mesh.y.push(*y);
            self.mesh.z.push(*z);
        }
        let base = self.vertex_index;
        for [a, b, c] in FACE_TEMPLATE {
            self.mesh.i.push(base + a);
            self.mesh.j.push(base + b);
            self.mesh.k.push(base + c);
            if let Some(value) = intensity {
                self.mesh.intensity.push(value);
            }
        }
        self.vertex_index += CUBE_CORNERS.len() as u32;
    }

    pub fn finish(self) -> Mesh {
        self.mesh
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 以最小角点和边长生成立方体 8 个角点
pub fn cube_corners(origin: [f64; 3], size: [f64; 3]) -> [[f64; 3]; 8] {
    CUBE_CORNERS.map(|[ox, oy, oz]| {
        [
            origin[0] + ox * size[0],
            origin[1] + oy * size[1],
            origin[2] + oz * size[2],
        ]
    })
}

/// 活跃单元 -> 立方体网格，单元覆盖 [x, x+dx] × [y, y+dy] × [z, z+dz]
pub fn build_mesh(cells: &[ActiveCell], cell_size: &CellSize) -> Mesh {
    let size = [cell_size.dx, cell_size.dy, cell_size.dz];
    let mut builder = MeshBuilder::with_capacity(cells.len());
    for cell in cells {
        builder.push_cube(&cube_corners([cell.x, cell.y, cell.z], size), Some(cell.value));
    }
    builder.finish()
}

/// 默认注入井位置
pub const DEFAULT_WELLS: [[f64; 3]; 4] = [
    [2500.0, 2500.0, -2500.0],
    [2500.0, 7500.0, -2500.0],
    [7500.0, 2500.0, -2500.0],
    [7438.0, 7438.0, -2500.0],
];

pub const DEFAULT_INJECTOR_CUBE_SIZE: f64 = 200.0;

/// 注入井配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectorConfig {
    pub wells: Vec<[f64; 3]>,
    #[serde(default = "default_cube_size")]
    pub cube_size: f64,
}

fn default_cube_size() -> f64 {
    DEFAULT_INJECTOR_CUBE_SIZE
}

impl Default for InjectorConfig {
    fn default() -> Self {
        InjectorConfig {
            wells: DEFAULT_WELLS.to_vec(),
            cube_size: DEFAULT_INJECTOR_CUBE_SIZE,
        }
    }
}

/// 注入井几何：每口井一个以井位为中心的立方体
/// 与时间步和阈值无关
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectorGeometry {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl InjectorGeometry {
    pub fn from_config(config: &InjectorConfig) -> Self {
        let half = config.cube_size / 2.0;
        let size = [config.cube_size; 3];
        let mut vertices = Vec::with_capacity(config.wells.len() * CUBE_CORNERS.len());
        let mut faces = Vec::with_capacity(config.wells.len() * FACE_TEMPLATE.len());
        for (n, [cx, cy, cz]) in config.wells.iter().enumerate() {
            vertices.extend(cube_corners([cx - half, cy - half, cz - half], size));
            let base = (n * CUBE_CORNERS.len()) as u32;
            faces.extend(FACE_TEMPLATE.map(|[a, b, c]| [base + a, base + b, base + c]));
        }
        InjectorGeometry { vertices, faces }
    }

    pub fn cube_count(&self) -> usize {
        self.vertices.len() / CUBE_CORNERS.len()
    }

    /// 按同一模板重建渲染网格（顶点直接给出，不从角点推算）
    pub fn to_mesh(&self) -> Mesh {
        let mut builder = MeshBuilder::with_capacity(self.cube_count());
        for chunk in self.vertices.chunks_exact(CUBE_CORNERS.len()) {
            let corners: [[f64; 3]; 8] = [
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ];
            builder.push_cube(&corners, None);
        }
        builder.finish()
    }
}

/// 二进制网格格式的魔数
pub const MESH_MAGIC: &[u8; 4] = b"CO2M";
pub const MESH_FORMAT_VERSION: u32 = 1;

/// 将网格序列化为小端二进制
///
/// 布局：魔数、版本、顶点数、三角形数、强度数（u32），
/// 然后是交错的 xyz (f32)、三角形索引 (u32)、强度 (f32)
pub fn encode_mesh(mesh: &Mesh) -> std::io::Result<Vec<u8>> {
    let vertices = mesh.vertex_count();
    let triangles = mesh.triangle_count();
    let mut bytes = Vec::with_capacity(20 + vertices * 12 + triangles * 12 + mesh.intensity.len() * 4);

    bytes.write_all(MESH_MAGIC)?;
    bytes.write_u32::<LittleEndian>(MESH_FORMAT_VERSION)?;
    bytes.write_u32::<LittleEndian>(vertices as u32)?;
    bytes.write_u32::<LittleEndian>(triangles as u32)?;
    bytes.write_u32::<LittleEndian>(mesh.intensity.len() as u32)?;

    for n in 0..vertices {
        bytes.write_f32::<LittleEndian>(mesh.x[n] as f32)?;
        bytes.write_f32::<LittleEndian>(mesh.y[n] as f32)?;
        bytes.write_f32::<LittleEndian>(mesh.z[n] as f32)?;
    }
    for n in 0..triangles {
        bytes.write_u32::<LittleEndian>(mesh.i[n])?;
        bytes.write_u32::<LittleEndian>(mesh.j[n])?;
        bytes.write_u32::<LittleEndian>(mesh.k[n])?;
    }
    for value in &mesh.intensity {
        bytes.write_f32::<LittleEndian>(*value as f32)?;
    }
    Ok(bytes)
}

/// gzip 压缩
pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::{Cursor, Read};

    fn cell(x: f64, value: f64) -> ActiveCell {
        ActiveCell {
            x,
            y: 0.0,
            z: 0.0,
            value,
        }
    }

    #[test]
    fn counts_scale_with_cells() {
        let size = CellSize {
            dx: 1.0,
            dy: 2.0,
            dz: 3.0,
        };
        let cells = vec![cell(0.0, 0.2), cell(5.0, 0.4), cell(9.0, 0.9)];
        let mesh = build_mesh(&cells, &size);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.y.len(), 24);
        assert_eq!(mesh.z.len(), 24);
        assert_eq!(mesh.triangle_count(), 36);
        assert_eq!(mesh.k.len(), 36);
        assert_eq!(mesh.intensity.len(), 36);
    }

    #[test]
    fn second_cube_indices_are_offset_by_eight() {
        let size = CellSize {
            dx: 1.0,
            dy: 1.0,
            dz: 1.0,
        };
        let mesh = build_mesh(&[cell(0.0, 0.1), cell(2.0, 0.7)], &size);
        assert_eq!((mesh.i[12], mesh.j[12], mesh.k[12]), (8, 9, 10));
        assert_eq!((mesh.i[23], mesh.j[23], mesh.k[23]), (9, 14, 10));
        assert!(mesh.intensity[..12].iter().all(|v| *v == 0.1));
        assert!(mesh.intensity[12..].iter().all(|v| *v == 0.7));
    }

    #[test]
    fn cube_spans_min_corner_plus_size() {
        let size = CellSize {
            dx: 100.0,
            dy: 50.0,
            dz: 20.0,
        };
        let mesh = build_mesh(&[cell(1000.0, 0.5)], &size);
        assert_eq!((mesh.x[0], mesh.y[0], mesh.z[0]), (1000.0, 0.0, 0.0));
        assert_eq!((mesh.x[6], mesh.y[6], mesh.z[6]), (1100.0, 50.0, 20.0));
    }

    #[test]
    fn empty_cells_give_empty_mesh() {
        let mesh = build_mesh(&[], &CellSize { dx: 1.0, dy: 1.0, dz: 1.0 });
        assert!(mesh.is_empty());
        assert_eq!(mesh, Mesh::default());
    }

    #[test]
    fn injector_cubes_are_centred_on_wells() {
        let geometry = InjectorGeometry::from_config(&InjectorConfig::default());
        assert_eq!(geometry.vertices.len(), 32);
        assert_eq!(geometry.faces.len(), 48);
        assert_eq!(geometry.vertices[0], [2400.0, 2400.0, -2600.0]);
        assert_eq!(geometry.vertices[6], [2600.0, 2600.0, -2400.0]);
        assert_eq!(geometry.faces[12], [8, 9, 10]);

        let mesh = geometry.to_mesh();
        assert_eq!(mesh.vertex_count(), 32);
        assert_eq!(mesh.triangle_count(), 48);
        assert!(mesh.intensity.is_empty());
        let firsts: Vec<u32> = geometry.faces.iter().map(|f| f[0]).collect();
        assert_eq!(mesh.i, firsts);
    }

    #[test]
    fn binary_header_describes_payload() {
        let size = CellSize { dx: 1.0, dy: 1.0, dz: 1.0 };
        let mesh = build_mesh(&[cell(0.0, 0.5)], &size);
        let bytes = encode_mesh(&mesh).unwrap();
        assert_eq!(bytes.len(), 20 + 8 * 12 + 12 * 12 + 12 * 4);

        let mut reader = Cursor::new(&bytes);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, MESH_MAGIC);
        assert_eq!(reader.read_u32::<LittleEndian>().unwrap(), MESH_FORMAT_VERSION);
        assert_eq!(reader.read_u32::<LittleEndian>().unwrap(), 8);
        assert_eq!(reader.read_u32::<LittleEndian>().unwrap(), 12);
        assert_eq!(reader.read_u32::<LittleEndian>().unwrap(), 12);
    }

    #[test]
    fn gzip_output_decompresses() {
        let payload = vec![7u8; 4096];
        let compressed = gzip(&payload).unwrap();
        assert!(compressed.len() < payload.len());
        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).unwrap();
        assert_eq!(restored, payload);
    }
}
