use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{PipelineError, PipelineResult};
use crate::grid::geometry::RealCoordinates;
use crate::utils::parser::{ParsedSource, PropertyParser};
use crate::utils::property_field::PropertyField;

/// DIMENSIONS 声明允许的最大点数
pub const MAX_POINTS: usize = 1 << 26;

/// 旧版 VTK (legacy .vtk) 结构网格解析器，支持 ASCII 与 BINARY 两种编码
pub struct VtkParser;

impl VtkParser {
    pub fn new() -> Self {
        VtkParser
    }
}

impl Default for VtkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyParser for VtkParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["vtk"]
    }

    fn name(&self) -> &'static str {
        "VTK Legacy Parser"
    }

    fn parse_from_file(&self, file_path: &Path, property: &str) -> PipelineResult<ParsedSource> {
        let bytes = std::fs::read(file_path)?;
        let dataset = VtkDataset::parse(&bytes)?;
        Ok(dataset.into_source(property))
    }
}

/// 数组挂载位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Cell,
    Point,
}

/// 数组声明方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Scalars,
    Field,
}

#[derive(Debug, Clone)]
pub struct VtkArray {
    pub name: String,
    pub attachment: Attachment,
    pub kind: ArrayKind,
    /// 只保留第一个分量
    pub values: Vec<f64>,
}

/// 解析后的 VTK 数据集（只保留本服务需要的部分）
#[derive(Debug, Clone, Default)]
pub struct VtkDataset {
    pub dataset_type: String,
    /// 点维度 [px, py, pz]
    pub dimensions: Option<[usize; 3]>,
    pub points: Option<Vec<[f64; 3]>>,
    pub arrays: Vec<VtkArray>,
}

/// 属性提取策略：按顺序尝试，第一个成功的生效
pub type ExtractionStrategy = (&'static str, fn(&VtkDataset, &str) -> Option<Vec<f64>>);

pub const EXTRACTION_STRATEGIES: [ExtractionStrategy; 4] = [
    ("cell_scalars", cell_scalars),
    ("cell_field", cell_field),
    ("point_scalars", point_scalars),
    ("point_field", point_field),
];

fn cell_scalars(ds: &VtkDataset, name: &str) -> Option<Vec<f64>> {
    ds.find_array(name, Attachment::Cell, ArrayKind::Scalars)
}

fn cell_field(ds: &VtkDataset, name: &str) -> Option<Vec<f64>> {
    ds.find_array(name, Attachment::Cell, ArrayKind::Field)
}

fn point_scalars(ds: &VtkDataset, name: &str) -> Option<Vec<f64>> {
    ds.find_array(name, Attachment::Point, ArrayKind::Scalars)
}

fn point_field(ds: &VtkDataset, name: &str) -> Option<Vec<f64>> {
    ds.find_array(name, Attachment::Point, ArrayKind::Field)
}

impl VtkDataset {
    pub fn parse(bytes: &[u8]) -> PipelineResult<Self> {
        let mut cursor = Cursor::new(bytes);

        let version = cursor
            .next_line()
            .ok_or_else(|| PipelineError::invalid_vtk("文件为空"))?;
        if !version.trim_start().starts_with("# vtk DataFile") {
            return Err(PipelineError::invalid_vtk(format!(
                "缺少 VTK 文件头: '{}'",
                version.trim()
            )));
        }
        let _title = cursor.next_line();
        let encoding = cursor
            .next_line()
            .ok_or_else(|| PipelineError::invalid_vtk("缺少编码声明"))?;
        cursor.binary = match encoding.trim().to_ascii_uppercase().as_str() {
            "ASCII" => false,
            "BINARY" => true,
            other => {
                return Err(PipelineError::invalid_vtk(format!("未知编码 '{}'", other)));
            }
        };

        let mut dataset = VtkDataset::default();
        let mut attachment = Attachment::Point;
        let mut attached_count = 0usize;
        let mut origin = [0.0; 3];
        let mut spacing = [1.0; 3];
        let mut axes: [Option<Vec<f64>>; 3] = [None, None, None];

        while let Some(keyword) = cursor.next_token() {
            match keyword.to_ascii_uppercase().as_str() {
                "DATASET" => {
                    dataset.dataset_type = cursor.expect_token("DATASET")?.to_ascii_uppercase();
                    if !matches!(
                        dataset.dataset_type.as_str(),
                        "STRUCTURED_GRID" | "RECTILINEAR_GRID" | "STRUCTURED_POINTS"
                    ) {
                        return Err(PipelineError::invalid_vtk(format!(
                            "不支持的数据集类型 {}",
                            dataset.dataset_type
                        )));
                    }
                }
                "DIMENSIONS" => {
                    let px = cursor.expect_usize("DIMENSIONS")?;
                    let py = cursor.expect_usize("DIMENSIONS")?;
                    let pz = cursor.expect_usize("DIMENSIONS")?;
                    let total = checked_count(checked_count(px, py, "DIMENSIONS")?, pz, "DIMENSIONS")?;
                    if total > MAX_POINTS {
                        return Err(PipelineError::invalid_vtk(format!(
                            "DIMENSIONS {} {} {} 超出上限 {}",
                            px, py, pz, MAX_POINTS
                        )));
                    }
                    dataset.dimensions = Some([px, py, pz]);
                }
                "ORIGIN" => origin = cursor.read_triplet()?,
                "SPACING" | "ASPECT_RATIO" => spacing = cursor.read_triplet()?,
                "POINTS" => {
                    let count = cursor.expect_usize("POINTS")?;
                    let data_type = cursor.expect_token("POINTS")?.to_string();
                    let raw = cursor.read_values(checked_count(count, 3, "POINTS")?, &data_type)?;
                    let points = raw.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();
                    dataset.points = Some(points);
                }
                axis @ ("X_COORDINATES" | "Y_COORDINATES" | "Z_COORDINATES") => {
                    let count = cursor.expect_usize(axis)?;
                    let data_type = cursor.expect_token(axis)?.to_string();
                    let slot = match axis {
                        "X_COORDINATES" => 0,
                        "Y_COORDINATES" => 1,
                        _ => 2,
                    };
                    axes[slot] = Some(cursor.read_values(count, &data_type)?);
                }
                "CELL_DATA" => {
                    attachment = Attachment::Cell;
                    attached_count = cursor.expect_usize("CELL_DATA")?;
                }
                "POINT_DATA" => {
                    attachment = Attachment::Point;
                    attached_count = cursor.expect_usize("POINT_DATA")?;
                }
                "SCALARS" => {
                    let name = cursor.expect_token("SCALARS")?.to_string();
                    let data_type = cursor.expect_token("SCALARS")?.to_string();
                    // 分量数可选，位于同一行
                    let components = cursor
                        .rest_of_line()
                        .split_whitespace()
                        .next()
                        .and_then(|t| t.parse::<usize>().ok())
                        .unwrap_or(1)
                        .max(1);
                    if let Some(table) = cursor.peek_token()
                        && table.eq_ignore_ascii_case("LOOKUP_TABLE")
                    {
                        cursor.next_token();
                        cursor.expect_token("LOOKUP_TABLE")?;
                    }
                    let count = checked_count(attached_count, components, "SCALARS")?;
                    let raw = cursor.read_values(count, &data_type)?;
                    dataset.arrays.push(VtkArray {
                        name,
                        attachment,
                        kind: ArrayKind::Scalars,
                        values: first_component(raw, components),
                    });
                }
                "VECTORS" | "NORMALS" => {
                    cursor.expect_token(keyword)?;
                    let data_type = cursor.expect_token(keyword)?.to_string();
                    cursor.read_values(checked_count(attached_count, 3, keyword)?, &data_type)?;
                }
                "TEXTURE_COORDINATES" => {
                    cursor.expect_token(keyword)?;
                    let dim = cursor.expect_usize(keyword)?;
                    let data_type = cursor.expect_token(keyword)?.to_string();
                    cursor.read_values(checked_count(attached_count, dim, keyword)?, &data_type)?;
                }
                "LOOKUP_TABLE" => {
                    cursor.expect_token("LOOKUP_TABLE")?;
                    let size = cursor.expect_usize("LOOKUP_TABLE")?;
                    let data_type = if cursor.binary { "unsigned_char" } else { "float" };
                    cursor.read_values(checked_count(size, 4, "LOOKUP_TABLE")?, data_type)?;
                }
                "FIELD" => {
                    cursor.expect_token("FIELD")?;
                    let arrays = cursor.expect_usize("FIELD")?;
                    for _ in 0..arrays {
                        let name = cursor.expect_token("FIELD")?.to_string();
                        let components = cursor.expect_usize("FIELD")?.max(1);
                        let tuples = cursor.expect_usize("FIELD")?;
                        let data_type = cursor.expect_token("FIELD")?.to_string();
                        let raw = cursor.read_values(checked_count(components, tuples, "FIELD")?, &data_type)?;
                        cursor.skip_metadata();
                        dataset.arrays.push(VtkArray {
                            name,
                            attachment,
                            kind: ArrayKind::Field,
                            values: first_component(raw, components),
                        });
                    }
                }
                "METADATA" => cursor.skip_metadata_body(),
                other => {
                    return Err(PipelineError::invalid_vtk(format!("未知关键字 '{}'", other)));
                }
            }
        }

        if dataset.points.is_none()
            && let Some(dims) = dataset.dimensions
        {
            dataset.points = synthesize_points(&dataset.dataset_type, dims, &axes, origin, spacing);
        }

        Ok(dataset)
    }

    /// 按名称查找数组，名称不区分大小写
    pub fn find_array(&self, name: &str, attachment: Attachment, kind: ArrayKind) -> Option<Vec<f64>> {
        self.arrays
            .iter()
            .find(|a| a.attachment == attachment && a.kind == kind && a.name.eq_ignore_ascii_case(name))
            .map(|a| a.values.clone())
    }

    /// 依次尝试提取策略，返回策略名称与数据
    pub fn extract(&self, property: &str) -> Option<(&'static str, Vec<f64>)> {
        EXTRACTION_STRATEGIES
            .iter()
            .find_map(|(name, strategy)| strategy(self, property).map(|values| (*name, values)))
    }

    /// 单元维度 [nx, ny, nz]（点维度减一，至少为 1）
    pub fn cell_dimensions(&self) -> Option<[usize; 3]> {
        self.dimensions.map(|[px, py, pz]| {
            [
                px.saturating_sub(1).max(1),
                py.saturating_sub(1).max(1),
                pz.saturating_sub(1).max(1),
            ]
        })
    }

    /// 每个单元的最小角点坐标
    pub fn cell_min_corners(&self) -> Option<RealCoordinates> {
        let [px, py, pz] = self.dimensions?;
        let points = self.points.as_ref()?;
        let expected = px.checked_mul(py).and_then(|n| n.checked_mul(pz));
        if expected != Some(points.len()) || px < 2 || py < 2 || pz < 2 {
            return None;
        }
        let (nx, ny, nz) = (px - 1, py - 1, pz - 1);
        let total = nx * ny * nz;
        let mut xs = Vec::with_capacity(total);
        let mut ys = Vec::with_capacity(total);
        let mut zs = Vec::with_capacity(total);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let mut min = [f64::INFINITY; 3];
                    for (di, dj, dk) in CORNER_OFFSETS {
                        let p = points[(i + di) + (j + dj) * px + (k + dk) * px * py];
                        for axis in 0..3 {
                            min[axis] = min[axis].min(p[axis]);
                        }
                    }
                    xs.push(min[0]);
                    ys.push(min[1]);
                    zs.push(min[2]);
                }
            }
        }
        Some(RealCoordinates::full(xs, ys, zs))
    }

    /// 点坐标（逐点采样变体）
    pub fn point_coordinates(&self) -> Option<RealCoordinates> {
        let points = self.points.as_ref()?;
        let xs = points.iter().map(|p| p[0]).collect();
        let ys = points.iter().map(|p| p[1]).collect();
        let zs = points.iter().map(|p| p[2]).collect();
        Some(RealCoordinates::full(xs, ys, zs))
    }

    /// 转换为解析结果：单元数据使用单元角点坐标，点数据使用点坐标
    pub fn into_source(self, property: &str) -> ParsedSource {
        let Some((strategy, values)) = self.extract(property) else {
            tracing::warn!("[VTK] 未找到属性 {}，返回空属性场", property);
            return ParsedSource::from_field(PropertyField::new(property, Vec::new()));
        };
        tracing::debug!("[VTK] 属性 {} 通过策略 {} 提取，共 {} 个值", property, strategy, values.len());

        let point_sampled = strategy.starts_with("point");
        let (dimensions, coordinates) = if point_sampled {
            (self.dimensions, self.point_coordinates())
        } else {
            (self.cell_dimensions(), self.cell_min_corners())
        };

        ParsedSource {
            field: PropertyField::new(property, values),
            dimensions,
            coordinates,
        }
    }
}

const CORNER_OFFSETS: [(usize, usize, usize); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (1, 1, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (1, 1, 1),
    (0, 1, 1),
];

/// 头部声明的数量相乘，溢出时视为文件损坏
fn checked_count(a: usize, b: usize, context: &str) -> PipelineResult<usize> {
    a.checked_mul(b)
        .ok_or_else(|| PipelineError::invalid_vtk(format!("{} 声明的数量过大: {} x {}", context, a, b)))
}

fn first_component(raw: Vec<f64>, components: usize) -> Vec<f64> {
    if components == 1 {
        raw
    } else {
        raw.into_iter().step_by(components).collect()
    }
}

fn synthesize_points(
    dataset_type: &str,
    [px, py, pz]: [usize; 3],
    axes: &[Option<Vec<f64>>; 3],
    origin: [f64; 3],
    spacing: [f64; 3],
) -> Option<Vec<[f64; 3]>> {
    let coord = |axis: usize, n: usize| -> Option<Vec<f64>> {
        match dataset_type {
            "RECTILINEAR_GRID" => axes[axis].clone().filter(|v| v.len() == n),
            "STRUCTURED_POINTS" => Some((0..n).map(|i| origin[axis] + i as f64 * spacing[axis]).collect()),
            _ => None,
        }
    };
    let (xs, ys, zs) = (coord(0, px)?, coord(1, py)?, coord(2, pz)?);
    let mut points = Vec::with_capacity(px.checked_mul(py)?.checked_mul(pz)?);
    for z in &zs {
        for y in &ys {
            for x in &xs {
                points.push([*x, *y, *z]);
            }
        }
    }
    Some(points)
}

/// 字节游标：文本部分按行/按词读取，BINARY 数据块按大端序读取
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    binary: bool,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor {
            bytes,
            pos: 0,
            binary: false,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let end = self.bytes[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|offset| start + offset)
            .unwrap_or(self.bytes.len());
        self.pos = (end + 1).min(self.bytes.len());
        let line = std::str::from_utf8(&self.bytes[start..end]).unwrap_or("");
        Some(line.trim_end_matches('\r'))
    }

    fn rest_of_line(&mut self) -> &'a str {
        self.next_line().unwrap_or("")
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    fn peek_token(&mut self) -> Option<&'a str> {
        let saved = self.pos;
        let token = self.next_token();
        self.pos = saved;
        token
    }

    fn expect_token(&mut self, context: &str) -> PipelineResult<&'a str> {
        self.next_token()
            .ok_or_else(|| PipelineError::invalid_vtk(format!("{} 声明不完整", context)))
    }

    fn expect_usize(&mut self, context: &str) -> PipelineResult<usize> {
        let token = self.expect_token(context)?;
        token
            .parse::<usize>()
            .map_err(|_| PipelineError::invalid_vtk(format!("{} 中的整数无效: '{}'", context, token)))
    }

    fn read_triplet(&mut self) -> PipelineResult<[f64; 3]> {
        let mut out = [0.0; 3];
        for slot in &mut out {
            let token = self.expect_token("ORIGIN/SPACING")?;
            *slot = token
                .parse::<f64>()
                .map_err(|_| PipelineError::invalid_vtk(format!("无效的坐标值 '{}'", token)))?;
        }
        Ok(out)
    }

    /// METADATA 块出现在数组之后，以空行结束
    fn skip_metadata(&mut self) {
        if let Some(token) = self.peek_token()
            && token.eq_ignore_ascii_case("METADATA")
        {
            self.next_token();
            self.skip_metadata_body();
        }
    }

    fn skip_metadata_body(&mut self) {
        // 先结束 METADATA 所在行
        self.rest_of_line();
        while let Some(line) = self.next_line() {
            if line.trim().is_empty() {
                break;
            }
        }
    }

    fn read_values(&mut self, count: usize, data_type: &str) -> PipelineResult<Vec<f64>> {
        if self.binary {
            self.read_binary(count, data_type)
        } else {
            self.read_ascii(count)
        }
    }

    fn read_ascii(&mut self, count: usize) -> PipelineResult<Vec<f64>> {
        // 预分配不超过剩余字节数
        let mut values = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
        for _ in 0..count {
            let token = self
                .next_token()
                .ok_or_else(|| PipelineError::invalid_vtk(format!("数据不足，期望 {} 个值", count)))?;
            let value = token
                .parse::<f64>()
                .map_err(|_| PipelineError::invalid_vtk(format!("无效的数值 '{}'", token)))?;
            values.push(value);
        }
        Ok(values)
    }

    fn read_binary(&mut self, count: usize, data_type: &str) -> PipelineResult<Vec<f64>> {
        // 二进制数据紧跟在声明行的换行符之后
        self.rest_of_line();
        let width = binary_width(data_type)
            .ok_or_else(|| PipelineError::invalid_vtk(format!("不支持的数据类型 '{}'", data_type)))?;
        let remaining = self.bytes.len() - self.pos;
        let needed = checked_count(count, width, data_type)?;
        if needed > remaining {
            return Err(PipelineError::invalid_vtk(format!(
                "二进制数据不足: 需要 {} 字节，剩余 {} 字节",
                needed, remaining
            )));
        }
        let end = self.pos + needed;
        let block = &self.bytes[self.pos..end];
        self.pos = end;

        let data_type = data_type.to_ascii_lowercase();
        let values = block
            .chunks_exact(width)
            .map(|b| match data_type.as_str() {
                "float" => BigEndian::read_f32(b) as f64,
                "double" => BigEndian::read_f64(b),
                "char" => b[0] as i8 as f64,
                "unsigned_char" => b[0] as f64,
                "short" => BigEndian::read_i16(b) as f64,
                "unsigned_short" => BigEndian::read_u16(b) as f64,
                "int" => BigEndian::read_i32(b) as f64,
                "unsigned_int" => BigEndian::read_u32(b) as f64,
                "long" | "vtktypeint64" => BigEndian::read_i64(b) as f64,
                _ => BigEndian::read_u64(b) as f64,
            })
            .collect();
        Ok(values)
    }
}

fn binary_width(data_type: &str) -> Option<usize> {
    match data_type.to_ascii_lowercase().as_str() {
        "char" | "unsigned_char" => Some(1),
        "short" | "unsigned_short" => Some(2),
        "int" | "unsigned_int" | "float" => Some(4),
        "long" | "unsigned_long" | "double" | "vtktypeint64" | "vtktypeuint64" => Some(8),
        _ => None,
    }
}
