use std::path::Path;

use crate::error::PipelineResult;
use crate::grid::geometry::RealCoordinates;
use crate::utils::property_field::PropertyField;

/// 解析结果：属性场，以及文件自带的网格信息（如果有）
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    pub field: PropertyField,
    /// 文件中声明的单元维度 [nx, ny, nz]
    pub dimensions: Option<[usize; 3]>,
    /// 文件携带的真实单元坐标
    pub coordinates: Option<RealCoordinates>,
}

impl ParsedSource {
    pub fn from_field(field: PropertyField) -> Self {
        ParsedSource {
            field,
            dimensions: None,
            coordinates: None,
        }
    }
}

/// 属性文件解析器 trait
/// 不同文件格式需要实现这个 trait
pub trait PropertyParser: Send + Sync {
    /// 获取支持的文件扩展名（不含点号），例如: "grdecl"
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// 检查文件扩展名是否被支持
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// 从文件路径解析指定属性
    /// 只有文件无法打开或读取时才返回错误，单个坏数据不会导致失败
    fn parse_from_file(&self, file_path: &Path, property: &str) -> PipelineResult<ParsedSource>;

    /// 获取解析器名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
