use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::utils::parser::{ParsedSource, PropertyParser};

/// 解析器注册表
/// 管理所有可用的属性文件解析器，并根据文件扩展名匹配对应的解析器
pub struct ParserRegistry {
    parsers: Vec<Box<dyn PropertyParser>>,
}

impl ParserRegistry {
    /// 创建新的解析器注册表，自动注册所有可用的解析器
    pub fn new() -> Self {
        let parsers = crate::parsers::get_all_parsers();
        Self { parsers }
    }

    /// 根据文件扩展名查找匹配的解析器
    /// extension: 文件扩展名（不含点号），例如 "grdecl"
    pub fn find_parser(&self, extension: &str) -> Option<&dyn PropertyParser> {
        self.parsers
            .iter()
            .find(|parser| parser.supports(extension))
            .map(|p| p.as_ref())
    }

    /// 根据文件路径查找匹配的解析器
    /// 自动提取文件扩展名
    pub fn find_parser_for_file(&self, file_path: &Path) -> Option<&dyn PropertyParser> {
        let extension = file_path.extension().and_then(|ext| ext.to_str())?;
        self.find_parser(extension)
    }

    /// 查找解析器并解析文件
    pub fn parse_file(&self, file_path: &Path, property: &str) -> PipelineResult<ParsedSource> {
        let parser =
            self.find_parser_for_file(file_path)
                .ok_or_else(|| PipelineError::UnsupportedFormat {
                    path: file_path.to_path_buf(),
                })?;
        tracing::trace!("[解析] {} 使用 {}", file_path.display(), parser.name());
        parser.parse_from_file(file_path, property)
    }

    /// 获取所有支持的扩展名列表
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions = Vec::new();
        for parser in &self.parsers {
            extensions.extend(
                parser
                    .supported_extensions()
                    .iter()
                    .map(|s| s.to_lowercase()),
            );
        }
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parser_by_extension_case_insensitive() {
        let registry = ParserRegistry::new();
        let parser = registry
            .find_parser_for_file(Path::new("timesteps_export/YMFS_ts_0003.GRDECL"))
            .unwrap();
        assert_eq!(parser.name(), "GRDECL Parser");
        assert_eq!(
            registry
                .find_parser_for_file(Path::new("ymfs_ts_0001.vtk"))
                .map(|p| p.name()),
            Some("VTK Legacy Parser")
        );
        assert!(registry.find_parser_for_file(Path::new("notes.txt")).is_none());
        assert!(registry.find_parser_for_file(Path::new("no_extension")).is_none());
    }

    #[test]
    fn lists_sorted_extensions() {
        let registry = ParserRegistry::default();
        assert_eq!(registry.supported_extensions(), vec!["grdecl", "inc", "vtk"]);
    }

    #[test]
    fn unsupported_file_is_an_error() {
        let registry = ParserRegistry::new();
        let err = registry
            .parse_file(Path::new("field.csv"), "YMFS")
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }
}
