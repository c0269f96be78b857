mod grdecl;
mod vtk;

use crate::utils::parser::PropertyParser;

pub use grdecl::{GrdeclParser, SECTION_KEYWORDS, read_property_values};
pub use vtk::{Attachment, ArrayKind, EXTRACTION_STRATEGIES, VtkArray, VtkDataset, VtkParser};

/// 获取所有可用的解析器
pub fn get_all_parsers() -> Vec<Box<dyn PropertyParser>> {
    let mut parsers: Vec<Box<dyn PropertyParser>> = Vec::new();
    parsers.push(Box::new(GrdeclParser::new()));
    parsers.push(Box::new(VtkParser::new()));
    parsers
}
