use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::PipelineResult;
use crate::utils::parser::{ParsedSource, PropertyParser};
use crate::utils::property_field::PropertyField;

/// 开启数据段的属性关键字
pub const SECTION_KEYWORDS: [&str; 5] = ["YMFS", "SOIL", "SWAT", "SGAS", "PRESSURE"];

/// 单个文件最多展开的数值个数，超出的重复项整体跳过
pub const MAX_PROPERTY_VALUES: usize = 1 << 26;

/// GRDECL 属性文件解析器（支持 `N*V` 游程编码）
pub struct GrdeclParser;

impl GrdeclParser {
    pub fn new() -> Self {
        GrdeclParser
    }
}

impl Default for GrdeclParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyParser for GrdeclParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["grdecl", "inc"]
    }

    fn name(&self) -> &'static str {
        "GRDECL Parser"
    }

    fn parse_from_file(&self, file_path: &Path, property: &str) -> PipelineResult<ParsedSource> {
        let file = File::open(file_path)?;
        let values = read_property_values(BufReader::new(file))?;
        tracing::debug!(
            "[GRDECL] {} 解析完成，共 {} 个值",
            file_path.display(),
            values.len()
        );
        Ok(ParsedSource::from_field(PropertyField::new(property, values)))
    }
}

/// 逐行扫描 GRDECL 文本，返回数据段中的所有数值
///
/// - 空行与 `--` 注释行跳过
/// - 包含关键字的行开启数据段，该行本身不作为数据
/// - 以 `/` 开头的行结束解析
/// - 无法解析的数据项直接跳过
pub fn read_property_values<R: BufRead>(reader: R) -> std::io::Result<Vec<f64>> {
    let mut values = Vec::new();
    let mut reading = false;

    for raw in reader.lines() {
        let raw = raw?;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }
        if SECTION_KEYWORDS.iter().any(|k| line.contains(k)) {
            reading = true;
            continue;
        }
        if line.starts_with('/') {
            break;
        }
        if reading {
            let stripped = line.replace('/', "");
            for token in stripped.split_whitespace() {
                push_token(token, &mut values);
            }
        }
    }

    Ok(values)
}

/// 解析单个数据项：普通浮点数或 `N*V` 重复项
fn push_token(token: &str, values: &mut Vec<f64>) {
    match token.split_once('*') {
        Some((count, value)) => {
            let (Ok(count), Ok(value)) = (count.parse::<usize>(), value.parse::<f64>()) else {
                tracing::trace!("[GRDECL] 跳过无效的重复项 '{}'", token);
                return;
            };
            if values.len().saturating_add(count) > MAX_PROPERTY_VALUES {
                tracing::trace!("[GRDECL] 跳过超长的重复项 '{}'", token);
                return;
            }
            values.extend(std::iter::repeat_n(value, count));
        }
        None => match token.parse::<f64>() {
            Ok(_) if values.len() >= MAX_PROPERTY_VALUES => {
                tracing::trace!("[GRDECL] 数值个数已达上限，跳过 '{}'", token)
            }
            Ok(value) => values.push(value),
            Err(_) => tracing::trace!("[GRDECL] 跳过无效的值 '{}'", token),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<f64> {
        read_property_values(text.as_bytes()).unwrap()
    }

    #[test]
    fn decodes_run_length_tokens() {
        let values = parse("YMFS\n3*0.5 0.2 2*1.0\n/\n");
        assert_eq!(values, vec![0.5, 0.5, 0.5, 0.2, 1.0, 1.0]);
    }

    #[test]
    fn skips_comments_and_header_line() {
        let text = "-- Exported from ResInsight - Timestep 3\n\nYMFS\n  0.1 0.2\n-- inline comment\n 0.3 /\n";
        assert_eq!(parse(text), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn data_before_keyword_is_ignored() {
        assert_eq!(parse("1.0 2.0\nSGAS\n4.0\n/"), vec![4.0]);
    }

    #[test]
    fn terminator_stops_parsing() {
        assert_eq!(parse("PRESSURE\n1 2\n/\n3 4\n"), vec![1.0, 2.0]);
        assert_eq!(parse("SOIL\n1\n/ trailing\n2\n"), vec![1.0]);
    }

    #[test]
    fn malformed_tokens_are_skipped() {
        let values = parse("SWAT\n0.1 abc 2*x 3*0.2 *0.4 1*2*3 5*\n/\n");
        assert_eq!(values, vec![0.1, 0.2, 0.2, 0.2]);
    }

    #[test]
    fn oversized_repeat_count_is_skipped() {
        let values = parse("YMFS\n4611686018427387904*0.5 0.25\n99999999999999999999999*1 2*0.1\n/\n");
        assert_eq!(values, vec![0.25, 0.1, 0.1]);

        let just_over = format!("YMFS\n{}*0.5 0.75\n/\n", MAX_PROPERTY_VALUES + 1);
        assert_eq!(parse(&just_over), vec![0.75]);
    }

    #[test]
    fn scientific_notation_is_accepted() {
        assert_eq!(parse("YMFS\n1.5E-01 2*2e0\n/"), vec![0.15, 2.0, 2.0]);
    }

    #[test]
    fn no_section_yields_empty() {
        assert!(parse("-- nothing here\n0.1 0.2\n").is_empty());
    }
}
