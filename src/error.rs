use std::path::PathBuf;

/// 预处理管线统一错误类型
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("未知数据集: {id}")]
    UnknownDataset { id: String },

    #[error("不支持的文件格式: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("无效的 VTK 文件: {message}")]
    InvalidVtk { message: String },

    #[error("时间步不存在: {timestep}")]
    TimestepNotFound { timestep: u32 },

    #[error("播放会话不存在: {session_id}")]
    SessionNotFound { session_id: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub(crate) fn invalid_vtk(message: impl Into<String>) -> Self {
        PipelineError::InvalidVtk {
            message: message.into(),
        }
    }
}
