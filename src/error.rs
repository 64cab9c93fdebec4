use thiserror::Error;

/// 应用程序错误类型
///
/// 只有基础设施层（外部工具）和加载器会产生错误；
/// 检测服务本身从不失败，退化情况以 `Finding` 形式上报。
#[derive(Debug, Error)]
pub enum AppError {
    /// 文本提取相关错误
    #[error("提取错误: {0}")]
    Extract(#[from] ExtractError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 外部 PDF 工具错误
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 工具不可用（未安装或无法启动）
    #[error("无法启动外部工具 {tool}: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// 工具返回非零状态
    #[error("外部工具 {tool} 执行失败 (状态: {status:?}): {stderr}")]
    ToolFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },
    /// 输出不是合法 UTF-8
    #[error("外部工具 {tool} 的输出不是合法 UTF-8")]
    NotUtf8 { tool: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 覆盖表条目无效
    #[error("覆盖表条目无效 (考试 {exam_id}): {detail}")]
    InvalidOverride { exam_id: String, detail: String },
    /// 考试标识无法解析
    #[error("无法解析考试标识: {0}")]
    InvalidExamId(String),
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::JsonParseFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: err,
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建工具执行失败错误
    pub fn tool_failed(tool: impl Into<String>, status: Option<i32>, stderr: impl Into<String>) -> Self {
        AppError::Extract(ExtractError::ToolFailed {
            tool: tool.into(),
            status,
            stderr: stderr.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建覆盖表条目错误
    pub fn invalid_override(exam_id: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidOverride {
            exam_id: exam_id.into(),
            detail: detail.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_nests_source_message() {
        let err = AppError::tool_failed("pdftotext", Some(1), "Syntax Error");
        let msg = err.to_string();
        assert!(msg.contains("pdftotext"));
        assert!(msg.contains("Syntax Error"));
    }

    #[test]
    fn test_io_error_converts_to_file_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::File(FileError::ReadFailed { .. })));
    }
}
