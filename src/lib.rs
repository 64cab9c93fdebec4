//! # Exam Bank Import
//!
//! 把试卷 PDF 转换为题库 JSON 的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部工具，只暴露能力
//! - `PdfTextExtractor` - 唯一调用 pdftotext / pdftohtml 的地方
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程顺序
//! - `SectionSplitter` - 识别并选择卷组
//! - `QuestionSegmenter` / `FieldClassifier` - 切分题目、区分题干陈述选项
//! - `OptionBlockFinder` - 独立的选项块检测
//! - `AnswerKeyExtractor` - 网格与线性答案表
//! - `Reconciler` - 合并、拆分合并题、应用覆盖表
//! - `QualityAudit` / `FindingWriter` - 质量检查与问题清单
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一场考试"的完整处理流程
//! - `ExamCtx` - 上下文封装（考试标识 + 索引）
//! - `ExamFlow` - 流程编排（提取 → 选组 → 切分 → 合并 → 检查）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，管理并发和输出
//! - `orchestrator/exam_processor` - 单场考试处理器
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ExtractionConfig};
pub use error::{AppError, AppResult};
pub use infrastructure::PdfTextExtractor;
pub use models::{Exam, ExamId, Finding, FindingKind, Question, QuestionType};
pub use orchestrator::{process_exam, App};
pub use workflow::{ExamCtx, ExamFlow, ExamOutcome, ExamStatus};
