//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量考试处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载覆盖表与参考题库
//! - 控制并发数量（Semaphore）
//! - 写出题库与问题清单，输出全局统计
//!
//! ### `exam_processor` - 单场考试处理器
//! - 建立考试上下文
//! - 委托 ExamFlow 完成提取与合并
//! - 输出单场考试的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<ExamId>)
//!     ↓
//! exam_processor (处理单个 ExamId)
//!     ↓
//! workflow::ExamFlow (文档 → Exam)
//!     ↓
//! services (能力层：切分 / 分类 / 选项块 / 答案表 / 合并 / 检查)
//!     ↓
//! infrastructure (基础设施：PdfTextExtractor)
//! ```

pub mod batch_processor;
pub mod exam_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use exam_processor::process_exam;
