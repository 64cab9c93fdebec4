//! 批量考试处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量考试的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、加载覆盖表和参考题库
//! 2. **确定考试列表**：配置、参考题库、覆盖表和文档目录的并集
//! 3. **并发控制**：使用 Semaphore 限制同时运行的外部提取进程
//! 4. **分批处理**：将考试分批次处理，每批完成后再开始下一批
//! 5. **输出**：写出题库 JSON 与问题清单，打印全局统计

use crate::config::Config;
use crate::models::{
    load_override_table, load_reference_corpus, save_corpus, Exam, ExamId, Finding, FindingKind,
    OverrideTable,
};
use crate::orchestrator::exam_processor;
use crate::services::FindingWriter;
use crate::utils::logging::{
    init_log_file, log_batch_complete, log_batch_start, log_exams_loaded, log_startup,
    print_final_stats,
};
use crate::workflow::{ExamFlow, ExamOutcome, ExamStatus};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<ExamFlow>,
    overrides: Arc<OverrideTable>,
    reference: Arc<BTreeMap<ExamId, Exam>>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(config.max_concurrent_documents, &config.documents_dir);

        let overrides = load_override_table(Path::new(&config.override_table)).await?;
        info!("📌 人工覆盖: {} 场考试", overrides.len());

        let mut reference = BTreeMap::new();
        if let Some(path) = &config.reference_corpus {
            for exam in load_reference_corpus(Path::new(path)).await? {
                reference.insert(ExamId::new(exam.year, exam.session), exam);
            }
            info!("📚 参考题库: {} 场考试", reference.len());
        }

        Ok(Self {
            flow: Arc::new(ExamFlow::new(&config)),
            config,
            overrides: Arc::new(overrides),
            reference: Arc::new(reference),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<Vec<Exam>> {
        let exam_ids = self.collect_exam_ids().await?;

        if exam_ids.is_empty() {
            warn!("⚠️ 没有找到待处理的考试，程序结束");
            return Ok(Vec::new());
        }

        log_exams_loaded(exam_ids.len(), self.config.max_concurrent_documents);

        let outcomes = self.process_all_exams(exam_ids).await?;

        let findings: Vec<Finding> = outcomes.iter().flat_map(|o| o.findings.iter().cloned()).collect();
        let corpus: Vec<Exam> = outcomes.iter().map(|o| o.exam.clone()).collect();

        save_corpus(Path::new(&self.config.output_corpus), &corpus).await?;
        info!("💾 题库已写入: {}", self.config.output_corpus);

        let writer = FindingWriter::with_path(&self.config.findings_file);
        writer.write_all(&findings).await?;
        info!("📝 问题清单已写入: {}", writer.path());

        self.print_summary(&outcomes, findings.len());

        Ok(corpus)
    }

    /// 确定考试列表
    ///
    /// 配置了 `exam_ids` 时只处理这些；否则取参考题库、覆盖表与文档目录的并集。
    async fn collect_exam_ids(&self) -> Result<Vec<ExamId>> {
        if !self.config.exam_ids.is_empty() {
            return self
                .config
                .exam_ids
                .iter()
                .map(|id| id.parse::<ExamId>().with_context(|| format!("无效的考试标识: {}", id)))
                .collect::<Result<BTreeSet<_>>>()
                .map(|ids| ids.into_iter().collect());
        }

        info!("\n📁 正在扫描文档目录...");
        let mut ids: BTreeSet<ExamId> = self.reference.keys().copied().collect();
        ids.extend(self.overrides.exam_ids().copied());
        match self.flow.locator().discover().await {
            Ok(found) => ids.extend(found),
            Err(e) => warn!("⚠️ 无法扫描文档目录 {}: {}", self.config.documents_dir, e),
        }
        Ok(ids.into_iter().collect())
    }

    /// 处理所有考试，结果按考试标识排序
    async fn process_all_exams(&self, exam_ids: Vec<ExamId>) -> Result<Vec<ExamOutcome>> {
        let max_concurrent = self.config.max_concurrent_documents.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let total_exams = exam_ids.len();
        let total_batches = total_exams.div_ceil(max_concurrent);
        let mut outcomes = Vec::with_capacity(total_exams);

        // 分批处理
        for batch_start in (0..total_exams).step_by(max_concurrent) {
            let batch_end = (batch_start + max_concurrent).min(total_exams);
            let batch_num = batch_start / max_concurrent + 1;

            log_batch_start(batch_num, total_batches, batch_start + 1, batch_end, total_exams);

            let batch = self
                .process_batch(&exam_ids[batch_start..batch_end], batch_start, semaphore.clone())
                .await?;

            let extracted = batch.iter().filter(|o| o.status == ExamStatus::Extracted).count();
            log_batch_complete(batch_num, extracted, batch.len());
            outcomes.extend(batch);
        }

        Ok(outcomes)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_ids: &[ExamId],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<Vec<ExamOutcome>> {
        let mut handles = Vec::new();

        // 为本批创建并发任务
        for (idx, exam_id) in batch_ids.iter().copied().enumerate() {
            let exam_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let flow = Arc::clone(&self.flow);
            let overrides = Arc::clone(&self.overrides);
            let reference = Arc::clone(&self.reference);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                exam_processor::process_exam(
                    &flow,
                    exam_id,
                    exam_index,
                    overrides.for_exam(&exam_id),
                    reference.get(&exam_id),
                )
                .await
            });
            handles.push((exam_id, exam_index, handle));
        }

        // 等待本批所有任务完成，保持提交顺序
        let joined = futures::future::join_all(handles.into_iter().map(|(exam_id, exam_index, handle)| async move {
            (exam_id, exam_index, handle.await)
        }))
        .await;

        let mut outcomes = Vec::with_capacity(joined.len());
        for (exam_id, exam_index, result) in joined {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("[试卷 {} {}] ❌ 任务执行失败: {}", exam_index, exam_id, e);
                    outcomes.push(ExamOutcome {
                        exam: self
                            .reference
                            .get(&exam_id)
                            .cloned()
                            .unwrap_or_else(|| Exam::empty(exam_id)),
                        findings: vec![Finding::exam(
                            exam_id.to_string(),
                            FindingKind::ExtractionFailed,
                            e.to_string(),
                        )],
                        status: ExamStatus::Failed,
                    });
                }
            }
        }

        Ok(outcomes)
    }

    fn print_summary(&self, outcomes: &[ExamOutcome], finding_count: usize) {
        let summary: Vec<(String, usize, usize)> = outcomes
            .iter()
            .map(|o| (o.exam.id.clone(), o.exam.questions.len(), o.exam.incomplete_count()))
            .collect();
        let ids_with = |status: ExamStatus| -> Vec<String> {
            outcomes
                .iter()
                .filter(|o| o.status == status)
                .map(|o| o.exam.id.clone())
                .collect()
        };
        let non_extractable = ids_with(ExamStatus::NonExtractable);
        let mut skipped = ids_with(ExamStatus::Missing);
        skipped.extend(ids_with(ExamStatus::Failed));

        print_final_stats(
            &summary,
            &non_extractable,
            &skipped,
            finding_count,
            &self.config.output_log_file,
        );
    }
}
