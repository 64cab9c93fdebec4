//! 考试处理流程 - 流程层
//!
//! 核心职责：定义"一场考试"的完整处理流程
//!
//! 流程顺序：
//! 1. 查找并提取文档（失败时沿用参考题库）
//! 2. 判定选项标记写法 → 选组 → 切分 → 字段分类
//! 3. 选项块检测、答案表提取
//! 4. 合并（含覆盖表）→ 质量检查

use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ExtractionConfig};
use crate::infrastructure::PdfTextExtractor;
use crate::models::{
    AnswerKey, Document, DocumentLocator, Exam, ExamOverride, Finding, FindingKind, MarkerStyle,
};
use crate::services::{
    detect_marker_style, AnswerKeyExtractor, FieldClassifier, OptionBlockFinder, QualityAudit,
    QuestionDraft, QuestionSegmenter, ReconcileInput, Reconciler, SectionSplitter,
};
use crate::utils::logging::truncate_text;
use crate::workflow::exam_ctx::ExamCtx;

/// 一场考试的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    /// 正常提取
    Extracted,
    /// 没有可用文本（扫描件）或没有题号标记
    NonExtractable,
    /// 找不到文档
    Missing,
    /// 外部工具失败
    Failed,
}

/// 一场考试的处理结果
#[derive(Debug, Clone)]
pub struct ExamOutcome {
    pub exam: Exam,
    pub findings: Vec<Finding>,
    pub status: ExamStatus,
}

/// 考试处理流程
///
/// - 编排一场考试从文档到题目的全部步骤
/// - 任何步骤失败都退化为部分或空结果加问题记录，不向上抛错
/// - 只依赖业务能力（services）与提取器（infrastructure）
pub struct ExamFlow {
    extractor: PdfTextExtractor,
    locator: DocumentLocator,
    extraction: ExtractionConfig,
    audit: QualityAudit,
    verbose_logging: bool,
}

impl ExamFlow {
    /// 创建新的考试处理流程
    pub fn new(config: &Config) -> Self {
        Self {
            extractor: PdfTextExtractor::new(config),
            locator: DocumentLocator::new(&config.documents_dir, config.filename_templates.clone()),
            extraction: config.extraction.clone(),
            audit: QualityAudit::new(),
            verbose_logging: config.verbose_logging,
        }
    }

    pub fn locator(&self) -> &DocumentLocator {
        &self.locator
    }

    pub async fn run(
        &self,
        ctx: &ExamCtx,
        overrides: Option<&ExamOverride>,
        reference: Option<&Exam>,
    ) -> ExamOutcome {
        // ========== 步骤 1: 查找文档 ==========
        let Some(path) = self.locator.locate(&ctx.exam_id).await else {
            warn!("{} ⚠️ 找不到文档，沿用参考题库", ctx);
            let finding = Finding::exam(
                ctx.exam_id.to_string(),
                FindingKind::DocumentMissing,
                format!("{} 中没有对应文档", self.locator.documents_dir().display()),
            );
            return self.fallback(ctx, ExamStatus::Missing, finding, overrides, reference);
        };
        info!("{} 📄 文档: {}", ctx, path.display());

        // ========== 步骤 2: 提取文本 ==========
        let document = match self.extractor.extract(ctx.exam_id, &path).await {
            Ok(document) => document,
            Err(e) => {
                error!("{} ❌ 文本提取失败: {}", ctx, e);
                let finding = Finding::exam(
                    ctx.exam_id.to_string(),
                    FindingKind::ExtractionFailed,
                    e.to_string(),
                );
                return self.fallback(ctx, ExamStatus::Failed, finding, overrides, reference);
            }
        };

        self.process_document(ctx, document, overrides, reference)
    }

    /// 对已提取的文档运行全部检测与合并
    pub fn process_document(
        &self,
        ctx: &ExamCtx,
        mut document: Document,
        overrides: Option<&ExamOverride>,
        reference: Option<&Exam>,
    ) -> ExamOutcome {
        let exam_key = ctx.exam_id.to_string();
        let config = &self.extraction;
        let mut findings = Vec::new();

        let char_count = document.text_char_count();
        if char_count < config.min_text_chars {
            warn!("{} 🖼️ 只有 {} 个字符，视为扫描件", ctx, char_count);
            findings.push(Finding::exam(
                &exam_key,
                FindingKind::NonExtractable,
                format!("只有 {} 个可见字符", char_count),
            ));
            return self.non_extractable(ctx, &document, findings, overrides, reference);
        }

        // ========== 步骤 3: 选项标记写法与选组 ==========
        let style = detect_marker_style(&document.text);
        let segmenter = QuestionSegmenter::new(config);
        let classifier = FieldClassifier::new(config, style);
        debug!("{} 选项标记写法: {:?}", ctx, style);

        let reference_openings = reference.map(Exam::opening_texts).unwrap_or_default();
        let selection = SectionSplitter::new(config).select(&document.text, &reference_openings, |part| {
            segmenter
                .segment(part)
                .regions
                .iter()
                .take(2)
                .map(|region| classifier.classify(region.kind, region.body(part)).stem())
                .collect()
        });
        if let Some(track) = selection.track {
            info!(
                "{} 🔀 选用 Gruppe {} (A={:.2}, B={:.2})",
                ctx, track, selection.score_a, selection.score_b
            );
            if !selection.confident {
                findings.push(Finding::exam(
                    &exam_key,
                    FindingKind::TrackAmbiguous,
                    format!(
                        "选组没有把握 (A={:.2}, B={:.2})，使用 Gruppe {}",
                        selection.score_a, selection.score_b, track
                    ),
                ));
            }
        }
        document.track = selection.track;
        let text = &document.text[selection.range.clone()];

        // ========== 步骤 4: 切分与字段分类 ==========
        let segmentation = segmenter.segment(text);
        if segmentation.markers.is_empty() {
            warn!("{} 🖼️ 没有任何题号标记", ctx);
            findings.push(Finding::exam(
                &exam_key,
                FindingKind::NonExtractable,
                "没有任何题号标记",
            ));
            return self.non_extractable(ctx, &document, findings, overrides, reference);
        }

        let drafts: Vec<QuestionDraft> = segmentation
            .regions
            .iter()
            .map(|region| QuestionDraft {
                id: region.id,
                kind: region.kind,
                fields: classifier.classify(region.kind, region.body(text)),
            })
            .collect();
        info!("{} ✂️ 切分出 {} 道题", ctx, drafts.len());

        // ========== 步骤 5: 选项块与答案表 ==========
        let question_text = &text[..segmentation.exam_end.unwrap_or(text.len())];
        let blocks = OptionBlockFinder::new(config, style).find_options(question_text, &segmentation.markers);
        debug!("{} 选项块: {} 个题号", ctx, blocks.len());

        let answers = AnswerKeyExtractor::new(config).extract(&document, document.track);
        if answers.is_empty() {
            warn!("{} ⚠️ 没有找到答案表", ctx);
            findings.push(Finding::exam(&exam_key, FindingKind::AnswerKeyMissing, "没有可解析的答案表"));
        } else {
            info!("{} 🔑 答案表: {} 题", ctx, answers.len());
        }

        // ========== 步骤 6: 合并与质量检查 ==========
        let reconciliation = Reconciler::new(config, style).reconcile(ReconcileInput {
            exam_id: ctx.exam_id,
            track: document.track,
            source: Some(document.source.as_str()),
            drafts: &drafts,
            blocks: &blocks,
            answers: &answers,
            overrides,
            reference,
        });
        findings.extend(reconciliation.findings);
        findings.extend(self.audit.audit(&reconciliation.exam));

        let exam = reconciliation.exam;
        if self.verbose_logging {
            self.log_questions(ctx, &exam);
        }
        info!(
            "{} ✓ {} 道题，不完整 {}，问题记录 {}",
            ctx,
            exam.questions.len(),
            exam.incomplete_count(),
            findings.len()
        );

        ExamOutcome {
            exam,
            findings,
            status: ExamStatus::Extracted,
        }
    }

    /// 没有可用文本：题目只来自覆盖表
    fn non_extractable(
        &self,
        ctx: &ExamCtx,
        document: &Document,
        mut findings: Vec<Finding>,
        overrides: Option<&ExamOverride>,
        reference: Option<&Exam>,
    ) -> ExamOutcome {
        let reconciliation = Reconciler::new(&self.extraction, MarkerStyle::Paren).reconcile(ReconcileInput {
            exam_id: ctx.exam_id,
            track: None,
            source: Some(document.source.as_str()),
            drafts: &[],
            blocks: &BTreeMap::new(),
            answers: &AnswerKey::new(),
            overrides,
            reference,
        });
        findings.extend(reconciliation.findings);
        if !reconciliation.exam.questions.is_empty() {
            info!("{} ✓ 覆盖表提供 {} 道题", ctx, reconciliation.exam.questions.len());
        }
        ExamOutcome {
            exam: reconciliation.exam,
            findings,
            status: ExamStatus::NonExtractable,
        }
    }

    /// 文档缺失或提取失败：优先沿用参考题库，其次使用覆盖表
    fn fallback(
        &self,
        ctx: &ExamCtx,
        status: ExamStatus,
        finding: Finding,
        overrides: Option<&ExamOverride>,
        reference: Option<&Exam>,
    ) -> ExamOutcome {
        let exam = match reference {
            Some(exam) => {
                info!("{} ↩️ 沿用参考题库中的 {} 道题", ctx, exam.questions.len());
                exam.clone()
            }
            None => {
                Reconciler::new(&self.extraction, MarkerStyle::Paren)
                    .reconcile(ReconcileInput {
                        exam_id: ctx.exam_id,
                        track: None,
                        source: None,
                        drafts: &[],
                        blocks: &BTreeMap::new(),
                        answers: &AnswerKey::new(),
                        overrides,
                        reference: None,
                    })
                    .exam
            }
        };
        ExamOutcome {
            exam,
            findings: vec![finding],
            status,
        }
    }

    fn log_questions(&self, ctx: &ExamCtx, exam: &Exam) {
        for q in &exam.questions {
            debug!(
                "{}   Q{:>2} {:?} | {} | 选项 {} | 答案 {:?}{}",
                ctx,
                q.id,
                q.kind,
                truncate_text(&q.text, 50),
                q.options.len(),
                q.correct_indices,
                if q.incomplete { " | 不完整" } else { "" }
            );
        }
    }
}
