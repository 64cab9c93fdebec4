use exam_bank_import::config::Config;
use exam_bank_import::models::{
    load_reference_corpus, save_corpus, Exam, ExamId, Question, QuestionType, Session,
};
use exam_bank_import::utils::logging;
use exam_bank_import::App;
use std::path::{Path, PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("exam-bank-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("fragen")).expect("创建临时目录失败");
    dir
}

fn config_in(dir: &Path) -> Config {
    let path = |name: &str| dir.join(name).to_string_lossy().to_string();
    Config {
        max_concurrent_documents: 2,
        documents_dir: path("fragen"),
        output_corpus: path("exams.json"),
        findings_file: path("findings.jsonl"),
        override_table: path("overrides.toml"),
        reference_corpus: Some(path("reference.json")),
        output_log_file: path("output.txt"),
        ..Config::default()
    }
}

fn reference_exam() -> Exam {
    let mut exam = Exam::empty(ExamId::new(2019, Session::March));
    let mut q = Question::new(1, QuestionType::SingleChoice);
    q.text = "Welche Aussage zur Demenz trifft zu?".to_string();
    q.options = ["Akut", "Schleichend", "Heilbar", "Selten", "Angeboren"]
        .map(String::from)
        .to_vec();
    q.correct_indices = vec![1];
    exam.questions.push(q);
    exam
}

const OVERRIDES: &str = r#"
version = 1

[[exam]]
id = "2020-october"

[[exam.question]]
id = 1
type = "Einfachauswahl"
text = "Welche Störung zählt zu den Angststörungen?"
options = ["Agoraphobie", "Demenz", "Delir", "Manie", "Autismus"]
correct = "A"
"#;

/// 没有 PDF 时：参考题库沿用，覆盖表单独成题，两次运行输出一致
#[tokio::test]
async fn test_batch_without_documents_is_stable() {
    logging::init(false);
    let dir = scratch_dir("batch");
    let config = config_in(&dir);
    std::fs::write(&config.override_table, OVERRIDES).unwrap();
    save_corpus(Path::new(config.reference_corpus.as_deref().unwrap()), &[reference_exam()])
        .await
        .unwrap();

    let corpus = App::initialize(config.clone()).await.unwrap().run().await.unwrap();
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus[0].id, "2019-march");
    assert_eq!(corpus[0].questions, reference_exam().questions);
    assert_eq!(corpus[1].id, "2020-october");
    assert_eq!(corpus[1].questions[0].correct_indices, vec![0]);

    let first_corpus = std::fs::read(&config.output_corpus).unwrap();
    let first_findings = std::fs::read_to_string(&config.findings_file).unwrap();
    assert_eq!(first_findings.lines().count(), 2);
    assert!(first_findings.contains("DOCUMENT_MISSING"));

    App::initialize(config.clone()).await.unwrap().run().await.unwrap();
    assert_eq!(std::fs::read(&config.output_corpus).unwrap(), first_corpus);
    assert_eq!(std::fs::read_to_string(&config.findings_file).unwrap(), first_findings);

    let reloaded = load_reference_corpus(Path::new(&config.output_corpus)).await.unwrap();
    assert_eq!(reloaded, corpus);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_invalid_override_table_stops_initialization() {
    let dir = scratch_dir("invalid");
    let config = Config {
        reference_corpus: None,
        ..config_in(&dir)
    };
    std::fs::write(&config.override_table, "version = 7\n").unwrap();

    assert!(App::initialize(config).await.is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
#[ignore] // 默认忽略，需要 poppler-utils 与真实文档：cargo test -- --ignored
async fn test_import_real_documents() {
    logging::init(true);

    // 加载配置（EXAM_DOCS_DIR 等环境变量）
    let config = Config::from_env();

    let corpus = App::initialize(config)
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("处理失败");

    assert!(!corpus.is_empty(), "应该至少处理一场考试");
    for exam in &corpus {
        for q in &exam.questions {
            assert!(q.options.len() == 5 || q.incomplete, "{} Q{}", exam.id, q.id);
        }
    }
}
