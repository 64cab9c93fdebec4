pub mod answer_key;
pub mod document;
pub mod exam_id;
pub mod finding;
pub mod loaders;
pub mod overrides;
pub mod question;

pub use answer_key::{AnswerKey, AnswerKeyEntry, AnswerSource};
pub use document::{Document, MarkerStyle, Track, WordBox};
pub use exam_id::{ExamId, Session};
pub use finding::{Finding, FindingKind};
pub use loaders::{load_override_table, load_reference_corpus, save_corpus, DocumentLocator};
pub use overrides::{ExamOverride, OverrideTable, QuestionOverride};
pub use question::{Exam, Question, QuestionType, OPTION_COUNT};
