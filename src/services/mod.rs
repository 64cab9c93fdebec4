pub mod answer_key_extractor;
pub mod audit;
pub mod field_classifier;
pub mod finding_writer;
pub mod option_block_finder;
pub mod question_segmenter;
pub mod reconciler;
pub mod section_splitter;

pub use answer_key_extractor::AnswerKeyExtractor;
pub use audit::QualityAudit;
pub use field_classifier::{detect_marker_style, DraftFields, FieldClassifier};
pub use finding_writer::FindingWriter;
pub use option_block_finder::{OptionBlock, OptionBlockFinder};
pub use question_segmenter::{QuestionSegmenter, Region, Segmentation, StartMarker};
pub use reconciler::{QuestionDraft, ReconcileInput, Reconciler, Reconciliation};
pub use section_splitter::{SectionSplitter, TrackBoundary, TrackSelection};
