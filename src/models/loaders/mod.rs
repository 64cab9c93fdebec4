pub mod corpus_loader;
pub mod document_locator;
pub mod toml_loader;

pub use corpus_loader::{load_reference_corpus, save_corpus};
pub use document_locator::DocumentLocator;
pub use toml_loader::load_override_table;
