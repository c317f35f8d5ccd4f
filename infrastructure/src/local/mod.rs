//! Local directory source collection

mod file_provider;

pub use file_provider::LocalFileProvider;
