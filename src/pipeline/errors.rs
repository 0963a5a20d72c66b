use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unparseable document: {0}")]
    Parse(String),

    #[error("article extraction failed: {0}")]
    Extraction(String),

    #[error("markdown conversion failed: {0}")]
    Conversion(String),
}
