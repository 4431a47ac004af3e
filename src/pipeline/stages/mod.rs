pub mod compress;
pub mod output;
pub mod preprocess;
pub mod xmlgen;

pub use compress::CompressStage;
pub use output::OutputStage;
pub use preprocess::PreprocessStage;
pub use xmlgen::XmlGenStage;
