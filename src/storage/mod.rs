pub mod json;

pub use json::{JsonSink, RunDocument, RunMetadata};
