use anyhow::Result;

pub mod jsonl;

pub use self::jsonl::JsonlSink;

/// Destination for the records a query keeps.
pub trait DataSink: Send {
    fn add_record(&mut self, line: &str) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
