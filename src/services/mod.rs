pub mod ingestor;
pub mod leadership;
pub mod mirror;
pub mod monitor;

pub use leadership::run_supervisor;
