pub mod enrichment;
pub mod feed;
pub mod sink;
