pub mod raw_spot;

pub use raw_spot::RawSpot;
