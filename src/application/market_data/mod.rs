pub mod frame_loader;
pub mod raw_feed_normalizer;
pub mod resampler;

pub use frame_loader::FrameLoader;
pub use raw_feed_normalizer::{NormalizeOutcome, RawFeedNormalizer};
pub use resampler::{IndexedBuckets, Resampler};
