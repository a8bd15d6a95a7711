pub mod asset_index;
pub mod grabber;

pub use asset_index::{AssetIndex, AssetObject};
pub use grabber::{AssetGrabber, AssetReport};
