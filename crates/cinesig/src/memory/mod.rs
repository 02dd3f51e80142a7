mod image;
mod process;
mod reader;

#[cfg(test)]
pub mod mock;

pub use image::*;
pub use process::*;
pub use reader::{ReadMemory, RegionInfo};

#[cfg(test)]
pub use mock::{MockMemoryBuilder, MockMemoryReader};
