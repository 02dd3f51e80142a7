mod builtin;
mod descriptor;
mod pattern;

pub use builtin::*;
pub use descriptor::*;
pub use pattern::*;
