mod digest;
mod installer;
mod lookup;
mod merge;
mod sync;

pub use digest::*;
pub use installer::*;
pub use lookup::*;
pub use merge::*;
pub use sync::*;
