mod global;
mod resolution;

pub use global::GlobalArgs;
pub use resolution::ResolutionArgs;
