pub mod rendering;

pub use rendering::{BindingNames, PrimitiveConfig};
