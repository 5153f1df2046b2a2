pub mod meta;
pub mod report;
pub mod visit;

pub use meta::*;
pub use report::*;
pub use visit::*;

/// Shown wherever a value is absent.
pub const EM_DASH: &str = "\u{2014}";

/// Ordered label → value pairs. Order is display order.
pub type FieldList = Vec<(String, String)>;
