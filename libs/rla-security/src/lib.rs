#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod context;
pub mod user_methods;
pub mod value;

pub use context::{SecurityContext, SecurityContextBuilder};
pub use user_methods::{BoundUserMethod, UnknownUserMethod, UserMethodRegistry, builtin};
pub use value::{ScalarValue, UserValue};
