//! データモデル

pub mod options;
pub mod registry;
pub mod request;
pub mod result;

pub use options::*;
pub use registry::*;
pub use request::*;
pub use result::*;
