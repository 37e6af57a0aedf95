pub mod constant;
pub mod luma;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use constant::ConstantDepth;
pub use luma::LumaDepth;

#[cfg(feature = "backend-tract")]
pub use tract::TractDepth;
