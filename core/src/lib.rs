pub mod archive;
pub mod config;
pub mod image_audit;
pub mod logging;
pub mod outcome;
pub mod policy;
pub mod report;
pub mod run;
pub mod runtime;
pub mod validator;

pub mod error;

pub use error::{CoreError, CoreResult};
pub use validator::{CapabilitySet, CreativeValidator};
