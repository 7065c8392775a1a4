mod access;
mod authz;
mod domain;
mod project;
mod worker;
mod workspace;

pub use access::*;
pub use authz::*;
pub use domain::*;
pub use project::*;
pub use worker::*;
pub use workspace::*;
