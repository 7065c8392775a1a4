pub mod access;
pub mod authz;
pub mod execution;
pub mod workspace;
