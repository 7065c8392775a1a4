pub mod domain;
pub mod leases;
pub mod workers;
