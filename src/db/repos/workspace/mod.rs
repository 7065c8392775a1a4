pub mod agent_configs;
pub mod connections;
pub mod project_configs;
pub mod projects;
pub mod workspaces;
