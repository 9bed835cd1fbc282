pub mod data_permission;
