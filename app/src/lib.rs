pub mod coordinator;
pub mod core;
pub mod entity;
pub mod mypv;
pub mod settings;
