pub mod link;
pub mod project;
pub mod schedule;
pub mod system;
pub mod task;
pub mod view;
