#[cfg(feature = "server")]
pub mod api;
pub mod audit;
pub mod chart;
pub mod describe;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod model;
pub mod paths;
pub mod prompt;
pub mod registry;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod store;
pub mod translator;
pub mod util;
