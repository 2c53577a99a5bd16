pub mod batch;
pub mod canon;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod emit;
pub mod event;
pub mod parse;
pub mod pipeline;
