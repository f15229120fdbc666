pub mod audience;
pub mod builder;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod dmp;
pub mod error;
pub mod model;
pub mod multistatus;
pub mod outbox;
pub mod partition;
pub mod resolver;
pub mod sync;
pub mod validate;
