#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod config;
pub mod contact;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod monitor;
pub mod policy;
pub mod service;
pub mod verify;

pub use config::Config;
pub use error::ContactError;
pub use limiter::RateLimiter;
pub use policy::Policy;
pub use service::{configure, ContactService, Outcome};
