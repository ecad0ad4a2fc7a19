#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod client;
mod config;
pub mod error;

pub use client::LdfClient;
pub use config::ClientConfig;

pub mod model {
    pub use ldf_model::*;
}

pub mod http {
    pub use ldf_http::*;
}

pub mod fragments {
    pub use ldf_fragments::*;
}

pub mod engine {
    pub use ldf_engine::*;
}

pub mod sparql {
    pub use ldf_engine::results::*;
    pub use ldf_engine::sparql::*;
}
