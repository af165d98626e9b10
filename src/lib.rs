//! A meta-protocol memcached client with blocking and cooperative (Tokio)
//! execution surfaces, sharing a single codec, command/result types,
//! consistent-hash ring, and pluggable value codec between both.

pub mod client;
pub mod command;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod parser;
pub mod pool;
pub mod ring;
pub mod value;

pub use client::blocking::BlockingClient;
pub use client::cooperative::Client;
pub use client::{ClientOptions, GetOptions, GetResult};
pub use command::{Flag, MetaCommand, MetaResult, Verb};
pub use connection::{ConnectionState, Credentials};
pub use endpoint::Endpoint;
pub use error::{DecodeError, Error};
pub use ring::Ring;
pub use value::{DefaultCodec, Structured, ValueCodec};
