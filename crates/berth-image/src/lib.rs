//! Berth Image - build, log in, push
//!
//! [`ImagePipeline`] drives an [`ImageHost`] through the three steps in
//! order and stops at the first failure. [`DockerHost`] is the host used by
//! the CLI: it runs `docker` and the `aws` CLI.

pub mod error;
pub mod host;
pub mod pipeline;

pub use error::{ImageError, Result};
pub use host::{DockerHost, ImageHost};
pub use pipeline::{BuildRequest, ImagePipeline, image_tag};
