//! Berth Core - Core types shared by every berth crate
//!
//! - `BerthConfig`: configured charts, bundle names and storage settings
//! - `Archetype` and `generate_name`: release identity
//! - `ApiValues` / `GameHostValues`: typed values documents
//! - `LoadedChart`: chart template directories
//! - `ConfigBundle`: settings and logging artifacts
//! - `TemplateContext`: what templates see when rendering

pub mod archetype;
pub mod bundle;
pub mod chart;
pub mod config;
pub mod context;
pub mod error;
pub mod naming;
pub mod release;
pub mod schema;
pub mod values;

pub use archetype::Archetype;
pub use bundle::{BundleSpec, ConfigBundle};
pub use chart::{ChartMetadata, LoadedChart};
pub use config::{BerthConfig, ChartDescriptor, Compression, StorageBackend, StorageSettings};
pub use context::{ChartInfo, TemplateContext};
pub use error::CoreError;
pub use naming::generate_name;
pub use release::ReleaseInfo;
pub use schema::{
    ApiValues, BodySpec, ConfigData, ConfigSection, GameHostValues, ImageSpec, IngressHost,
    IngressSpec, ValuesSchema, VolumeMount,
};
pub use values::Values;
