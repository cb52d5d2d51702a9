//! Typed values schemas for the two archetypes
//!
//! Both schemas share the same image/body/config/volume-mount sections. The
//! api schema adds ingress hosts and a replica count. Keys the schema does not
//! know about are kept in `extra` and written back untouched, so chart
//! templates keep seeing them.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::archetype::Archetype;

/// Container image reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub repository: String,

    #[serde(default)]
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Workload identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySpec {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Raw configuration blobs mounted into the workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
    #[serde(default)]
    pub appsettings: String,

    #[serde(default, rename = "log4netConfig")]
    pub log4net_config: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// ConfigMap section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSection {
    #[serde(default)]
    pub data: ConfigData,

    #[serde(default)]
    pub config_map_name: String,

    #[serde(default)]
    pub config_name: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Volume mount entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,

    pub mount_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Ingress host entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressHost {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub path: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Ingress section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressSpec {
    #[serde(default)]
    pub hosts: Vec<IngressHost>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Values document of the api archetype
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiValues {
    pub image: ImageSpec,

    #[serde(default)]
    pub body: BodySpec,

    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,

    #[serde(default)]
    pub ingress: IngressSpec,

    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Values document of the game host archetype
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHostValues {
    pub image: ImageSpec,

    #[serde(default)]
    pub body: BodySpec,

    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

fn default_count() -> u32 {
    1
}

/// A values document the release engine can load, mutate and submit
///
/// The accessors cover the sections shared by every archetype, so the
/// install path only ever touches `image.tag` and callers do the rest.
pub trait ValuesSchema: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Archetype this schema belongs to
    const ARCHETYPE: Archetype;

    fn image(&self) -> &ImageSpec;
    fn image_mut(&mut self) -> &mut ImageSpec;
    fn body_mut(&mut self) -> &mut BodySpec;
    fn config_mut(&mut self) -> &mut ConfigSection;
    fn volume_mounts_mut(&mut self) -> &mut Vec<VolumeMount>;
}

macro_rules! impl_values_schema {
    ($ty:ty, $archetype:expr) => {
        impl ValuesSchema for $ty {
            const ARCHETYPE: Archetype = $archetype;

            fn image(&self) -> &ImageSpec {
                &self.image
            }

            fn image_mut(&mut self) -> &mut ImageSpec {
                &mut self.image
            }

            fn body_mut(&mut self) -> &mut BodySpec {
                &mut self.body
            }

            fn config_mut(&mut self) -> &mut ConfigSection {
                &mut self.config
            }

            fn volume_mounts_mut(&mut self) -> &mut Vec<VolumeMount> {
                &mut self.volume_mounts
            }
        }
    };
}

impl_values_schema!(ApiValues, Archetype::Api);
impl_values_schema!(GameHostValues, Archetype::GameHost);
