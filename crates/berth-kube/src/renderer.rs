//! Typed values documents rendered from a chart's defaults
//!
//! [`ValuesRenderer`] loads a chart's `values.yaml` into an archetype schema
//! once, then hands a fresh copy of that default to each caller-supplied
//! mutation. The same code serves both archetypes through [`ValuesSchema`].

use berth_core::{CoreError, LoadedChart, Values, ValuesSchema};
use std::path::Path;

use crate::error::Result;

/// A mutated values document, typed and as JSON
#[derive(Debug, Clone)]
pub struct RenderedValues<T> {
    document: T,
    values: Values,
}

impl<T: ValuesSchema> RenderedValues<T> {
    fn new(document: T) -> Result<Self> {
        let values = Values::from_typed(&document)?;
        Ok(Self { document, values })
    }

    pub fn document(&self) -> &T {
        &self.document
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Image tag the document deploys
    pub fn version(&self) -> &str {
        &self.document.image().tag
    }

    pub fn into_values(self) -> Values {
        self.values
    }
}

/// Loads a chart's default document and applies mutations to copies of it
#[derive(Debug, Clone)]
pub struct ValuesRenderer<T> {
    chart: LoadedChart,
    defaults: T,
}

impl<T: ValuesSchema> ValuesRenderer<T> {
    /// Load the chart at `template_path` and parse its defaults as `T`
    pub fn load(template_path: impl AsRef<Path>) -> Result<Self> {
        let chart = LoadedChart::load(template_path)?;
        let text = chart.default_values()?;
        let defaults: T = serde_yaml::from_str(&text).map_err(|e| schema_mismatch::<T>(&chart, e))?;

        tracing::debug!(
            chart = %chart.metadata.name,
            archetype = %T::ARCHETYPE,
            "loaded default values"
        );

        Ok(Self { chart, defaults })
    }

    pub fn chart(&self) -> &LoadedChart {
        &self.chart
    }

    #[cfg(test)]
    fn defaults(&self) -> &T {
        &self.defaults
    }

    /// Apply `mutate` to a copy of the defaults
    pub fn render(&self, mutate: impl FnOnce(&mut T)) -> Result<RenderedValues<T>> {
        let mut document = self.defaults.clone();
        mutate(&mut document);
        RenderedValues::new(document)
    }
}

/// Re-read a stored document as `T` and change only its image tag
pub fn retag<T: ValuesSchema>(chart: &LoadedChart, values: &Values, version: &str) -> Result<RenderedValues<T>> {
    let mut document: T = values
        .to_typed()
        .map_err(|e| schema_mismatch::<T>(chart, e))?;
    document.image_mut().tag = version.to_string();
    RenderedValues::new(document)
}

fn schema_mismatch<T: ValuesSchema>(chart: &LoadedChart, err: impl std::fmt::Display) -> CoreError {
    CoreError::SchemaMismatch {
        chart: chart.metadata.name.clone(),
        archetype: T::ARCHETYPE.to_string(),
        message: err.to_string(),
    }
}
