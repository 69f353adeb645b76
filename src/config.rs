//! Declarative experiment configuration.
//!
//! An experiment file names the model tree, the wiring, the initial
//! conditions and the time bounds; the dynamics identifiers are resolved
//! against a registry when the graph is loaded. YAML and JSON are both
//! accepted.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! experiment:
//!   name: queueing
//!   begin: 0.0
//!   duration: 100.0
//!
//! models:
//!   - name: gen
//!     type: atomic
//!     dynamics: Generator
//!     outputs: [out]
//!     conditions:
//!       period: 5.0
//!     observables: [count]
//!   - name: stage
//!     type: coupled
//!     inputs: [in]
//!     models:
//!       - name: proc
//!         type: atomic
//!         dynamics: Processor
//!         inputs: [in]
//!         outputs: [out]
//!     connections:
//!       - kind: input
//!         src_port: in
//!         dst: proc
//!         dst_port: in
//!
//! connections:
//!   - kind: internal
//!     src: gen
//!     src_port: out
//!     dst: stage
//!     dst_port: in
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SimError;
use crate::graph::{AtomicSpec, Conditions, ConnectionKind, CoupledSpec, ModelGraph, ModelId};
use crate::observer::Observer;
use crate::registry::DynamicsRegistry;
use crate::root::RootCoordinator;
use crate::time::Time;

/// Errors that can occur while loading an experiment configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown file format: {0}")]
    UnknownFormat(String),

    #[error("graph construction failed: {0}")]
    Graph(#[from] SimError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global experiment parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentParams {
    /// Experiment name, used for the root coupled model.
    #[serde(default = "default_name")]
    pub name: String,

    /// Initialization time.
    #[serde(default)]
    pub begin: f64,

    /// Simulated duration; omitted means "run to quiescence".
    #[serde(default)]
    pub duration: Option<f64>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "experiment".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            name: default_name(),
            begin: 0.0,
            duration: None,
            log_level: default_log_level(),
        }
    }
}

/// A connection inside a coupled model.
///
/// `src`/`dst` omitted (or `~` in YAML) designate the enclosing coupled
/// model itself, for the `input` and `output` kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    #[serde(default)]
    pub src: Option<String>,
    pub src_port: String,
    #[serde(default)]
    pub dst: Option<String>,
    pub dst_port: String,
}

/// A model description, atomic or coupled (recursively).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelConfig {
    Atomic {
        name: String,
        dynamics: String,
        #[serde(default)]
        inputs: Vec<String>,
        #[serde(default)]
        outputs: Vec<String>,
        #[serde(default)]
        conditions: Conditions,
        #[serde(default)]
        observables: Vec<String>,
    },
    Coupled {
        name: String,
        #[serde(default)]
        inputs: Vec<String>,
        #[serde(default)]
        outputs: Vec<String>,
        #[serde(default)]
        models: Vec<ModelConfig>,
        #[serde(default)]
        connections: Vec<ConnectionConfig>,
    },
}

impl ModelConfig {
    fn name(&self) -> &str {
        match self {
            ModelConfig::Atomic { name, .. } => name,
            ModelConfig::Coupled { name, .. } => name,
        }
    }
}

/// A complete experiment description.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Experiment parameters.
    #[serde(default)]
    pub experiment: ExperimentParams,

    /// Models directly under the root.
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Connections among the root-level models.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl SimConfig {
    /// Parses a YAML configuration string.
    pub fn from_yaml_str(s: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON configuration string.
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, dispatching on its extension
    /// (`.yaml`/`.yml`/`.json`).
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnknownFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Checks structural consistency that does not need a built graph:
    /// non-empty names, sibling uniqueness, connection endpoints naming
    /// declared children.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.experiment.name.is_empty() {
            return Err(ConfigError::Validation(
                "experiment name must not be empty".to_string(),
            ));
        }
        if let Some(duration) = self.experiment.duration {
            if duration < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "duration must be non-negative, got {duration}"
                )));
            }
        }
        Self::validate_level(&self.experiment.name, &self.models, &self.connections)
    }

    fn validate_level(
        scope: &str,
        models: &[ModelConfig],
        connections: &[ConnectionConfig],
    ) -> ConfigResult<()> {
        let mut names = HashSet::new();
        for model in models {
            if model.name().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "model under '{scope}' has an empty name"
                )));
            }
            if !names.insert(model.name()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate model name '{}' under '{scope}'",
                    model.name()
                )));
            }
            match model {
                ModelConfig::Atomic { name, dynamics, .. } => {
                    if dynamics.is_empty() {
                        return Err(ConfigError::Validation(format!(
                            "atomic model '{name}' has an empty dynamics identifier"
                        )));
                    }
                }
                ModelConfig::Coupled {
                    name,
                    models,
                    connections,
                    ..
                } => {
                    Self::validate_level(name, models, connections)?;
                }
            }
        }
        for connection in connections {
            for endpoint in [&connection.src, &connection.dst] {
                if let Some(name) = endpoint {
                    if !names.contains(name.as_str()) {
                        return Err(ConfigError::Validation(format!(
                            "connection in '{scope}' references unknown model '{name}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds the model graph described by this configuration.
    pub fn build_graph(&self) -> ConfigResult<ModelGraph> {
        let mut graph = ModelGraph::new(self.experiment.name.clone());
        let root = graph.root();
        Self::build_level(&mut graph, root, &self.models, &self.connections)?;
        Ok(graph)
    }

    fn build_level(
        graph: &mut ModelGraph,
        parent: ModelId,
        models: &[ModelConfig],
        connections: &[ConnectionConfig],
    ) -> ConfigResult<()> {
        let mut ids: HashMap<&str, ModelId> = HashMap::new();
        for model in models {
            match model {
                ModelConfig::Atomic {
                    name,
                    dynamics,
                    inputs,
                    outputs,
                    conditions,
                    observables,
                } => {
                    let spec = AtomicSpec {
                        name: name.clone(),
                        dynamics: dynamics.clone(),
                        inputs: inputs.clone(),
                        outputs: outputs.clone(),
                        conditions: conditions.clone(),
                        observables: observables.clone(),
                    };
                    let id = graph.add_atomic(parent, spec)?;
                    ids.insert(name.as_str(), id);
                }
                ModelConfig::Coupled {
                    name,
                    inputs,
                    outputs,
                    models,
                    connections,
                } => {
                    let spec = CoupledSpec {
                        name: name.clone(),
                        inputs: inputs.clone(),
                        outputs: outputs.clone(),
                    };
                    let id = graph.add_coupled(parent, spec)?;
                    ids.insert(name.as_str(), id);
                    Self::build_level(graph, id, models, connections)?;
                }
            }
        }
        for connection in connections {
            let resolve = |endpoint: &Option<String>| -> ConfigResult<ModelId> {
                match endpoint {
                    None => Ok(parent),
                    Some(name) => ids.get(name.as_str()).copied().ok_or_else(|| {
                        ConfigError::Validation(format!(
                            "connection references unknown model '{name}'"
                        ))
                    }),
                }
            };
            let src = resolve(&connection.src)?;
            let dst = resolve(&connection.dst)?;
            graph.connect(
                parent,
                connection.kind,
                src,
                connection.src_port.as_str(),
                dst,
                connection.dst_port.as_str(),
            )?;
        }
        Ok(())
    }

    /// The initialization time.
    pub fn begin(&self) -> Time {
        Time::new(self.experiment.begin)
    }

    /// The end bound, infinity when no duration is given.
    pub fn end(&self) -> Time {
        match self.experiment.duration {
            Some(duration) => self.begin() + Time::new(duration),
            None => Time::INFINITY,
        }
    }

    /// Builds a loaded root coordinator for this experiment, ready for
    /// `init`.
    pub fn build_root(
        &self,
        registry: DynamicsRegistry,
        observer: Box<dyn Observer>,
    ) -> ConfigResult<RootCoordinator> {
        let graph = self.build_graph()?;
        let mut root = RootCoordinator::new()
            .with_begin(self.begin())
            .with_end(self.end());
        root.load(graph, registry, observer)?;
        Ok(root)
    }
}
