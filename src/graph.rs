//! The hierarchical model graph.
//!
//! A simulation is described by a tree of models: atomic models at the
//! leaves, coupled models as containers, connected through named ports.
//! The graph owns every model in a slot arena indexed by [`ModelId`];
//! parent links are plain indices, never a second ownership edge.
//!
//! Connections come in three kinds:
//! - **internal**: child output port → sibling input port,
//! - **input**: coupled model's own input port → child input port,
//! - **output**: child output port → coupled model's own output port.
//!
//! Structural operations validate the graph invariants eagerly: sibling
//! names are unique, port names are unique per direction, and every
//! connection endpoint must exist at insertion time. Removing a model also
//! removes every connection in its parent that references it, so dangling
//! references never survive a mutation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Index of a model in the graph arena.
pub type ModelId = usize;

/// Named parameter values handed to a dynamics implementation at
/// instantiation. The kernel never interprets their contents.
pub type Conditions = HashMap<String, serde_json::Value>;

/// Which side of a model a port belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// The kind of a connection inside a coupled model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Child output port to sibling input port.
    Internal,
    /// Coupled model input port to child input port.
    Input,
    /// Child output port to coupled model output port.
    Output,
}

/// A directed connection between two ports inside a coupled model.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub src: ModelId,
    pub src_port: String,
    pub dst: ModelId,
    pub dst_port: String,
}

/// Description of an atomic model to be added to the graph.
///
/// Built in the builder style; the dynamics identifier is resolved against a
/// [`DynamicsRegistry`](crate::registry::DynamicsRegistry) when the graph is
/// loaded into a coordinator.
#[derive(Clone, Debug, Default)]
pub struct AtomicSpec {
    pub name: String,
    pub dynamics: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub conditions: Conditions,
    pub observables: Vec<String>,
}

impl AtomicSpec {
    /// Creates a spec for an atomic model using the named dynamics.
    pub fn new(name: impl Into<String>, dynamics: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dynamics: dynamics.into(),
            ..Default::default()
        }
    }

    /// Adds an input port.
    pub fn with_input(mut self, port: impl Into<String>) -> Self {
        self.inputs.push(port.into());
        self
    }

    /// Adds an output port.
    pub fn with_output(mut self, port: impl Into<String>) -> Self {
        self.outputs.push(port.into());
        self
    }

    /// Adds a named initial-condition value.
    pub fn with_condition(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.conditions.insert(name.into(), value);
        self
    }

    /// Marks an observation port to be queried after every transition.
    pub fn with_observable(mut self, port: impl Into<String>) -> Self {
        self.observables.push(port.into());
        self
    }
}

/// Description of a coupled model to be added to the graph.
#[derive(Clone, Debug, Default)]
pub struct CoupledSpec {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl CoupledSpec {
    /// Creates a spec for an empty coupled model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an input port.
    pub fn with_input(mut self, port: impl Into<String>) -> Self {
        self.inputs.push(port.into());
        self
    }

    /// Adds an output port.
    pub fn with_output(mut self, port: impl Into<String>) -> Self {
        self.outputs.push(port.into());
        self
    }
}

/// Behavioral configuration of an atomic model.
#[derive(Clone, Debug)]
pub struct AtomicInfo {
    /// Registry identifier of the dynamics implementation.
    pub dynamics: String,
    /// Initial-condition values handed to the dynamics factory.
    pub conditions: Conditions,
    /// Observation ports queried after each transition.
    pub observables: Vec<String>,
}

#[derive(Clone, Debug)]
enum ModelKind {
    Atomic(AtomicInfo),
    Coupled {
        children: Vec<ModelId>,
        connections: Vec<Connection>,
    },
}

#[derive(Clone, Debug)]
struct ModelNode {
    name: String,
    parent: Option<ModelId>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    kind: ModelKind,
}

/// The hierarchical model graph.
///
/// The root is always a coupled model created by [`ModelGraph::new`].
#[derive(Clone, Debug)]
pub struct ModelGraph {
    arena: Vec<Option<ModelNode>>,
    root: ModelId,
}

impl ModelGraph {
    /// Creates a graph with an empty root coupled model.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root_node = ModelNode {
            name: root_name.into(),
            parent: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind: ModelKind::Coupled {
                children: Vec::new(),
                connections: Vec::new(),
            },
        };
        Self {
            arena: vec![Some(root_node)],
            root: 0,
        }
    }

    /// Returns the root coupled model.
    pub fn root(&self) -> ModelId {
        self.root
    }

    /// Returns `true` if `id` names a live model.
    pub fn contains(&self, id: ModelId) -> bool {
        self.arena.get(id).map_or(false, Option::is_some)
    }

    fn node(&self, id: ModelId) -> SimResult<&ModelNode> {
        self.arena
            .get(id)
            .and_then(Option::as_ref)
            .ok_or_else(|| SimError::ModelNotFound(format!("#{id}")))
    }

    fn node_mut(&mut self, id: ModelId) -> SimResult<&mut ModelNode> {
        self.arena
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| SimError::ModelNotFound(format!("#{id}")))
    }

    /// Returns the model's name.
    pub fn name(&self, id: ModelId) -> SimResult<&str> {
        Ok(&self.node(id)?.name)
    }

    /// Returns the dot-separated path from the root to the model.
    pub fn path(&self, id: ModelId) -> SimResult<String> {
        let mut parts = vec![self.node(id)?.name.clone()];
        let mut current = self.node(id)?.parent;
        while let Some(pid) = current {
            let node = self.node(pid)?;
            parts.push(node.name.clone());
            current = node.parent;
        }
        parts.reverse();
        Ok(parts.join("."))
    }

    /// Returns the parent coupled model, or `None` for the root.
    pub fn parent(&self, id: ModelId) -> SimResult<Option<ModelId>> {
        Ok(self.node(id)?.parent)
    }

    /// Returns `true` if the model is atomic.
    pub fn is_atomic(&self, id: ModelId) -> SimResult<bool> {
        Ok(matches!(self.node(id)?.kind, ModelKind::Atomic(_)))
    }

    /// Returns the behavioral configuration of an atomic model.
    pub fn atomic_info(&self, id: ModelId) -> SimResult<&AtomicInfo> {
        match &self.node(id)?.kind {
            ModelKind::Atomic(info) => Ok(info),
            ModelKind::Coupled { .. } => {
                Err(SimError::ModelNotFound(format!("atomic model #{id}")))
            }
        }
    }

    /// Returns the direct children of a coupled model.
    pub fn children(&self, id: ModelId) -> SimResult<&[ModelId]> {
        match &self.node(id)?.kind {
            ModelKind::Coupled { children, .. } => Ok(children),
            ModelKind::Atomic(_) => Ok(&[]),
        }
    }

    /// Finds a direct child by name.
    pub fn find_child(&self, parent: ModelId, name: &str) -> SimResult<Option<ModelId>> {
        for &child in self.children(parent)? {
            if self.node(child)?.name == name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Returns the model's input port names, in declaration order.
    pub fn input_ports(&self, id: ModelId) -> SimResult<&[String]> {
        Ok(&self.node(id)?.inputs)
    }

    /// Returns the model's output port names, in declaration order.
    pub fn output_ports(&self, id: ModelId) -> SimResult<&[String]> {
        Ok(&self.node(id)?.outputs)
    }

    /// Looks up a port on a model, reporting which side it lives on.
    ///
    /// Input ports shadow output ports of the same name for the purpose of
    /// this lookup; the two namespaces are otherwise independent.
    pub fn find_port(&self, id: ModelId, port: &str) -> SimResult<Option<PortDirection>> {
        let node = self.node(id)?;
        if node.inputs.iter().any(|p| p == port) {
            Ok(Some(PortDirection::Input))
        } else if node.outputs.iter().any(|p| p == port) {
            Ok(Some(PortDirection::Output))
        } else {
            Ok(None)
        }
    }

    fn has_port(&self, id: ModelId, port: &str, direction: PortDirection) -> SimResult<bool> {
        let node = self.node(id)?;
        let ports = match direction {
            PortDirection::Input => &node.inputs,
            PortDirection::Output => &node.outputs,
        };
        Ok(ports.iter().any(|p| p == port))
    }

    /// Every atomic model in the graph, in deterministic depth-first order.
    pub fn atomics(&self) -> Vec<ModelId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.arena.get(id).and_then(Option::as_ref) {
                match &node.kind {
                    ModelKind::Atomic(_) => out.push(id),
                    ModelKind::Coupled { children, .. } => {
                        // Reverse keeps the visit in declaration order.
                        stack.extend(children.iter().rev());
                    }
                }
            }
        }
        out
    }

    fn check_ports(name: &str, ports: &[String], direction: &'static str) -> SimResult<()> {
        let mut seen = HashSet::new();
        for port in ports {
            if !seen.insert(port.as_str()) {
                return Err(SimError::DuplicatePort {
                    model: name.to_string(),
                    direction,
                    port: port.clone(),
                });
            }
        }
        Ok(())
    }

    fn attach(&mut self, parent: ModelId, node: ModelNode) -> SimResult<ModelId> {
        let parent_name = self.node(parent)?.name.clone();
        if matches!(self.node(parent)?.kind, ModelKind::Atomic(_)) {
            return Err(SimError::NotACoupledModel(parent_name));
        }
        if self.find_child(parent, &node.name)?.is_some() {
            return Err(SimError::DuplicateName {
                parent: parent_name,
                name: node.name,
            });
        }
        let id = self.arena.len();
        self.arena.push(Some(node));
        if let ModelKind::Coupled { children, .. } = &mut self.node_mut(parent)?.kind {
            children.push(id);
        }
        Ok(id)
    }

    /// Adds an atomic model as a child of `parent`.
    pub fn add_atomic(&mut self, parent: ModelId, spec: AtomicSpec) -> SimResult<ModelId> {
        Self::check_ports(&spec.name, &spec.inputs, "input")?;
        Self::check_ports(&spec.name, &spec.outputs, "output")?;
        let node = ModelNode {
            name: spec.name,
            parent: Some(parent),
            inputs: spec.inputs,
            outputs: spec.outputs,
            kind: ModelKind::Atomic(AtomicInfo {
                dynamics: spec.dynamics,
                conditions: spec.conditions,
                observables: spec.observables,
            }),
        };
        self.attach(parent, node)
    }

    /// Adds an empty coupled model as a child of `parent`.
    pub fn add_coupled(&mut self, parent: ModelId, spec: CoupledSpec) -> SimResult<ModelId> {
        Self::check_ports(&spec.name, &spec.inputs, "input")?;
        Self::check_ports(&spec.name, &spec.outputs, "output")?;
        let node = ModelNode {
            name: spec.name,
            parent: Some(parent),
            inputs: spec.inputs,
            outputs: spec.outputs,
            kind: ModelKind::Coupled {
                children: Vec::new(),
                connections: Vec::new(),
            },
        };
        self.attach(parent, node)
    }

    /// Detaches the named child of `parent` and frees its whole subtree.
    ///
    /// Every connection in `parent` referencing the removed model is removed
    /// as well. Returns the freed model ids, removed model first; the caller
    /// uses them to drop simulators and scheduler entries.
    pub fn remove_model(&mut self, parent: ModelId, name: &str) -> SimResult<Vec<ModelId>> {
        let child = self
            .find_child(parent, name)?
            .ok_or_else(|| SimError::ModelNotFound(name.to_string()))?;

        // Collect the subtree before mutating anything.
        let mut removed = Vec::new();
        let mut stack = vec![child];
        while let Some(id) = stack.pop() {
            removed.push(id);
            if let ModelKind::Coupled { children, .. } = &self.node(id)?.kind {
                stack.extend(children.iter().copied());
            }
        }

        match &mut self.node_mut(parent)?.kind {
            ModelKind::Coupled {
                children,
                connections,
            } => {
                children.retain(|&c| c != child);
                connections.retain(|c| c.src != child && c.dst != child);
            }
            ModelKind::Atomic(_) => unreachable!("child lookup succeeded on a coupled parent"),
        }

        for &id in &removed {
            self.arena[id] = None;
        }
        Ok(removed)
    }

    fn validate_connection(
        &self,
        parent: ModelId,
        kind: ConnectionKind,
        src: ModelId,
        src_port: &str,
        dst: ModelId,
        dst_port: &str,
    ) -> SimResult<()> {
        let describe = |msg: String| Err(SimError::InvalidConnection(msg));
        let is_child = |id: ModelId| -> SimResult<bool> {
            Ok(self.children(parent)?.contains(&id))
        };

        match kind {
            ConnectionKind::Internal => {
                if !is_child(src)? || !is_child(dst)? {
                    return describe(format!(
                        "internal connection endpoints must be direct children of '{}'",
                        self.node(parent)?.name
                    ));
                }
                self.require_port(src, src_port, PortDirection::Output)?;
                self.require_port(dst, dst_port, PortDirection::Input)?;
            }
            ConnectionKind::Input => {
                if src != parent {
                    return describe(format!(
                        "input connection source must be the coupled model '{}' itself",
                        self.node(parent)?.name
                    ));
                }
                if !is_child(dst)? {
                    return describe(format!(
                        "input connection destination must be a direct child of '{}'",
                        self.node(parent)?.name
                    ));
                }
                self.require_port(parent, src_port, PortDirection::Input)?;
                self.require_port(dst, dst_port, PortDirection::Input)?;
            }
            ConnectionKind::Output => {
                if dst != parent {
                    return describe(format!(
                        "output connection destination must be the coupled model '{}' itself",
                        self.node(parent)?.name
                    ));
                }
                if !is_child(src)? {
                    return describe(format!(
                        "output connection source must be a direct child of '{}'",
                        self.node(parent)?.name
                    ));
                }
                self.require_port(src, src_port, PortDirection::Output)?;
                self.require_port(parent, dst_port, PortDirection::Output)?;
            }
        }
        Ok(())
    }

    fn require_port(&self, id: ModelId, port: &str, direction: PortDirection) -> SimResult<()> {
        if self.has_port(id, port, direction)? {
            Ok(())
        } else {
            Err(SimError::PortNotFound {
                model: self.node(id)?.name.clone(),
                direction: match direction {
                    PortDirection::Input => "input",
                    PortDirection::Output => "output",
                },
                port: port.to_string(),
            })
        }
    }

    /// Adds a connection to the coupled model `parent`.
    ///
    /// Endpoints are validated against the kind-specific constraints; an
    /// exact duplicate of an existing connection is rejected, since it would
    /// deliver the same event twice.
    pub fn connect(
        &mut self,
        parent: ModelId,
        kind: ConnectionKind,
        src: ModelId,
        src_port: impl Into<String>,
        dst: ModelId,
        dst_port: impl Into<String>,
    ) -> SimResult<()> {
        let src_port = src_port.into();
        let dst_port = dst_port.into();
        self.validate_connection(parent, kind, src, &src_port, dst, &dst_port)?;
        let connection = Connection {
            kind,
            src,
            src_port,
            dst,
            dst_port,
        };
        match &mut self.node_mut(parent)?.kind {
            ModelKind::Coupled { connections, .. } => {
                if connections.contains(&connection) {
                    return Err(SimError::InvalidConnection(format!(
                        "connection {}:{} -> {}:{} already exists",
                        connection.src, connection.src_port, connection.dst, connection.dst_port
                    )));
                }
                connections.push(connection);
                Ok(())
            }
            ModelKind::Atomic(_) => Err(SimError::NotACoupledModel(
                self.node(parent)?.name.clone(),
            )),
        }
    }

    /// Removes a connection from the coupled model `parent`.
    pub fn disconnect(
        &mut self,
        parent: ModelId,
        kind: ConnectionKind,
        src: ModelId,
        src_port: &str,
        dst: ModelId,
        dst_port: &str,
    ) -> SimResult<()> {
        let parent_name = self.node(parent)?.name.clone();
        let src_name = self.node(src)?.name.clone();
        let dst_name = self.node(dst)?.name.clone();
        match &mut self.node_mut(parent)?.kind {
            ModelKind::Coupled { connections, .. } => {
                let before = connections.len();
                connections.retain(|c| {
                    !(c.kind == kind
                        && c.src == src
                        && c.src_port == src_port
                        && c.dst == dst
                        && c.dst_port == dst_port)
                });
                if connections.len() == before {
                    Err(SimError::ConnectionNotFound {
                        parent: parent_name,
                        src: src_name,
                        src_port: src_port.to_string(),
                        dst: dst_name,
                        dst_port: dst_port.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            ModelKind::Atomic(_) => Err(SimError::NotACoupledModel(parent_name)),
        }
    }

    /// All connections declared in the coupled model `parent`.
    pub fn connections(&self, parent: ModelId) -> SimResult<&[Connection]> {
        match &self.node(parent)?.kind {
            ModelKind::Coupled { connections, .. } => Ok(connections),
            ModelKind::Atomic(_) => Ok(&[]),
        }
    }

    /// Connections in `parent` that reference `model` as either endpoint.
    pub fn connections_for(&self, parent: ModelId, model: ModelId) -> SimResult<Vec<Connection>> {
        Ok(self
            .connections(parent)?
            .iter()
            .filter(|c| c.src == model || c.dst == model)
            .cloned()
            .collect())
    }

    /// Resolves every atomic destination of an event leaving `src` on its
    /// output port `port`.
    ///
    /// Internal connections deliver directly; output connections climb into
    /// the parent's scope; input connections of nested coupled models descend
    /// until a concrete atomic input port is reached. Fan-out returns every
    /// destination, in connection-declaration order.
    pub fn route_from_output(
        &self,
        src: ModelId,
        port: &str,
    ) -> SimResult<Vec<(ModelId, String)>> {
        let mut targets = Vec::new();
        let mut visited = HashSet::new();
        self.route_up(src, port, &mut visited, &mut targets)?;
        Ok(targets)
    }

    fn route_up(
        &self,
        model: ModelId,
        port: &str,
        visited: &mut HashSet<(ModelId, String, bool)>,
        targets: &mut Vec<(ModelId, String)>,
    ) -> SimResult<()> {
        if !visited.insert((model, port.to_string(), true)) {
            return Ok(());
        }
        let Some(parent) = self.node(model)?.parent else {
            // The root's output ports lead outside the simulated system.
            return Ok(());
        };
        for conn in self.connections(parent)? {
            if conn.src != model || conn.src_port != port {
                continue;
            }
            match conn.kind {
                ConnectionKind::Internal => {
                    self.deliver(conn.dst, &conn.dst_port, visited, targets)?;
                }
                ConnectionKind::Output => {
                    self.route_up(parent, &conn.dst_port, visited, targets)?;
                }
                ConnectionKind::Input => {}
            }
        }
        Ok(())
    }

    fn deliver(
        &self,
        model: ModelId,
        port: &str,
        visited: &mut HashSet<(ModelId, String, bool)>,
        targets: &mut Vec<(ModelId, String)>,
    ) -> SimResult<()> {
        match &self.node(model)?.kind {
            ModelKind::Atomic(_) => {
                targets.push((model, port.to_string()));
                Ok(())
            }
            ModelKind::Coupled { connections, .. } => {
                if !visited.insert((model, port.to_string(), false)) {
                    return Ok(());
                }
                for conn in connections {
                    if conn.kind == ConnectionKind::Input
                        && conn.src == model
                        && conn.src_port == port
                    {
                        self.deliver(conn.dst, &conn.dst_port, visited, targets)?;
                    }
                }
                Ok(())
            }
        }
    }
}
