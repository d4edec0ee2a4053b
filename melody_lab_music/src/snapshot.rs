// Graph snapshots: the saveable form of a formula graph, stored as preset
// blobs by the library.
//
// A snapshot lists nodes by position. Each entry keeps the operation name
// and every parameter binding; a link to another node is stored as that
// node's index in the list. Cached values and hooks are not captured, so a
// restored graph starts uncomputed and evaluates on demand like a new one.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SnapshotError};
use crate::formula::{Binding, FormulaNode, NodeHandle};
use crate::registry::{ParamValue, registry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BindingSnapshot {
    Unset,
    Value(ParamValue),
    /// Index of the upstream node in `GraphSnapshot::nodes`.
    Node(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub operation: String,
    pub params: BTreeMap<String, BindingSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    /// Capture `nodes` in order. Every node another node links to must be
    /// part of `nodes`.
    pub fn capture(nodes: &[NodeHandle]) -> std::result::Result<Self, SnapshotError> {
        let mut captured = Vec::with_capacity(nodes.len());
        for (index, handle) in nodes.iter().enumerate() {
            let node = handle
                .try_borrow()
                .map_err(|_| SnapshotError::NodeBusy { index })?;
            let operation = node.descriptor().name;

            let mut params = BTreeMap::new();
            for (name, binding) in node.params() {
                let binding = match binding {
                    Binding::Unset => BindingSnapshot::Unset,
                    Binding::Value(value) => BindingSnapshot::Value(value.clone()),
                    Binding::Node(weak) => {
                        let position = weak.upgrade().and_then(|upstream| {
                            nodes.iter().position(|other| Rc::ptr_eq(other, &upstream))
                        });
                        let position = position.ok_or_else(|| SnapshotError::NodeOutsideGraph {
                            operation,
                            param: name.clone(),
                        })?;
                        BindingSnapshot::Node(position)
                    }
                };
                params.insert(name.clone(), binding);
            }
            captured.push(NodeSnapshot {
                operation: operation.to_string(),
                params,
            });
        }
        debug!(nodes = captured.len(), "captured graph snapshot");
        Ok(GraphSnapshot { nodes: captured })
    }

    /// Rebuild the graph. Handles come back in snapshot order; the caller
    /// owns them, since links between nodes are weak.
    pub fn restore(&self) -> std::result::Result<Vec<NodeHandle>, SnapshotError> {
        let handles = self
            .nodes
            .iter()
            .map(|node| {
                registry()
                    .find(&node.operation)
                    .map(|descriptor| FormulaNode::for_operation(descriptor.operation).into_handle())
                    .ok_or_else(|| SnapshotError::UnknownOperation(node.operation.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (node, handle) in self.nodes.iter().zip(&handles) {
            let mut bindings = Vec::with_capacity(node.params.len());
            for (name, binding) in &node.params {
                let binding = match binding {
                    BindingSnapshot::Unset => Binding::Unset,
                    BindingSnapshot::Value(value) => Binding::Value(value.clone()),
                    BindingSnapshot::Node(index) => {
                        let upstream =
                            handles
                                .get(*index)
                                .ok_or_else(|| SnapshotError::InvalidNodeIndex {
                                    param: name.clone(),
                                    index: *index,
                                    count: handles.len(),
                                })?;
                        Binding::node(upstream)
                    }
                };
                bindings.push((name.clone(), binding));
            }
            handle.borrow_mut().update_params(bindings);
        }
        debug!(nodes = handles.len(), "restored graph snapshot");
        Ok(handles)
    }

    /// Opaque byte form, suitable for a preset's state blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a blob written by `to_bytes`. Literal melodies get the same
    /// duration checks as `Melody::from_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut snapshot: GraphSnapshot = bincode::deserialize(bytes)?;
        for node in &mut snapshot.nodes {
            for binding in node.params.values_mut() {
                if let BindingSnapshot::Value(ParamValue::Melody(melody)) = binding {
                    *melody = std::mem::take(melody).validated()?;
                }
            }
        }
        Ok(snapshot)
    }
}
