// Formula graph nodes: lazy, memoizing evaluation of melody operations.
//
// A `FormulaNode` wraps one registered operation plus a binding for each of
// its parameters. A binding is either unset, a literal value, or a
// reference to another node whose result feeds the parameter. Evaluating a
// node first evaluates the nodes it references, then invokes the operation
// and caches the result until `update_params` or `clear_value` discards it.
//
// Nodes are shared as `NodeHandle` (`Rc<RefCell<_>>`); bindings hold a
// `Weak` so the owner of the graph decides node lifetimes. An input whose
// node has been dropped reports `DanglingInput`. A node reached again while
// it is already being evaluated reports `Cycle`.
//
// Clearing a node's cache does not touch nodes downstream of it. Whoever
// owns the graph walks the dependents and clears them too.
//
// Hooks let a UI react to evaluation. They run while the node is borrowed,
// so a hook must not reach back into its own node's handle.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::error::FormulaError;
use crate::melody::Melody;
use crate::registry::{EvalContext, Operation, OperationDescriptor, ParamValue, registry};

pub type NodeHandle = Rc<RefCell<FormulaNode>>;

/// What feeds one parameter of a node.
#[derive(Clone, Default)]
pub enum Binding {
    #[default]
    Unset,
    Value(ParamValue),
    Node(Weak<RefCell<FormulaNode>>),
}

impl Binding {
    pub fn node(handle: &NodeHandle) -> Self {
        Binding::Node(Rc::downgrade(handle))
    }
}

impl From<ParamValue> for Binding {
    fn from(value: ParamValue) -> Self {
        Binding::Value(value)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Unset => f.write_str("Unset"),
            Binding::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Binding::Node(weak) => match weak.upgrade() {
                Some(node) => match node.try_borrow() {
                    Ok(node) => write!(f, "Node({})", node.descriptor.name),
                    Err(_) => f.write_str("Node(<busy>)"),
                },
                None => f.write_str("Node(<dropped>)"),
            },
        }
    }
}

/// Callbacks fired by evaluation and cache invalidation.
#[derive(Default)]
pub struct NodeHooks {
    pub on_success: Option<Box<dyn FnMut(&Melody)>>,
    pub on_error: Option<Box<dyn FnMut(&FormulaError)>>,
    pub on_clear: Option<Box<dyn FnMut()>>,
}

pub struct FormulaNode {
    descriptor: &'static OperationDescriptor,
    params: BTreeMap<String, Binding>,
    value: Option<Melody>,
    hooks: NodeHooks,
}

impl FormulaNode {
    /// A node for a registered operation with every parameter unset.
    ///
    /// # Panics
    ///
    /// Panics if `operation_name` is not registered.
    pub fn new(operation_name: &str) -> Self {
        Self::for_descriptor(registry().get(operation_name))
    }

    pub fn for_operation(operation: Operation) -> Self {
        Self::for_descriptor(registry().descriptor(operation))
    }

    fn for_descriptor(descriptor: &'static OperationDescriptor) -> Self {
        let params = descriptor
            .params
            .iter()
            .map(|p| (p.name.to_string(), Binding::Unset))
            .collect();
        FormulaNode {
            descriptor,
            params,
            value: None,
            hooks: NodeHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: NodeHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn set_hooks(&mut self, hooks: NodeHooks) {
        self.hooks = hooks;
    }

    pub fn into_handle(self) -> NodeHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn descriptor(&self) -> &'static OperationDescriptor {
        self.descriptor
    }

    pub fn params(&self) -> &BTreeMap<String, Binding> {
        &self.params
    }

    /// The cached result, if the node has been evaluated since the last
    /// invalidation.
    pub fn value(&self) -> Option<&Melody> {
        self.value.as_ref()
    }

    pub fn is_computed(&self) -> bool {
        self.value.is_some()
    }

    /// Merge new bindings over the current ones and drop the cached value.
    /// Names the operation does not know are kept and rejected at
    /// evaluation time.
    pub fn update_params<I, K>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, Binding)>,
        K: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(name, binding)| (name.into(), binding)));
        self.clear_value();
    }

    /// Drop the cached value and fire `on_clear`. Safe to call repeatedly.
    pub fn clear_value(&mut self) {
        self.value = None;
        if let Some(on_clear) = self.hooks.on_clear.as_mut() {
            on_clear();
        }
    }

    /// Return the cached value, or compute it. Inputs bound to other nodes
    /// are evaluated first. A failure is reported through `on_error` and
    /// leaves the node uncomputed.
    pub fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<Melody, FormulaError> {
        if let Some(value) = &self.value {
            debug!(operation = self.descriptor.name, "formula cache hit");
            return Ok(value.clone());
        }

        match self.compute(ctx) {
            Ok(melody) => {
                debug!(
                    operation = self.descriptor.name,
                    notes = melody.length(),
                    "formula evaluated"
                );
                if let Some(on_success) = self.hooks.on_success.as_mut() {
                    on_success(&melody);
                }
                self.value = Some(melody.clone());
                Ok(melody)
            }
            Err(err) => {
                warn!(operation = self.descriptor.name, error = %err, "formula failed");
                if let Some(on_error) = self.hooks.on_error.as_mut() {
                    on_error(&err);
                }
                Err(err)
            }
        }
    }

    fn compute(&self, ctx: &mut EvalContext<'_>) -> Result<Melody, FormulaError> {
        let mut args = Vec::with_capacity(self.params.len());
        for (name, binding) in &self.params {
            match binding {
                Binding::Unset => {}
                Binding::Value(value) => args.push((name.clone(), value.clone())),
                Binding::Node(weak) => {
                    let upstream = weak
                        .upgrade()
                        .ok_or_else(|| FormulaError::DanglingInput { param: name.clone() })?;
                    let melody = evaluate_input(&upstream, self.descriptor.name, ctx).map_err(
                        |source| FormulaError::Upstream {
                            param: name.clone(),
                            source: Box::new(source),
                        },
                    )?;
                    args.push((name.clone(), ParamValue::Melody(melody)));
                }
            }
        }

        self.descriptor
            .invoke(args, ctx)
            .map_err(|source| FormulaError::Operation {
                operation: self.descriptor.name,
                source,
            })
    }
}

impl fmt::Debug for FormulaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaNode")
            .field("operation", &self.descriptor.name)
            .field("params", &self.params)
            .field("computed", &self.value.is_some())
            .finish()
    }
}

/// Evaluate a shared node.
pub fn evaluate(handle: &NodeHandle, ctx: &mut EvalContext<'_>) -> Result<Melody, FormulaError> {
    match handle.try_borrow_mut() {
        Ok(mut node) => node.evaluate(ctx),
        Err(_) => Err(FormulaError::Cycle {
            operation: "<root>",
        }),
    }
}

fn evaluate_input(
    upstream: &NodeHandle,
    requester: &'static str,
    ctx: &mut EvalContext<'_>,
) -> Result<Melody, FormulaError> {
    match upstream.try_borrow_mut() {
        Ok(mut node) => node.evaluate(ctx),
        // Already borrowed: the node is on the current evaluation path.
        Err(_) => Err(FormulaError::Cycle {
            operation: requester,
        }),
    }
}
