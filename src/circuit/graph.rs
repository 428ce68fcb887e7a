//! Circuit graph structure.

use std::collections::{HashMap, HashSet};

use log::debug;

use super::types::NodeId;
use crate::components::{Component, VoltageSource};
use crate::dsl::{self, CircuitAst, ParamDef};
use crate::error::{Result, TubesimError};
use crate::expr::Expr;
use crate::solver::{CircuitEquations, ModifiedNodalAnalysis};

/// Input name used when `.input` does not give one.
pub const DEFAULT_INPUT_NAME: &str = "Vin";

/// Name of the source added when `.input` marks a node that no `AC` source
/// drives.
const IMPLICIT_INPUT_SOURCE: &str = "V_input";

/// A complete circuit ready for analysis.
#[derive(Debug)]
pub struct Circuit {
    /// All components in the circuit
    pub components: Vec<Component>,

    /// Mapping from node names to node IDs
    pub node_map: HashMap<String, NodeId>,

    /// Reverse mapping from node IDs to names
    pub node_names: Vec<String>,

    /// Declared runtime parameters
    pub parameters: Vec<ParamDef>,

    /// Input node ID (where the audio signal is injected)
    pub input_node: Option<NodeId>,

    /// Name of the simulation input that drives the circuit
    pub input_name: String,

    /// Output node ID (where the audio signal is read)
    pub output_node: NodeId,

    /// Index of the first input-driven voltage source
    pub input_source_idx: Option<usize>,
}

impl Circuit {
    /// Parse, build and validate a circuit from DSL text.
    pub fn from_dsl(text: &str) -> Result<Self> {
        let circuit = Self::from_ast(dsl::parse(text)?)?;
        super::validate_circuit(&circuit)?;
        Ok(circuit)
    }

    /// Build a circuit from a parsed AST.
    pub fn from_ast(ast: CircuitAst) -> Result<Self> {
        let mut node_map = HashMap::new();
        let mut node_names = Vec::new();

        // Ground is always node 0
        node_map.insert("0".to_string(), NodeId::GROUND);
        node_map.insert("GND".to_string(), NodeId::GROUND);
        node_names.push("0".to_string());

        for node_name in &ast.nodes {
            if !node_map.contains_key(node_name) {
                node_map.insert(node_name.clone(), NodeId(node_names.len()));
                node_names.push(node_name.clone());
            }
        }

        let lookup = |name: &str| {
            node_map
                .get(name)
                .copied()
                .ok_or_else(|| TubesimError::NodeNotFound {
                    node: name.to_string(),
                })
        };

        let output_node = lookup(ast.output_node.as_deref().ok_or(TubesimError::MissingOutput)?)?;
        let input_node = ast.input_node.as_deref().map(lookup).transpose()?;
        let input_name = ast
            .input_name
            .clone()
            .unwrap_or_else(|| DEFAULT_INPUT_NAME.to_string());

        let mut components = Vec::with_capacity(ast.components.len() + 1);
        let mut names = HashSet::new();
        let mut input_source_idx = None;

        for comp_def in &ast.components {
            if !names.insert(comp_def.name.clone()) {
                return Err(TubesimError::DuplicateComponent {
                    name: comp_def.name.clone(),
                });
            }

            let nodes = comp_def
                .nodes
                .iter()
                .map(|name| lookup(name))
                .collect::<Result<Vec<_>>>()?;

            let model = match &comp_def.model_ref {
                Some(model_name) => Some(ast.models.get(model_name).ok_or_else(|| {
                    TubesimError::UndefinedModel {
                        model: model_name.clone(),
                        component: comp_def.name.clone(),
                    }
                })?),
                None => None,
            };

            let component = Component::from_def(comp_def, &nodes, model, &input_name)?;

            if let Component::VoltageSource(ref vs) = component {
                if vs.is_input() && input_source_idx.is_none() {
                    input_source_idx = Some(components.len());
                }
            }

            components.push(component);
        }

        // `.input <node>` without a driving source: drive the node directly
        if let (Some(node), None) = (input_node, input_source_idx) {
            if !names.insert(IMPLICIT_INPUT_SOURCE.to_string()) {
                return Err(TubesimError::DuplicateComponent {
                    name: IMPLICIT_INPUT_SOURCE.to_string(),
                });
            }
            debug!("driving input node {} with implicit source", node_names[node.0]);
            input_source_idx = Some(components.len());
            components.push(Component::VoltageSource(VoltageSource::driven(
                IMPLICIT_INPUT_SOURCE.to_string(),
                [node, NodeId::GROUND],
                Expr::ZERO,
                &input_name,
                Expr::ONE,
            )));
        }

        Ok(Circuit {
            components,
            node_map,
            node_names,
            parameters: ast.params,
            input_node,
            input_name,
            output_node,
            input_source_idx,
        })
    }

    /// Assemble the circuit's continuous-time equations.
    pub fn analyze(&self) -> Result<CircuitEquations> {
        let mut mna = ModifiedNodalAnalysis::new(self.node_names.clone());
        for param in &self.parameters {
            mna.add_parameter(&param.name, param.default)?;
        }
        for component in &self.components {
            mna.add_element(component)?;
        }
        let equations = mna.finish()?;
        debug!(
            "analyzed {} components: {} unknowns, {} equations{}",
            self.components.len(),
            equations.unknowns.len(),
            equations.equations.len(),
            if self.is_nonlinear() { " (nonlinear)" } else { "" }
        );
        Ok(equations)
    }

    /// Name of the simulation input, if any source is input-driven.
    pub fn input_name(&self) -> Option<&str> {
        self.input_source_idx.map(|_| self.input_name.as_str())
    }

    /// Name of the unknown observed at the output node.
    pub fn output_unknown(&self) -> String {
        format!("V[{}]", self.node_name(self.output_node))
    }

    /// Whether any component needs Newton iteration.
    pub fn is_nonlinear(&self) -> bool {
        self.components.iter().any(Component::is_nonlinear)
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.node_names[node.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_input_source() {
        let circuit = Circuit::from_dsl(".input in\n.output out\nR1 in out 1k\nC1 out 0 1u").unwrap();
        assert_eq!(circuit.components.len(), 3);
        assert_eq!(circuit.input_name(), Some("Vin"));
        assert_eq!(circuit.output_unknown(), "V[out]");
        let idx = circuit.input_source_idx.unwrap();
        assert_eq!(circuit.components[idx].name(), "V_input");
    }

    #[test]
    fn test_explicit_ac_source_is_the_input() {
        let circuit =
            Circuit::from_dsl(".input in guitar\n.output out\nVS in 0 AC 1\nR1 in out 1k\nR2 out 0 1k").unwrap();
        assert_eq!(circuit.components.len(), 3);
        assert_eq!(circuit.input_source_idx, Some(0));
        assert_eq!(circuit.input_name(), Some("guitar"));
    }

    #[test]
    fn test_no_input() {
        let circuit = Circuit::from_dsl(".output out\nV1 out 0 DC 5\nR1 out 0 1k").unwrap();
        assert_eq!(circuit.input_name(), None);
        assert!(circuit.input_node.is_none());
    }

    #[test]
    fn test_analyze_counts() {
        let circuit = Circuit::from_dsl(".input in\n.output out\n.param r 1000\nR1 in out {r}\nR2 out 0 1k").unwrap();
        let equations = circuit.analyze().unwrap();
        // V[in], V[out], i[V_input]
        assert_eq!(equations.unknowns.len(), 3);
        assert_eq!(equations.equations.len(), 3);
        assert_eq!(equations.parameters.len(), 1);
        assert_eq!(equations.inputs.len(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Circuit::from_dsl("R1 a 0 1k"),
            Err(TubesimError::MissingOutput)
        ));
        assert!(matches!(
            Circuit::from_dsl(".output a\nR1 a 0 1k\nR1 a 0 2k"),
            Err(TubesimError::DuplicateComponent { .. })
        ));
        assert!(matches!(
            Circuit::from_dsl(".output a\nR1 a 0 1k\nD1 a 0 DX"),
            Err(TubesimError::UndefinedModel { .. })
        ));
        assert!(matches!(
            Circuit::from_dsl(".output b\nR1 a 0 1k"),
            Err(TubesimError::NodeNotFound { .. })
        ));
    }
}
