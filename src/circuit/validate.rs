//! Circuit validation.

use crate::error::{Result, TubesimError};

use super::Circuit;

/// Validate a circuit for simulation.
///
/// Checks:
/// - Input and output nodes are not ground
/// - The circuit has components
/// - Some component is connected to ground
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.input_node.is_some_and(|n| n.is_ground()) {
        return Err(TubesimError::InvalidTopology {
            message: "Input node cannot be ground".to_string(),
        });
    }

    if circuit.output_node.is_ground() {
        return Err(TubesimError::InvalidTopology {
            message: "Output node cannot be ground".to_string(),
        });
    }

    if circuit.components.is_empty() {
        return Err(TubesimError::InvalidTopology {
            message: "Circuit has no components".to_string(),
        });
    }

    if !circuit
        .components
        .iter()
        .any(|c| c.nodes().iter().any(|n| n.is_ground()))
    {
        return Err(TubesimError::MissingGround);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::circuit::Circuit;
    use crate::dsl::parse;
    use crate::error::TubesimError;

    use super::validate_circuit;

    fn build(text: &str) -> Circuit {
        Circuit::from_ast(parse(text).unwrap()).unwrap()
    }

    #[test]
    fn test_valid_circuit() {
        assert!(validate_circuit(&build(".input in\n.output out\nR1 in out 1k\nC1 out 0 1u")).is_ok());
    }

    #[test]
    fn test_missing_ground() {
        let circuit = build(".output b\nR1 a b 1k\nR2 b a 1k");
        assert!(matches!(validate_circuit(&circuit), Err(TubesimError::MissingGround)));
    }

    #[test]
    fn test_ground_output() {
        let circuit = build(".output 0\nR1 a 0 1k");
        assert!(matches!(
            validate_circuit(&circuit),
            Err(TubesimError::InvalidTopology { .. })
        ));
    }
}
