//! Voltage and current sources.

use super::linear::pins;
use crate::circuit::NodeId;
use crate::error::Result;
use crate::expr::Expr;
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};

/// An external signal driving a source, scaled by `gain`.
#[derive(Debug, Clone)]
pub struct InputDrive {
    /// Name of the simulation input.
    pub input: String,
    pub gain: Expr,
}

/// A voltage source.
///
/// Voltage sources add the branch current `i[name]` as an unknown and
/// enforce `V+ - V- = voltage (+ gain * input)`.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    /// Fixed part; may depend on time and parameters.
    pub voltage: Expr,
    pub drive: Option<InputDrive>,
}

impl VoltageSource {
    pub fn new(name: String, nodes: [NodeId; 2], voltage: Expr) -> Self {
        Self {
            name,
            nodes,
            voltage,
            drive: None,
        }
    }

    /// A source whose voltage follows the input `input` times `gain`, on top
    /// of `voltage`.
    pub fn driven(name: String, nodes: [NodeId; 2], voltage: Expr, input: &str, gain: Expr) -> Self {
        Self {
            name,
            nodes,
            voltage,
            drive: Some(InputDrive {
                input: input.to_string(),
                gain,
            }),
        }
    }

    /// Whether this source is driven by an external input.
    pub fn is_input(&self) -> bool {
        self.drive.is_some()
    }
}

impl Analyze for VoltageSource {
    fn terminals(&self) -> Vec<Terminal> {
        pins(&self.name, self.nodes).to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [p, n] = pins(&self.name, self.nodes);
        let i = Expr::symbol(mna.add_unknown(&format!("i[{}]", self.name))?);
        mna.set_i(&p, i.clone())?;
        mna.set_i(&n, -i)?;

        let mut value = self.voltage.clone();
        if let Some(drive) = &self.drive {
            let input = mna.add_input(&drive.input)?;
            value = value + drive.gain.clone() * input;
        }
        let v = mna.voltage(&p) - mna.voltage(&n);
        mna.add_equation(v, value);
        Ok(())
    }
}

/// A current source; current flows from `+` through the source to `-`.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub current: Expr,
}

impl CurrentSource {
    pub fn new(name: String, nodes: [NodeId; 2], current: Expr) -> Self {
        Self {
            name,
            nodes,
            current,
        }
    }
}

impl Analyze for CurrentSource {
    fn terminals(&self) -> Vec<Terminal> {
        pins(&self.name, self.nodes).to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [p, n] = pins(&self.name, self.nodes);
        mna.set_i(&p, self.current.clone())?;
        mna.set_i(&n, -self.current.clone())
    }
}
