//! Operational Amplifier model.
//!
//! A finite-gain voltage-controlled voltage source behind an output
//! resistance, with a resistance between the inputs:
//!
//! ```text
//! I_out = (V_out - A * (V+ - V-)) / R_out
//! I_in  = (V+ - V-) / R_in
//! ```

use crate::circuit::NodeId;
use crate::dsl::ModelDef;
use crate::error::Result;
use crate::expr::Expr;
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};

/// Parameters for an op-amp model.
#[derive(Debug, Clone, PartialEq)]
pub struct OpAmpParams {
    /// Open-loop DC gain (A_OL)
    pub gain: f64,
    /// Output resistance (R_out)
    pub r_out: f64,
    /// Input resistance (R_in)
    pub r_in: f64,
}

impl Default for OpAmpParams {
    fn default() -> Self {
        Self::ideal()
    }
}

impl OpAmpParams {
    /// Create parameters for an ideal op-amp.
    pub fn ideal() -> Self {
        Self {
            gain: 1e9, // Very high but finite for numerical stability
            r_out: 0.1,
            r_in: 1e12,
        }
    }

    /// Create parameters for a typical 741-style op-amp.
    pub fn ua741() -> Self {
        Self {
            gain: 2e5,
            r_out: 75.0,
            r_in: 2e6,
        }
    }

    /// Create parameters for a TL072-style JFET op-amp.
    pub fn tl072() -> Self {
        Self {
            gain: 2e5,
            r_out: 100.0,
            r_in: 1e12,
        }
    }

    /// Create parameters from a model definition. A `preset` of `741` or
    /// `72` starts from the matching part instead of the ideal one.
    pub fn from_model(model: &ModelDef) -> Self {
        let mut params = match model.params.get("preset").map(|p| *p as i64) {
            Some(741) => Self::ua741(),
            Some(72) => Self::tl072(),
            _ => Self::ideal(),
        };

        if let Some(&gain) = model.params.get("gain") {
            params.gain = gain;
        }
        if let Some(&a) = model.params.get("a") {
            params.gain = a;
        }
        if let Some(&ro) = model.params.get("rout") {
            params.r_out = ro;
        }
        if let Some(&ri) = model.params.get("rin") {
            params.r_in = ri;
        }

        params
    }
}

/// An operational amplifier component.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pub name: String,
    pub nodes: [NodeId; 3], // [output, non-inverting (+), inverting (-)]
    pub params: OpAmpParams,
}

impl OpAmp {
    pub fn new(name: String, nodes: [NodeId; 3], params: OpAmpParams) -> Self {
        Self {
            name,
            nodes,
            params,
        }
    }

    fn pins(&self) -> [Terminal; 3] {
        [
            Terminal::new(&self.name, "out", self.nodes[0]),
            Terminal::new(&self.name, "in+", self.nodes[1]),
            Terminal::new(&self.name, "in-", self.nodes[2]),
        ]
    }
}

impl Analyze for OpAmp {
    fn terminals(&self) -> Vec<Terminal> {
        self.pins().to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [out, pos, neg] = self.pins();
        let v_diff = mna.voltage(&pos) - mna.voltage(&neg);
        let i_out = (mna.voltage(&out) - self.params.gain * v_diff.clone()) / self.params.r_out;
        let i_in: Expr = v_diff / self.params.r_in;
        mna.set_i(&out, i_out)?;
        mna.set_i(&pos, i_in.clone())?;
        mna.set_i(&neg, -i_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Symbol;
    use approx::assert_relative_eq;

    #[test]
    fn test_open_circuit_output_follows_gain() {
        let mut mna = ModifiedNodalAnalysis::new(vec![
            "0".into(),
            "out".into(),
            "p".into(),
            "n".into(),
        ]);
        let op = OpAmp::new("OP1".into(), [NodeId(1), NodeId(2), NodeId(3)], OpAmpParams::ua741());
        mna.add_element(&op).unwrap();
        // With nothing loading the output, I_out = 0 gives V_out = A (V+ - V-).
        let i = mna.node_current(NodeId(1));
        let at = |s: &Symbol| match s.name() {
            "V[out]" => Some(2e5 * 1e-5),
            "V[p]" => Some(1e-5),
            "V[n]" => Some(0.0),
            _ => None,
        };
        assert_relative_eq!(i.evaluate(&at).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_model_preset_then_overrides() {
        let model = ModelDef {
            name: "U741".into(),
            model_type: crate::dsl::ModelType::OpAmp,
            params: [("preset".to_string(), 741.0), ("rout".to_string(), 50.0)]
                .into_iter()
                .collect(),
            line: 1,
        };
        let params = OpAmpParams::from_model(&model);
        assert_eq!(params.gain, OpAmpParams::ua741().gain);
        assert_eq!(params.r_in, OpAmpParams::ua741().r_in);
        assert_eq!(params.r_out, 50.0);
    }
}
