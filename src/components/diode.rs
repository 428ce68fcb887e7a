//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! Above the critical voltage the exponential is continued by its tangent
//!   I = I(Vc) + G(Vc) * (V - Vc)
//! which keeps Newton's method from overflowing on large forward steps.

use super::linear::pins;
use crate::circuit::NodeId;
use crate::dsl::ModelDef;
use crate::error::Result;
use crate::expr::{Comparison, Expr};
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};
use crate::THERMAL_VOLTAGE;

/// Parameters for a diode model.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
    /// Voltage above which the exponential is linearly extended
    pub v_crit: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            v_crit: 0.7,
        }
    }
}

impl DiodeParams {
    /// Create parameters from a model definition.
    pub fn from_model(model: &ModelDef) -> Self {
        let mut params = Self::default();
        if let Some(&is) = model.params.get("is") {
            params.is = is;
        }
        if let Some(&n) = model.params.get("n") {
            params.n = n;
        }
        if let Some(&vf) = model.params.get("vf") {
            params.v_crit = vf;
        }
        params
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Current through the junction at voltage `v`.
    pub fn current(&self, v: Expr) -> Expr {
        junction_current(v, self.is, self.n_vt(), self.v_crit)
    }
}

/// Shockley current of a pn junction with the tangent extension above
/// `v_crit`.
pub(crate) fn junction_current(v: Expr, is: f64, n_vt: f64, v_crit: f64) -> Expr {
    let e_crit = (v_crit / n_vt).exp();
    let i_crit = is * (e_crit - 1.0);
    let g_crit = is / n_vt * e_crit;
    let shockley = is * (Expr::exp(v.clone() / n_vt) - 1.0);
    let extension = i_crit + g_crit * (v.clone() - v_crit);
    Expr::select(
        Expr::compare(Comparison::Gt, v, Expr::constant(v_crit)),
        extension,
        shockley,
    )
}

/// A diode component.
#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub params: DiodeParams,
}

impl Diode {
    pub fn new(name: String, nodes: [NodeId; 2], params: DiodeParams) -> Self {
        Self {
            name,
            nodes,
            params,
        }
    }
}

impl Analyze for Diode {
    fn terminals(&self) -> Vec<Terminal> {
        pins(&self.name, self.nodes).to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [anode, cathode] = pins(&self.name, self.nodes);
        let v = mna.voltage(&anode) - mna.voltage(&cathode);
        let i = self.params.current(v);
        mna.set_i(&anode, i.clone())?;
        mna.set_i(&cathode, -i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Symbol;
    use approx::assert_relative_eq;

    fn current_at(params: &DiodeParams, v: f64) -> f64 {
        let i = params.current(Expr::variable("v"));
        i.evaluate(&|_: &Symbol| Some(v)).unwrap()
    }

    #[test]
    fn test_diode_forward_bias() {
        let params = DiodeParams::default();

        // At 0V, current should be approximately 0
        assert!(current_at(&params, 0.0).abs() < 1e-10);

        // At forward bias, current should increase exponentially
        let i_small = current_at(&params, 0.3);
        let i_large = current_at(&params, 0.6);
        assert!(i_large > i_small * 100.0);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let params = DiodeParams::default();

        // In reverse bias, current should approach -Is
        let i_rev = current_at(&params, -1.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * params.is);
    }

    #[test]
    fn test_extension_is_continuous() {
        let params = DiodeParams {
            is: 1e-9,
            n: 1.5,
            v_crit: 0.5,
        };
        let below = current_at(&params, params.v_crit);
        let above = current_at(&params, params.v_crit + 1e-9);
        assert_relative_eq!(below, above, max_relative = 1e-6);
        // Linear, not exponential, past the knee.
        let far = current_at(&params, params.v_crit + 1.0);
        let slope = params.is / params.n_vt() * (params.v_crit / params.n_vt()).exp();
        assert_relative_eq!(far, below + slope, max_relative = 1e-9);
    }

    #[test]
    fn test_diode_is_nonlinear() {
        let mut mna = ModifiedNodalAnalysis::new(vec!["0".into(), "a".into()]);
        let d = Diode::new("D1".into(), [NodeId(1), NodeId::GROUND], DiodeParams::default());
        mna.add_element(&d).unwrap();
        let i = mna.node_current(NodeId(1));
        let v = Symbol::new("V[a]");
        assert!(i.diff(&v).contains(&v));
    }
}
