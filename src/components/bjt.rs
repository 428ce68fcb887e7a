//! BJT (Bipolar Junction Transistor) model.
//!
//! Uses a simplified Ebers-Moll model for NPN and PNP transistors.
//! The BJT is modeled as two diodes with a current-controlled current source.

use super::diode::junction_current;
use crate::circuit::NodeId;
use crate::dsl::{ModelDef, ModelType};
use crate::error::{Result, TubesimError};
use crate::expr::Expr;
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};
use crate::THERMAL_VOLTAGE;

/// Junction voltage above which diode currents are linearly extended.
const V_CRIT: f64 = 0.8;

/// BJT type (NPN or PNP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtType {
    Npn,
    Pnp,
}

impl BjtType {
    fn sign(self) -> f64 {
        match self {
            BjtType::Npn => 1.0,
            BjtType::Pnp => -1.0,
        }
    }
}

/// Parameters for a BJT model.
#[derive(Debug, Clone, PartialEq)]
pub struct BjtParams {
    /// Forward current gain (β_F)
    pub beta_f: f64,
    /// Reverse current gain (β_R)
    pub beta_r: f64,
    /// Base-emitter saturation current
    pub is_be: f64,
    /// Base-collector saturation current
    pub is_bc: f64,
    /// Ideality factor
    pub n: f64,
    /// Early voltage (for output resistance), 0 = infinite
    pub va: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            beta_f: 100.0,
            beta_r: 1.0,
            is_be: 1e-14,
            is_bc: 1e-14,
            n: 1.0,
            va: 100.0,
        }
    }
}

impl BjtParams {
    /// Create parameters from a model definition.
    pub fn from_model(model: &ModelDef) -> Result<(BjtType, Self)> {
        let bjt_type = match model.model_type {
            ModelType::BjtNpn => BjtType::Npn,
            ModelType::BjtPnp => BjtType::Pnp,
            _ => {
                return Err(TubesimError::invalid_component(
                    &model.name,
                    model.line,
                    "expected NPN or PNP model type",
                ));
            }
        };

        let mut params = Self::default();

        if let Some(&bf) = model.params.get("bf") {
            params.beta_f = bf;
        }
        if let Some(&br) = model.params.get("br") {
            params.beta_r = br;
        }
        if let Some(&is) = model.params.get("is") {
            params.is_be = is;
            params.is_bc = is;
        }
        if let Some(&n) = model.params.get("n") {
            params.n = n;
        }
        if let Some(&va) = model.params.get("va") {
            params.va = va;
        }

        Ok((bjt_type, params))
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }
}

/// A BJT component.
#[derive(Debug, Clone)]
pub struct Bjt {
    pub name: String,
    pub nodes: [NodeId; 3], // [collector, base, emitter]
    pub bjt_type: BjtType,
    pub params: BjtParams,
}

impl Bjt {
    pub fn new(name: String, nodes: [NodeId; 3], bjt_type: BjtType, params: BjtParams) -> Self {
        Self {
            name,
            nodes,
            bjt_type,
            params,
        }
    }

    fn pins(&self) -> [Terminal; 3] {
        [
            Terminal::new(&self.name, "c", self.nodes[0]),
            Terminal::new(&self.name, "b", self.nodes[1]),
            Terminal::new(&self.name, "e", self.nodes[2]),
        ]
    }

    /// Collector and base currents for the given junction voltages.
    pub fn currents(&self, v_be: Expr, v_bc: Expr) -> (Expr, Expr) {
        let p = &self.params;
        let sign = self.bjt_type.sign();
        let n_vt = p.n_vt();

        let i_f = junction_current(sign * v_be.clone(), p.is_be, n_vt, V_CRIT);
        let i_r = junction_current(sign * v_bc.clone(), p.is_bc, n_vt, V_CRIT);

        let mut transport = p.beta_f / (p.beta_f + 1.0) * i_f.clone();
        if p.va > 0.0 {
            // Early effect on the forward transport current.
            let v_ce = sign * (v_be - v_bc);
            transport = transport * (1.0 + v_ce / p.va);
        }
        let i_c = sign * (transport - (p.beta_r + 1.0) / p.beta_r * i_r.clone());
        let i_b = sign * (i_f / (p.beta_f + 1.0) + i_r / (p.beta_r + 1.0));
        (i_c, i_b)
    }
}

impl Analyze for Bjt {
    fn terminals(&self) -> Vec<Terminal> {
        self.pins().to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [c, b, e] = self.pins();
        let (vc, vb, ve) = (mna.voltage(&c), mna.voltage(&b), mna.voltage(&e));
        let (i_c, i_b) = self.currents(&vb - &ve, &vb - &vc);
        let i_e = -(&i_c + &i_b);
        mna.set_i(&c, i_c)?;
        mna.set_i(&b, i_b)?;
        mna.set_i(&e, i_e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Symbol;

    fn eval(e: &Expr, v_be: f64, v_bc: f64) -> f64 {
        e.evaluate(&|s: &Symbol| match s.name() {
            "vbe" => Some(v_be),
            "vbc" => Some(v_bc),
            _ => None,
        })
        .unwrap()
    }

    fn currents(bjt_type: BjtType) -> (Expr, Expr) {
        let q = Bjt::new(
            "Q1".into(),
            [NodeId(1), NodeId(2), NodeId::GROUND],
            bjt_type,
            BjtParams {
                va: 0.0,
                ..BjtParams::default()
            },
        );
        q.currents(Expr::variable("vbe"), Expr::variable("vbc"))
    }

    #[test]
    fn test_forward_active_gain() {
        let (i_c, i_b) = currents(BjtType::Npn);
        // Forward active: Vbe = 0.6, Vbc = -5.
        let ic = eval(&i_c, 0.6, -5.0);
        let ib = eval(&i_b, 0.6, -5.0);
        assert!(ic > 0.0);
        assert!((ic / ib - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_pnp_mirrors_npn() {
        let (npn_c, npn_b) = currents(BjtType::Npn);
        let (pnp_c, pnp_b) = currents(BjtType::Pnp);
        assert!((eval(&npn_c, 0.6, -5.0) + eval(&pnp_c, -0.6, 5.0)).abs() < 1e-15);
        assert!((eval(&npn_b, 0.6, -5.0) + eval(&pnp_b, -0.6, 5.0)).abs() < 1e-15);
    }

    #[test]
    fn test_terminal_currents_balance() {
        let mut mna = ModifiedNodalAnalysis::new(vec!["0".into(), "c".into(), "b".into()]);
        let q = Bjt::new(
            "Q1".into(),
            [NodeId(1), NodeId(2), NodeId::GROUND],
            BjtType::Npn,
            BjtParams::default(),
        );
        mna.add_element(&q).unwrap();
        let total = mna.node_current(NodeId(1))
            + mna.node_current(NodeId(2))
            + mna.node_current(NodeId::GROUND);
        let at = |s: &Symbol| match s.name() {
            "V[c]" => Some(5.0),
            "V[b]" => Some(0.65),
            _ => None,
        };
        assert!(total.evaluate(&at).unwrap().abs() < 1e-12);
    }
}
