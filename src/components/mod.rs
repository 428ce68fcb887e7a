//! Component models for circuit simulation.
//!
//! This module provides models for all supported circuit components:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source (fixed, time-varying or input-driven), Current Source
//! - Nonlinear: Diode, BJT
//! - Active: Op-Amp
//! - Controls: Potentiometer
//! - Magnetics: Ideal Transformer
//!
//! Each component implements [`Analyze`]: it states its terminal currents
//! and branch equations symbolically. Component values are expressions, so a
//! value may refer to circuit parameters or to time.

mod bjt;
mod controls;
mod diode;
mod linear;
mod opamp;
mod sources;
mod transformer;

pub use bjt::{Bjt, BjtParams, BjtType};
pub use controls::Potentiometer;
pub use diode::{Diode, DiodeParams};
pub use linear::{Capacitor, Inductor, Resistor};
pub use opamp::{OpAmp, OpAmpParams};
pub use sources::{CurrentSource, InputDrive, VoltageSource};
pub use transformer::Transformer;

use crate::circuit::NodeId;
use crate::dsl::{ComponentDef, ComponentType, ModelDef, ModelType};
use crate::error::{Result, TubesimError};
use crate::expr::Expr;
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};

/// A circuit component.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    Bjt(Bjt),
    OpAmp(OpAmp),
    Potentiometer(Potentiometer),
    Transformer(Transformer),
}

impl Component {
    /// Create a component from a DSL definition.
    ///
    /// `nodes` are the resolved node ids of `def.nodes`. AC voltage sources
    /// are driven by the simulation input named `input`.
    pub fn from_def(
        def: &ComponentDef,
        nodes: &[NodeId],
        model: Option<&ModelDef>,
        input: &str,
    ) -> Result<Self> {
        let name = def.name.clone();
        let required = |what: &str| {
            def.value.clone().ok_or_else(|| {
                TubesimError::invalid_component(&def.name, def.line, format!("{} requires a value", what))
            })
        };
        let component = match def.component_type {
            ComponentType::Resistor => {
                Component::Resistor(Resistor::new(name, pair(nodes), required("resistor")?))
            }

            ComponentType::Capacitor => {
                Component::Capacitor(Capacitor::new(name, pair(nodes), required("capacitor")?))
            }

            ComponentType::Inductor => {
                Component::Inductor(Inductor::new(name, pair(nodes), required("inductor")?))
            }

            ComponentType::VoltageSource => {
                let dc = def
                    .params
                    .get("dc")
                    .or(def.value.as_ref())
                    .cloned()
                    .unwrap_or(Expr::ZERO);
                match def.params.get("ac") {
                    Some(gain) => Component::VoltageSource(VoltageSource::driven(
                        name,
                        pair(nodes),
                        dc,
                        input,
                        gain.clone(),
                    )),
                    None => Component::VoltageSource(VoltageSource::new(name, pair(nodes), dc)),
                }
            }

            ComponentType::CurrentSource => {
                let value = def.value.clone().unwrap_or(Expr::ZERO);
                Component::CurrentSource(CurrentSource::new(name, pair(nodes), value))
            }

            ComponentType::Diode => {
                let params = match check_model(def, model, &[ModelType::Diode])? {
                    Some(m) => DiodeParams::from_model(m),
                    None => DiodeParams::default(),
                };
                Component::Diode(Diode::new(name, pair(nodes), params)) // anode, cathode
            }

            ComponentType::Bjt => {
                let (bjt_type, params) = match check_model(def, model, &[ModelType::BjtNpn, ModelType::BjtPnp])? {
                    Some(m) => BjtParams::from_model(m)?,
                    None => (BjtType::Npn, BjtParams::default()),
                };
                // C, B, E
                Component::Bjt(Bjt::new(name, [nodes[0], nodes[1], nodes[2]], bjt_type, params))
            }

            ComponentType::OpAmp => {
                let params = match check_model(def, model, &[ModelType::OpAmp])? {
                    Some(m) => OpAmpParams::from_model(m),
                    None => OpAmpParams::ideal(),
                };
                // out, in+, in-
                Component::OpAmp(OpAmp::new(name, [nodes[0], nodes[1], nodes[2]], params))
            }

            ComponentType::Potentiometer => {
                let total = required("potentiometer")?;
                let position = def
                    .params
                    .get("position")
                    .cloned()
                    .unwrap_or(Expr::constant(0.5));
                // n1, wiper, n2
                Component::Potentiometer(Potentiometer::new(
                    name,
                    [nodes[0], nodes[1], nodes[2]],
                    total,
                    position,
                ))
            }

            ComponentType::Transformer => {
                let turns = def.value.clone().unwrap_or(Expr::ONE);
                Component::Transformer(Transformer::new(
                    name,
                    [nodes[0], nodes[1], nodes[2], nodes[3]],
                    turns,
                ))
            }
        };
        Ok(component)
    }

    /// Get the component name.
    pub fn name(&self) -> &str {
        match self {
            Component::Resistor(r) => &r.name,
            Component::Capacitor(c) => &c.name,
            Component::Inductor(l) => &l.name,
            Component::VoltageSource(v) => &v.name,
            Component::CurrentSource(i) => &i.name,
            Component::Diode(d) => &d.name,
            Component::Bjt(q) => &q.name,
            Component::OpAmp(o) => &o.name,
            Component::Potentiometer(p) => &p.name,
            Component::Transformer(x) => &x.name,
        }
    }

    /// Nodes the component connects to.
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Component::Resistor(r) => &r.nodes,
            Component::Capacitor(c) => &c.nodes,
            Component::Inductor(l) => &l.nodes,
            Component::VoltageSource(v) => &v.nodes,
            Component::CurrentSource(i) => &i.nodes,
            Component::Diode(d) => &d.nodes,
            Component::Bjt(q) => &q.nodes,
            Component::OpAmp(o) => &o.nodes,
            Component::Potentiometer(p) => &p.nodes,
            Component::Transformer(x) => &x.nodes,
        }
    }

    /// Check if this component is nonlinear (requires Newton-Raphson iteration).
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Component::Diode(_) | Component::Bjt(_))
    }

    fn element(&self) -> &dyn Analyze {
        match self {
            Component::Resistor(r) => r,
            Component::Capacitor(c) => c,
            Component::Inductor(l) => l,
            Component::VoltageSource(v) => v,
            Component::CurrentSource(i) => i,
            Component::Diode(d) => d,
            Component::Bjt(q) => q,
            Component::OpAmp(o) => o,
            Component::Potentiometer(p) => p,
            Component::Transformer(x) => x,
        }
    }
}

impl Analyze for Component {
    fn terminals(&self) -> Vec<Terminal> {
        self.element().terminals()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        self.element().analyze(mna)
    }
}

/// Reject a model reference of the wrong kind.
fn check_model<'a>(
    def: &ComponentDef,
    model: Option<&'a ModelDef>,
    kinds: &[ModelType],
) -> Result<Option<&'a ModelDef>> {
    match model {
        Some(m) if !kinds.contains(&m.model_type) => Err(TubesimError::invalid_component(
            &def.name,
            def.line,
            format!("model '{}' has the wrong type", m.name),
        )),
        _ => Ok(model),
    }
}

fn pair(nodes: &[NodeId]) -> [NodeId; 2] {
    [nodes[0], nodes[1]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn def(component_type: ComponentType, name: &str, value: Option<f64>) -> ComponentDef {
        ComponentDef {
            component_type,
            name: name.to_string(),
            nodes: vec!["a".into(); component_type.terminals().len()],
            value: value.map(Expr::constant),
            model_ref: None,
            params: HashMap::new(),
            line: 1,
        }
    }

    const NODES: [NodeId; 4] = [NodeId(1), NodeId(0), NodeId(2), NodeId(0)];

    #[test]
    fn test_missing_value_is_rejected() {
        let err = Component::from_def(&def(ComponentType::Resistor, "R1", None), &NODES, None, "Vin")
            .unwrap_err();
        assert!(matches!(err, TubesimError::InvalidComponent { .. }));
    }

    #[test]
    fn test_ac_source_is_driven() {
        let mut d = def(ComponentType::VoltageSource, "V1", None);
        d.params.insert("ac".into(), Expr::ONE);
        let c = Component::from_def(&d, &NODES, None, "guitar").unwrap();
        match c {
            Component::VoltageSource(vs) => {
                assert_eq!(vs.drive.unwrap().input, "guitar");
                assert!(vs.voltage.is_zero());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_model_type_mismatch() {
        let model = ModelDef {
            name: "Q2N".into(),
            model_type: ModelType::BjtNpn,
            params: HashMap::new(),
            line: 1,
        };
        let err = Component::from_def(&def(ComponentType::Diode, "D1", None), &NODES, Some(&model), "Vin")
            .unwrap_err();
        assert!(matches!(err, TubesimError::InvalidComponent { .. }));
    }

    #[test]
    fn test_dispatch() {
        let c = Component::from_def(&def(ComponentType::Transformer, "TX1", Some(2.0)), &NODES, None, "Vin")
            .unwrap();
        assert_eq!(c.name(), "TX1");
        assert_eq!(c.nodes().len(), 4);
        assert_eq!(c.terminals().len(), 4);
        assert!(!c.is_nonlinear());
    }
}
