//! Linear passive components: Resistor, Capacitor, Inductor.

use crate::circuit::NodeId;
use crate::error::Result;
use crate::expr::{Expr, TIME};
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};

/// A resistor: `i = (Va - Vb) / R`.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: Expr,
}

impl Resistor {
    pub fn new(name: String, nodes: [NodeId; 2], resistance: Expr) -> Self {
        Self {
            name,
            nodes,
            resistance,
        }
    }
}

impl Analyze for Resistor {
    fn terminals(&self) -> Vec<Terminal> {
        pins(&self.name, self.nodes).to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [a, b] = pins(&self.name, self.nodes);
        let i = (mna.voltage(&a) - mna.voltage(&b)) / self.resistance.clone();
        mna.set_i(&a, i.clone())?;
        mna.set_i(&b, -i)
    }
}

/// A capacitor: `i = C dV/dt`.
///
/// The derivative is left symbolic; the transient solver replaces it with
/// the trapezoidal companion relation.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: Expr,
}

impl Capacitor {
    pub fn new(name: String, nodes: [NodeId; 2], capacitance: Expr) -> Self {
        Self {
            name,
            nodes,
            capacitance,
        }
    }
}

impl Analyze for Capacitor {
    fn terminals(&self) -> Vec<Terminal> {
        pins(&self.name, self.nodes).to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [a, b] = pins(&self.name, self.nodes);
        let v = mna.voltage(&a) - mna.voltage(&b);
        let i = self.capacitance.clone() * Expr::derivative(v, &TIME);
        mna.set_i(&a, i.clone())?;
        mna.set_i(&b, -i)
    }
}

/// An inductor: `V = L di/dt`.
///
/// Introduces the branch current `i[name]` as an unknown.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: Expr,
}

impl Inductor {
    pub fn new(name: String, nodes: [NodeId; 2], inductance: Expr) -> Self {
        Self {
            name,
            nodes,
            inductance,
        }
    }
}

impl Analyze for Inductor {
    fn terminals(&self) -> Vec<Terminal> {
        pins(&self.name, self.nodes).to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [a, b] = pins(&self.name, self.nodes);
        let i = Expr::symbol(mna.add_unknown(&format!("i[{}]", self.name))?);
        mna.set_i(&a, i.clone())?;
        mna.set_i(&b, -&i)?;
        let v = mna.voltage(&a) - mna.voltage(&b);
        mna.add_equation(v, self.inductance.clone() * Expr::derivative(i, &TIME));
        Ok(())
    }
}

/// The `a`/`b` terminals of a two-terminal element.
pub(crate) fn pins(name: &str, nodes: [NodeId; 2]) -> [Terminal; 2] {
    [
        Terminal::new(name, "a", nodes[0]),
        Terminal::new(name, "b", nodes[1]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Symbol;

    fn mna() -> ModifiedNodalAnalysis {
        ModifiedNodalAnalysis::new(vec!["0".into(), "a".into()])
    }

    #[test]
    fn test_resistor_current() {
        let mut mna = mna();
        let r = Resistor::new("R1".into(), [NodeId(1), NodeId::GROUND], Expr::constant(1000.0));
        mna.add_element(&r).unwrap();
        let i = mna.node_current(NodeId(1));
        let at = |s: &Symbol| (s.name() == "V[a]").then_some(2.0);
        assert!((i.evaluate(&at).unwrap() - 0.002).abs() < 1e-15);
    }

    #[test]
    fn test_capacitor_current_is_derivative() {
        let mut mna = mna();
        let c = Capacitor::new("C1".into(), [NodeId(1), NodeId::GROUND], Expr::constant(1e-6));
        mna.add_element(&c).unwrap();
        let i = mna.node_current(NodeId(1));
        assert!(i.any(&|e: &Expr| matches!(e, Expr::Derivative(..))));
    }

    #[test]
    fn test_inductor_adds_branch_unknown() {
        let mut mna = mna();
        let l = Inductor::new("L1".into(), [NodeId(1), NodeId::GROUND], Expr::constant(0.1));
        mna.add_element(&l).unwrap();
        let system = mna.finish().unwrap();
        assert!(system.unknowns.contains(&Symbol::new("i[L1]")));
        assert_eq!(system.equations.len(), 2);
    }
}
