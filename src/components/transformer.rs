//! Ideal transformer.

use crate::circuit::NodeId;
use crate::error::Result;
use crate::expr::Expr;
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};

/// An ideal transformer with turns ratio `n = Np / Ns`.
///
/// ```text
///   pa --+      +-- sa
///        ) || (
///   pc --+      +-- sc
/// ```
///
/// Adds the primary and secondary currents `i[name.p]`, `i[name.s]` and the
/// constraints `n * Ip = Is`, `Vp = n * Vs`.
#[derive(Debug, Clone)]
pub struct Transformer {
    pub name: String,
    pub nodes: [NodeId; 4], // [pa, pc, sa, sc]
    pub turns: Expr,
}

impl Transformer {
    pub fn new(name: String, nodes: [NodeId; 4], turns: Expr) -> Self {
        Self { name, nodes, turns }
    }

    fn pins(&self) -> [Terminal; 4] {
        [
            Terminal::new(&self.name, "pa", self.nodes[0]),
            Terminal::new(&self.name, "pc", self.nodes[1]),
            Terminal::new(&self.name, "sa", self.nodes[2]),
            Terminal::new(&self.name, "sc", self.nodes[3]),
        ]
    }
}

impl Analyze for Transformer {
    fn terminals(&self) -> Vec<Terminal> {
        self.pins().to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [pa, pc, sa, sc] = self.pins();

        let ip = Expr::symbol(mna.add_unknown(&format!("i[{}.p]", self.name))?);
        mna.set_i(&pa, ip.clone())?;
        mna.set_i(&pc, -&ip)?;
        let is = Expr::symbol(mna.add_unknown(&format!("i[{}.s]", self.name))?);
        mna.set_i(&sa, -&is)?;
        mna.set_i(&sc, is.clone())?;
        mna.add_equation(ip * self.turns.clone(), is);

        let vp = mna.voltage(&pa) - mna.voltage(&pc);
        let vs = mna.voltage(&sa) - mna.voltage(&sc);
        mna.add_equation(vp, self.turns.clone() * vs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Symbol;

    #[test]
    fn test_adds_two_unknowns_and_two_equations() {
        let mut mna = ModifiedNodalAnalysis::new(vec![
            "0".into(),
            "p".into(),
            "s".into(),
        ]);
        let tx = Transformer::new(
            "TX1".into(),
            [NodeId(1), NodeId::GROUND, NodeId(2), NodeId::GROUND],
            Expr::constant(2.0),
        );
        mna.add_element(&tx).unwrap();
        let before = mna.node_current(NodeId(1));
        assert_eq!(before, Expr::variable("i[TX1.p]"));
        let system = mna.finish().unwrap();
        // Two node voltages, two branch currents; two KCL rows plus the
        // transformer's own pair.
        assert_eq!(system.unknowns.len(), 4);
        assert_eq!(system.equations.len(), 4);
        assert!(system.unknowns.contains(&Symbol::new("i[TX1.p]")));
        assert!(system.unknowns.contains(&Symbol::new("i[TX1.s]")));
    }
}
