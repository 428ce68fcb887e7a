//! User controls: the potentiometer.

use crate::circuit::NodeId;
use crate::error::Result;
use crate::expr::{Expr, Function};
use crate::solver::{Analyze, ModifiedNodalAnalysis, Terminal};

/// Smallest resistance of either half of the track.
const MIN_SEGMENT: f64 = 0.1;

/// A potentiometer component.
///
/// Modeled as two resistors in series with a wiper tap:
///   n1 ----[R1]---- wiper ----[R2]---- n2
///
/// where R1 = position * total_resistance
/// and   R2 = (1 - position) * total_resistance
///
/// The position is an expression, so binding it to a parameter makes the
/// knob adjustable while the simulation runs.
#[derive(Debug, Clone)]
pub struct Potentiometer {
    pub name: String,
    pub nodes: [NodeId; 3], // [n1, wiper, n2]
    pub total_resistance: Expr,
    /// Position from 0.0 to 1.0
    pub position: Expr,
}

impl Potentiometer {
    pub fn new(name: String, nodes: [NodeId; 3], total_resistance: Expr, position: Expr) -> Self {
        Self {
            name,
            nodes,
            total_resistance: max(total_resistance, 1.0), // Minimum 1 ohm
            position: clamp(position, 0.001, 0.999),      // Avoid zero resistance
        }
    }

    /// Resistance from n1 to the wiper.
    pub fn r1(&self) -> Expr {
        max(self.position.clone() * self.total_resistance.clone(), MIN_SEGMENT)
    }

    /// Resistance from the wiper to n2.
    pub fn r2(&self) -> Expr {
        max(
            (1.0 - self.position.clone()) * self.total_resistance.clone(),
            MIN_SEGMENT,
        )
    }

    fn pins(&self) -> [Terminal; 3] {
        [
            Terminal::new(&self.name, "a", self.nodes[0]),
            Terminal::new(&self.name, "w", self.nodes[1]),
            Terminal::new(&self.name, "b", self.nodes[2]),
        ]
    }
}

fn max(x: Expr, floor: f64) -> Expr {
    Expr::call(Function::Max, vec![x, Expr::constant(floor)])
}

fn clamp(x: Expr, lo: f64, hi: f64) -> Expr {
    Expr::call(Function::Min, vec![max(x, lo), Expr::constant(hi)])
}

impl Analyze for Potentiometer {
    fn terminals(&self) -> Vec<Terminal> {
        self.pins().to_vec()
    }

    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()> {
        let [a, w, b] = self.pins();
        let (va, vw, vb) = (mna.voltage(&a), mna.voltage(&w), mna.voltage(&b));
        let i1 = (va - vw.clone()) / self.r1();
        let i2 = (vw - vb) / self.r2();
        mna.set_i(&a, i1.clone())?;
        mna.set_i(&w, &i2 - &i1)?;
        mna.set_i(&b, -i2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Symbol;
    use approx::assert_relative_eq;

    fn pot(position: Expr) -> Potentiometer {
        Potentiometer::new(
            "POT1".into(),
            [NodeId(1), NodeId(2), NodeId::GROUND],
            Expr::constant(10_000.0),
            position,
        )
    }

    #[test]
    fn test_constant_position_folds() {
        let p = pot(Expr::constant(0.25));
        assert_eq!(p.r1(), Expr::constant(2500.0));
        assert_eq!(p.r2(), Expr::constant(7500.0));
    }

    #[test]
    fn test_position_is_clamped() {
        let p = pot(Expr::constant(1.5));
        assert_relative_eq!(p.r1().as_constant().unwrap(), 9990.0, epsilon = 1e-9);
        assert_relative_eq!(p.r2().as_constant().unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parameter_position() {
        let p = pot(Expr::variable("drive"));
        let at = |s: &Symbol| (s.name() == "drive").then_some(0.5);
        assert_relative_eq!(p.r1().evaluate(&at).unwrap(), 5000.0);
        assert_relative_eq!(p.r2().evaluate(&at).unwrap(), 5000.0);
    }
}
