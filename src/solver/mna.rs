//! Symbolic Modified Nodal Analysis.
//!
//! Every element contributes to a global system through the [`Analyze`]
//! contract: it may introduce branch-current unknowns, must assign the
//! current flowing into each of its terminals exactly once, and may append
//! equations (a voltage source's branch constraint, say). The assembler then
//! adds one Kirchhoff current law equation per non-ground node and checks the
//! system is square.
//!
//! Node voltages are named `V[node]`, branch currents `i[element]`. The ground
//! node has voltage zero and no KCL equation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use log::debug;

use crate::circuit::NodeId;
use crate::error::{Result, TubesimError};
use crate::expr::{Equation, Expr, Symbol, TIME};

/// An element's connection point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Terminal {
    name: String,
    node: NodeId,
}

impl Terminal {
    /// Terminal `pin` of `element`, connected to `node`.
    pub fn new(element: &str, pin: &str, node: NodeId) -> Self {
        Self {
            name: format!("{}.{}", element, pin),
            node,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The element analysis contract.
pub trait Analyze {
    /// The terminals whose currents this element assigns.
    fn terminals(&self) -> Vec<Terminal>;

    /// Introduce unknowns, assign terminal currents and add equations.
    fn analyze(&self, mna: &mut ModifiedNodalAnalysis) -> Result<()>;
}

/// A symbolic parameter together with its default value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub symbol: Symbol,
    pub default: f64,
}

/// The assembled continuous-time system.
#[derive(Debug, Clone)]
pub struct CircuitEquations {
    pub unknowns: Vec<Symbol>,
    pub equations: Vec<Equation>,
    pub inputs: Vec<Symbol>,
    pub parameters: Vec<Parameter>,
}

impl CircuitEquations {
    /// Whether `symbol` names a declared parameter.
    pub fn is_parameter(&self, symbol: &Symbol) -> bool {
        self.parameters.iter().any(|p| &p.symbol == symbol)
    }
}

struct TerminalSlot {
    terminal: Terminal,
    current: Option<Expr>,
}

/// Equation assembler.
pub struct ModifiedNodalAnalysis {
    node_names: Vec<String>,
    unknowns: Vec<Symbol>,
    known: HashSet<Symbol>,
    inputs: Vec<Symbol>,
    parameters: Vec<Parameter>,
    terminals: Vec<TerminalSlot>,
    terminal_index: HashMap<String, usize>,
    equations: Vec<Equation>,
}

impl ModifiedNodalAnalysis {
    /// Start an analysis over nodes named by `node_names` (index = node id,
    /// index 0 is ground). One voltage unknown is created per non-ground node.
    pub fn new(node_names: Vec<String>) -> Self {
        let mut mna = Self {
            node_names,
            unknowns: Vec::new(),
            known: HashSet::new(),
            inputs: Vec::new(),
            parameters: Vec::new(),
            terminals: Vec::new(),
            terminal_index: HashMap::new(),
            equations: Vec::new(),
        };
        for id in 1..mna.node_names.len() {
            let symbol = Self::node_symbol(&mna.node_names[id]);
            mna.known.insert(symbol.clone());
            mna.unknowns.push(symbol);
        }
        mna
    }

    fn node_symbol(name: &str) -> Symbol {
        Symbol::new(format!("V[{}]", name))
    }

    /// Introduce a new unknown.
    pub fn add_unknown(&mut self, name: &str) -> Result<Symbol> {
        let symbol = Symbol::new(name);
        if !self.known.insert(symbol.clone()) {
            return Err(TubesimError::DuplicateUnknown {
                name: name.to_string(),
            });
        }
        self.unknowns.push(symbol.clone());
        Ok(symbol)
    }

    /// Declare an external input signal. Declaring the same input twice is a
    /// no-op.
    pub fn add_input(&mut self, name: &str) -> Result<Expr> {
        let symbol = Symbol::new(name);
        if !self.inputs.contains(&symbol) {
            if !self.known.insert(symbol.clone()) {
                return Err(TubesimError::DuplicateDefinition {
                    name: name.to_string(),
                });
            }
            self.inputs.push(symbol.clone());
        }
        Ok(Expr::symbol(symbol))
    }

    /// Declare a symbolic parameter with its default value.
    pub fn add_parameter(&mut self, name: &str, default: f64) -> Result<Expr> {
        let symbol = Symbol::new(name);
        if !self.known.insert(symbol.clone()) {
            return Err(TubesimError::DuplicateDefinition {
                name: name.to_string(),
            });
        }
        self.parameters.push(Parameter {
            symbol: symbol.clone(),
            default,
        });
        Ok(Expr::symbol(symbol))
    }

    /// Voltage of `node`.
    pub fn v(&self, node: NodeId) -> Expr {
        if node.is_ground() {
            Expr::ZERO
        } else {
            Expr::symbol(Self::node_symbol(&self.node_names[node.0]))
        }
    }

    /// Voltage at a terminal.
    pub fn voltage(&self, terminal: &Terminal) -> Expr {
        self.v(terminal.node)
    }

    /// Register a terminal. Called by [`add_element`](Self::add_element).
    fn connect(&mut self, terminal: Terminal) -> Result<()> {
        if self.terminal_index.contains_key(terminal.name()) {
            return Err(TubesimError::DuplicateComponent {
                name: terminal.name().to_string(),
            });
        }
        self.terminal_index
            .insert(terminal.name().to_string(), self.terminals.len());
        self.terminals.push(TerminalSlot {
            terminal,
            current: None,
        });
        Ok(())
    }

    /// Assign the current flowing into the element through `terminal`.
    pub fn set_i(&mut self, terminal: &Terminal, current: Expr) -> Result<()> {
        let slot = self
            .terminal_index
            .get(terminal.name())
            .map(|&i| &mut self.terminals[i])
            .ok_or_else(|| TubesimError::InvalidTopology {
                message: format!("terminal '{}' is not connected", terminal),
            })?;
        if slot.current.is_some() {
            return Err(TubesimError::TerminalCurrentReassigned {
                terminal: terminal.name().to_string(),
            });
        }
        slot.current = Some(current);
        Ok(())
    }

    pub fn add_equation(&mut self, lhs: Expr, rhs: Expr) {
        self.equations.push(Equation::new(lhs, rhs));
    }

    /// Connect an element's terminals and let it analyze itself.
    pub fn add_element(&mut self, element: &dyn Analyze) -> Result<()> {
        for terminal in element.terminals() {
            self.connect(terminal)?;
        }
        element.analyze(self)
    }

    /// Sum of the currents flowing from `node` into the terminals attached to
    /// it. Unassigned terminals are skipped.
    pub fn node_current(&self, node: NodeId) -> Expr {
        Expr::sum(
            self.terminals
                .iter()
                .filter(|slot| slot.terminal.node == node)
                .filter_map(|slot| slot.current.clone()),
        )
    }

    /// Add the node equations and check the system.
    pub fn finish(mut self) -> Result<CircuitEquations> {
        if let Some(slot) = self.terminals.iter().find(|s| s.current.is_none()) {
            return Err(TubesimError::TerminalCurrentUnassigned {
                terminal: slot.terminal.name().to_string(),
            });
        }

        for id in 1..self.node_names.len() {
            let kcl = self.node_current(NodeId(id));
            self.equations.push(Equation::new(kcl, Expr::ZERO));
        }

        let mut used = BTreeSet::new();
        for eq in &self.equations {
            used.extend(eq.lhs.symbols());
            used.extend(eq.rhs.symbols());
        }
        if let Some(undefined) = used
            .iter()
            .find(|s| !self.known.contains(*s) && **s != *TIME)
        {
            return Err(TubesimError::UndefinedSymbol {
                symbol: undefined.to_string(),
            });
        }

        let (equations, unknowns) = (self.equations.len(), self.unknowns.len());
        if equations < unknowns {
            return Err(TubesimError::Underdetermined {
                equations,
                unknowns,
            });
        }
        if equations > unknowns {
            return Err(TubesimError::Overdetermined {
                equations,
                unknowns,
            });
        }

        debug!(
            "assembled {} equations in {} unknowns ({} inputs, {} parameters)",
            equations,
            unknowns,
            self.inputs.len(),
            self.parameters.len()
        );

        Ok(CircuitEquations {
            unknowns: self.unknowns,
            equations: self.equations,
            inputs: self.inputs,
            parameters: self.parameters,
        })
    }
}
