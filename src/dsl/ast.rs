//! Parsed netlist, before nodes and models are resolved.

use std::collections::HashMap;
use std::str::FromStr;

use crate::expr::Expr;

/// Everything a netlist declares, in source terms.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    pub components: Vec<ComponentDef>,
    pub models: HashMap<String, ModelDef>,
    /// `.param` declarations in source order
    pub params: Vec<ParamDef>,
    pub input_node: Option<String>,
    /// Signal name given after the `.input` node
    pub input_name: Option<String>,
    pub output_node: Option<String>,
    /// `.node` declarations first, then the nodes only components mention
    pub nodes: Vec<String>,
}

impl CircuitAst {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One element line.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub component_type: ComponentType,
    pub name: String,
    /// Node names in the order of [`ComponentType::terminals`]
    pub nodes: Vec<String>,
    /// First bare value on the line
    pub value: Option<Expr>,
    pub model_ref: Option<String>,
    /// `key=value` pairs, lowercased keys; also `dc`, `ac` and `position`
    pub params: HashMap<String, Expr>,
    pub line: usize,
}

/// Element kinds the netlist can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    Diode,
    Bjt,
    VoltageSource,
    CurrentSource,
    OpAmp,
    Potentiometer,
    Transformer,
}

impl ComponentType {
    /// Kind implied by an element name such as `R1`, `OP2` or `POTgain`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.starts_with("OP") {
            return Some(Self::OpAmp);
        }
        if upper.starts_with("POT") {
            return Some(Self::Potentiometer);
        }
        Some(match upper.chars().next()? {
            'R' => Self::Resistor,
            'C' => Self::Capacitor,
            'L' => Self::Inductor,
            'D' => Self::Diode,
            'Q' => Self::Bjt,
            'V' => Self::VoltageSource,
            'I' => Self::CurrentSource,
            'X' => Self::Transformer,
            _ => return None,
        })
    }

    /// Kind named by a leading keyword, as in `OPAMP U1 out in fb`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "OP" | "OPAMP" => Some(Self::OpAmp),
            "POT" => Some(Self::Potentiometer),
            "XFMR" | "TRANSFORMER" => Some(Self::Transformer),
            _ => None,
        }
    }

    /// Terminal names, in netlist order.
    pub fn terminals(&self) -> &'static [&'static str] {
        match self {
            Self::Resistor | Self::Capacitor | Self::Inductor => &["n+", "n-"],
            Self::VoltageSource | Self::CurrentSource => &["n+", "n-"],
            Self::Diode => &["anode", "cathode"],
            Self::Bjt => &["collector", "base", "emitter"],
            Self::OpAmp => &["out", "in+", "in-"],
            Self::Potentiometer => &["n1", "wiper", "n2"],
            Self::Transformer => &["pa", "pc", "sa", "sc"],
        }
    }
}

/// A `.model` line.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub model_type: ModelType,
    /// Lowercased parameter names
    pub params: HashMap<String, f64>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Diode,
    BjtNpn,
    BjtPnp,
    OpAmp,
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "D" | "DIODE" => Ok(Self::Diode),
            "NPN" => Ok(Self::BjtNpn),
            "PNP" => Ok(Self::BjtPnp),
            "OP" | "OPAMP" => Ok(Self::OpAmp),
            _ => Err(format!("unknown model type: {}", s)),
        }
    }
}

/// A `.param` declaration: a named value the host may change while the
/// simulation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub default: f64,
    pub line: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_from_name() {
        assert_eq!(ComponentType::from_name("r1"), Some(ComponentType::Resistor));
        assert_eq!(ComponentType::from_name("OP1"), Some(ComponentType::OpAmp));
        assert_eq!(ComponentType::from_name("POTvol"), Some(ComponentType::Potentiometer));
        assert_eq!(ComponentType::from_name("Z1"), None);
        assert_eq!(ComponentType::from_name(""), None);
        assert_eq!(ComponentType::Bjt.terminals().len(), 3);
    }

    #[test]
    fn test_model_type_parse() {
        assert_eq!("npn".parse::<ModelType>(), Ok(ModelType::BjtNpn));
        assert!("triode".parse::<ModelType>().is_err());
    }
}
