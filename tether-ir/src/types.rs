#![forbid(unsafe_code)]

use std::collections::HashMap;

/// Universe of a type, or kind of a generic parameter.
///
/// Type definitions are declared `Free`, `Linear`, or `Type` (the universe is
/// decided per instantiation). Generic parameters additionally use `Region`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Universe {
    Free,
    Linear,
    Type,
    Region,
}

impl Universe {
    /// Lowest common denominator of two concrete universes.
    pub fn join(self, other: Universe) -> Universe {
        if self == Universe::Linear || other == Universe::Linear {
            Universe::Linear
        } else {
            Universe::Free
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Universe::Linear)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    Read,
    Write,
}

/// A resolved, concrete type as produced by the type resolver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Unit,
    Bool,
    Int,
    Float,
    Text,

    // Nominal type with type arguments (e.g. `Option[File]`).
    Named { name: String, args: Vec<Ty> },

    // Generic parameter, only inside type definitions.
    Param(String),

    Ref {
        kind: RefKind,
        region: String,
        referent: Box<Ty>,
    },

    // Argument supplied to a `Region`-kinded parameter.
    RegionName(String),
}

impl Ty {
    pub fn named(name: impl Into<String>) -> Self {
        Ty::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn applied(name: impl Into<String>, args: Vec<Ty>) -> Self {
        Ty::Named {
            name: name.into(),
            args,
        }
    }

    pub fn reference(kind: RefKind, region: impl Into<String>, referent: Ty) -> Self {
        Ty::Ref {
            kind,
            region: region.into(),
            referent: Box::new(referent),
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Ty::Ref { .. })
    }

    pub fn display(&self) -> String {
        match self {
            Ty::Unit => "Unit".to_string(),
            Ty::Bool => "Bool".to_string(),
            Ty::Int => "Int".to_string(),
            Ty::Float => "Float".to_string(),
            Ty::Text => "Text".to_string(),
            Ty::Named { name, args } => {
                if args.is_empty() {
                    name.clone()
                } else {
                    let args_s = args
                        .iter()
                        .map(|t| t.display())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{name}[{args_s}]")
                }
            }
            Ty::Param(p) => p.clone(),
            Ty::Ref {
                kind,
                region,
                referent,
            } => {
                let sigil = match kind {
                    RefKind::Read => "&",
                    RefKind::Write => "&!",
                };
                format!("{sigil}[{}, {region}]", referent.display())
            }
            Ty::RegionName(r) => r.clone(),
        }
    }

    /// Every region name mentioned anywhere in this type, outermost first.
    pub fn regions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_regions(&mut out);
        out
    }

    fn collect_regions<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Ty::Named { args, .. } => {
                for arg in args {
                    arg.collect_regions(out);
                }
            }
            Ty::Ref {
                region, referent, ..
            } => {
                out.push(region.as_str());
                referent.collect_regions(out);
            }
            Ty::RegionName(r) => out.push(r.as_str()),
            _ => {}
        }
    }

    /// Replace generic parameters by the supplied arguments.
    pub fn substitute(&self, subst: &HashMap<&str, &Ty>) -> Ty {
        match self {
            Ty::Param(p) => match subst.get(p.as_str()) {
                Some(t) => (*t).clone(),
                None => self.clone(),
            },
            Ty::Named { name, args } => Ty::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(subst)).collect(),
            },
            Ty::Ref {
                kind,
                region,
                referent,
            } => {
                // Region parameters are substituted through `RegionName` args.
                let region = match subst.get(region.as_str()) {
                    Some(Ty::RegionName(r)) => r.clone(),
                    _ => region.clone(),
                };
                Ty::Ref {
                    kind: *kind,
                    region,
                    referent: Box::new(referent.substitute(subst)),
                }
            }
            other => other.clone(),
        }
    }
}
