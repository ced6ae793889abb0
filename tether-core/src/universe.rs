//! Universe Classifier
//!
//! Decides, for every concrete type, whether it is `Free` or `Linear`. A type
//! is linear if it is declared so, or if it structurally contains a linear
//! type. Types declared in universe `Type` are decided per instantiation.
//!
//! Classification is pure: the table is shared immutably between functions
//! checked in parallel, and each query carries its own visited set.

use std::collections::{HashMap, HashSet};

use tether_ir::{Ty, TypeDef, TypeParam, Universe};
use tracing::debug;

use crate::diagnostics::LinearityError;

/// Kinds of the generic parameters in scope while classifying.
pub type ParamKinds = HashMap<String, Universe>;

pub fn param_kinds(params: &[TypeParam]) -> ParamKinds {
    params
        .iter()
        .map(|p| (p.name.node.clone(), p.kind))
        .collect()
}

#[derive(Clone, Debug)]
pub struct TypeTable<'a> {
    defs: HashMap<&'a str, &'a TypeDef>,
}

impl<'a> TypeTable<'a> {
    pub fn new(defs: &'a [TypeDef]) -> Self {
        Self {
            defs: defs.iter().map(|d| (d.name.node.as_str(), d)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a TypeDef> {
        self.defs.get(name).copied()
    }

    /// Universe of a type with no generic parameters in scope.
    pub fn classify(&self, ty: &Ty) -> Universe {
        self.classify_in(ty, &ParamKinds::new())
    }

    pub fn is_linear(&self, ty: &Ty, params: &ParamKinds) -> bool {
        self.classify_in(ty, params).is_linear()
    }

    /// Universe of a type where `params` gives the kinds of any generic
    /// parameters it mentions. A `Linear`- or `Type`-kinded parameter may be
    /// instantiated with a linear type, so it classifies as `Linear`.
    pub fn classify_in(&self, ty: &Ty, params: &ParamKinds) -> Universe {
        let mut visiting = HashSet::new();
        self.classify_rec(ty, params, &mut visiting)
    }

    fn classify_rec(
        &self,
        ty: &Ty,
        params: &ParamKinds,
        visiting: &mut HashSet<String>,
    ) -> Universe {
        match ty {
            Ty::Unit | Ty::Bool | Ty::Int | Ty::Float | Ty::Text => Universe::Free,
            Ty::Ref { .. } | Ty::RegionName(_) => Universe::Free,
            Ty::Param(p) => match params.get(p) {
                Some(Universe::Linear | Universe::Type) => Universe::Linear,
                _ => Universe::Free,
            },
            Ty::Named { name, args } => self.classify_named(name, args, params, visiting),
        }
    }

    fn classify_named(
        &self,
        name: &str,
        args: &[Ty],
        params: &ParamKinds,
        visiting: &mut HashSet<String>,
    ) -> Universe {
        let Some(def) = self.get(name) else {
            debug!(type_name = name, "unknown type classified as Free");
            return Universe::Free;
        };

        match def.universe {
            Universe::Free | Universe::Region => Universe::Free,
            Universe::Linear => Universe::Linear,
            Universe::Type => {
                // Lowest common denominator over the arguments that can be linear.
                let arg_linear = def.params.iter().zip(args).any(|(param, arg)| {
                    matches!(param.kind, Universe::Type | Universe::Linear)
                        && self.classify_rec(arg, params, visiting).is_linear()
                });
                if arg_linear {
                    return Universe::Linear;
                }

                // Re-entering a type during its own classification contributes
                // nothing; direct self-containment is rejected upstream.
                if !visiting.insert(name.to_string()) {
                    return Universe::Free;
                }
                let subst: HashMap<&str, &Ty> = def
                    .params
                    .iter()
                    .map(|p| p.name.node.as_str())
                    .zip(args.iter())
                    .collect();
                let structural = def.fields().into_iter().any(|field| {
                    let field_ty = field.ty.substitute(&subst);
                    self.classify_rec(&field_ty, params, visiting).is_linear()
                });
                visiting.remove(name);

                if structural {
                    Universe::Linear
                } else {
                    Universe::Free
                }
            }
        }
    }

    /// Definition-time validation: a type declared `Free` may not contain a
    /// linear type, nor a parameter that could be instantiated with one.
    pub fn validate(&self, defs: &[TypeDef]) -> Vec<LinearityError> {
        let mut errors = Vec::new();
        for def in defs.iter().filter(|d| d.universe == Universe::Free) {
            let params = param_kinds(&def.params);
            for field in def.fields() {
                if self.is_linear(&field.ty, &params) {
                    errors.push(LinearityError::FreeTypeContainsLinear {
                        type_name: def.name.node.clone(),
                        field: field.name.node.clone(),
                        field_ty: field.ty.display(),
                        declared_at: def.name.span,
                        field_at: field.span,
                    });
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ViolationKind;
    use tether_ir::{Builder, RefKind};

    fn defs(b: &Builder) -> Vec<TypeDef> {
        vec![
            b.opaque_type("File", Universe::Linear),
            b.opaque_type("Index", Universe::Free),
            b.record_type(
                "Point",
                Universe::Free,
                vec![],
                vec![("x", Ty::Int), ("y", Ty::Int)],
            ),
            b.record_type(
                "Logged",
                Universe::Type,
                vec![],
                vec![("file", Ty::named("File")), ("lines", Ty::Int)],
            ),
            b.record_type(
                "Pair",
                Universe::Type,
                vec![("A", Universe::Type), ("B", Universe::Type)],
                vec![("a", Ty::Param("A".into())), ("b", Ty::Param("B".into()))],
            ),
            b.union_type(
                "Option",
                Universe::Type,
                vec![("T", Universe::Type)],
                vec![("None", vec![]), ("Some", vec![("value", Ty::Param("T".into()))])],
            ),
            b.record_type(
                "Tagged",
                Universe::Type,
                vec![("T", Universe::Free)],
                vec![("tag", Ty::Param("T".into()))],
            ),
        ]
    }

    #[test]
    fn primitives_and_references_are_free() {
        let b = Builder::new();
        let defs = defs(&b);
        let table = TypeTable::new(&defs);
        assert_eq!(table.classify(&Ty::Int), Universe::Free);
        assert_eq!(table.classify(&Ty::Text), Universe::Free);
        let r = Ty::reference(RefKind::Write, "R", Ty::named("File"));
        assert_eq!(table.classify(&r), Universe::Free);
    }

    #[test]
    fn declared_universes_are_respected() {
        let b = Builder::new();
        let defs = defs(&b);
        let table = TypeTable::new(&defs);
        assert_eq!(table.classify(&Ty::named("File")), Universe::Linear);
        assert_eq!(table.classify(&Ty::named("Index")), Universe::Free);
        assert_eq!(table.classify(&Ty::named("Point")), Universe::Free);
    }

    #[test]
    fn containment_makes_a_type_linear() {
        let b = Builder::new();
        let defs = defs(&b);
        let table = TypeTable::new(&defs);
        assert_eq!(table.classify(&Ty::named("Logged")), Universe::Linear);
    }

    #[test]
    fn generic_instantiations_join_their_arguments() {
        let b = Builder::new();
        let defs = defs(&b);
        let table = TypeTable::new(&defs);
        let free_pair = Ty::applied("Pair", vec![Ty::Int, Ty::named("Point")]);
        let mixed_pair = Ty::applied("Pair", vec![Ty::Int, Ty::named("File")]);
        assert_eq!(table.classify(&free_pair), Universe::Free);
        assert_eq!(table.classify(&mixed_pair), Universe::Linear);

        let some_file = Ty::applied("Option", vec![Ty::named("File")]);
        assert_eq!(table.classify(&some_file), Universe::Linear);
        let nested = Ty::applied("Option", vec![Ty::applied("Option", vec![Ty::Int])]);
        assert_eq!(table.classify(&nested), Universe::Free);
    }

    #[test]
    fn free_kinded_arguments_do_not_count() {
        let b = Builder::new();
        let defs = defs(&b);
        let table = TypeTable::new(&defs);
        assert_eq!(table.classify(&Ty::applied("Tagged", vec![Ty::Int])), Universe::Free);
    }

    #[test]
    fn type_kinded_params_classify_as_linear() {
        let b = Builder::new();
        let defs = defs(&b);
        let table = TypeTable::new(&defs);
        let mut params = ParamKinds::new();
        params.insert("T".to_string(), Universe::Type);
        params.insert("F".to_string(), Universe::Free);
        assert!(table.is_linear(&Ty::Param("T".into()), &params));
        assert!(!table.is_linear(&Ty::Param("F".into()), &params));
    }

    #[test]
    fn mutually_recursive_types_terminate() {
        let b = Builder::new();
        let defs = vec![
            b.union_type(
                "Tree",
                Universe::Type,
                vec![],
                vec![
                    ("Leaf", vec![("value", Ty::Int)]),
                    ("Node", vec![("children", Ty::named("Forest"))]),
                ],
            ),
            b.union_type(
                "Forest",
                Universe::Type,
                vec![],
                vec![
                    ("Empty", vec![]),
                    ("Cons", vec![("head", Ty::named("Tree")), ("tail", Ty::named("Forest"))]),
                ],
            ),
        ];
        let table = TypeTable::new(&defs);
        assert_eq!(table.classify(&Ty::named("Tree")), Universe::Free);
        assert_eq!(table.classify(&Ty::named("Forest")), Universe::Free);
    }

    #[test]
    fn free_declaration_with_linear_field_is_rejected() {
        let b = Builder::new();
        let defs = vec![
            b.opaque_type("Socket", Universe::Linear),
            b.record_type(
                "Conn",
                Universe::Free,
                vec![],
                vec![("port", Ty::Int), ("socket", Ty::named("Socket"))],
            ),
            b.record_type(
                "Holder",
                Universe::Free,
                vec![("T", Universe::Type)],
                vec![("held", Ty::Param("T".into()))],
            ),
        ];
        let table = TypeTable::new(&defs);
        let errors = table.validate(&defs);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind() == ViolationKind::FreeTypeContainsLinear));
        assert_eq!(errors[0].subject(), "Conn");
        assert_eq!(errors[1].subject(), "Holder");
    }
}
