//! Formal and resolved port types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A reference to a port type.
///
/// Types are described structurally so that generic units (`List<T>` in,
/// `T` out) can be wired without the engine knowing anything about the
/// values that will flow at run time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// Top type: accepts every value.
    Any,
    /// A type variable, scoped to the unit declaring it.
    Var {
        /// Variable name (e.g., "T").
        name: String,
    },
    /// A named type with optional type parameters (e.g., `List<Int>`).
    Named {
        /// Type name.
        name: String,
        /// Type parameters, in declaration order.
        params: Vec<TypeRef>,
    },
}

impl TypeRef {
    /// A named type without parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// A named type with parameters.
    pub fn generic(name: impl Into<String>, params: Vec<TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            params,
        }
    }

    /// A type variable.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var { name: name.into() }
    }

    /// Whether this is the top type.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Whether this is a (still unbound) type variable.
    pub fn is_var(&self) -> bool {
        matches!(self, Self::Var { .. })
    }

    /// Whether the type contains no type variables.
    pub fn is_concrete(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Var { .. } => false,
            Self::Named { params, .. } => params.iter().all(Self::is_concrete),
        }
    }

    /// Replace bound variables with their bindings.
    ///
    /// Unbound variables are left in place.
    pub fn substitute(&self, bindings: &HashMap<String, TypeRef>) -> TypeRef {
        match self {
            Self::Any => Self::Any,
            Self::Var { name } => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Named { name, params } => Self::Named {
                name: name.clone(),
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
            },
        }
    }

    /// Bind the variables of `self` (a formal type) against `actual`.
    ///
    /// Existing bindings are kept; the first binding of a variable wins.
    pub fn unify(&self, actual: &TypeRef, bindings: &mut HashMap<String, TypeRef>) {
        self.unify_with(actual, bindings, |sub, sup| sub == sup);
    }

    /// Like [`Self::unify`], but the outermost actual type may be any type
    /// `accepts(actual_name, formal_name)` allows, such as a declared
    /// subtype. Parameters stay invariant and must match by name.
    pub fn unify_with(
        &self,
        actual: &TypeRef,
        bindings: &mut HashMap<String, TypeRef>,
        accepts: impl Fn(&str, &str) -> bool,
    ) {
        if let (
            Self::Named { name, params },
            Self::Named {
                name: actual_name,
                params: actual_params,
            },
        ) = (self, actual)
        {
            if accepts(actual_name, name) && params.len() == actual_params.len() {
                for (formal, actual) in params.iter().zip(actual_params) {
                    formal.unify_exact(actual, bindings);
                }
            }
            return;
        }
        self.unify_exact(actual, bindings);
    }

    fn unify_exact(&self, actual: &TypeRef, bindings: &mut HashMap<String, TypeRef>) {
        match (self, actual) {
            (Self::Var { name }, actual) => {
                if !actual.is_var() && !bindings.contains_key(name) {
                    bindings.insert(name.clone(), actual.clone());
                }
            }
            (
                Self::Named { name, params },
                Self::Named {
                    name: actual_name,
                    params: actual_params,
                },
            ) if name == actual_name && params.len() == actual_params.len() => {
                for (formal, actual) in params.iter().zip(actual_params) {
                    formal.unify_exact(actual, bindings);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Var { name } => write!(f, "?{}", name),
            Self::Named { name, params } => {
                write!(f, "{}", name)?;
                if !params.is_empty() {
                    write!(f, "<")?;
                    for (i, param) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", param)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}
