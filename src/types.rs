//! Type model: simple, function, and union types.
//!
//! Modeled as a tagged variant, one closed `Type` enum rather than several
//! structs sharing a base layout. A type reference is a plain index into
//! the module's type table — resolved once by the loader, never looked up
//! by name again afterward.

use std::fmt;

/// An index into the module's type table.
pub type TypeRef = usize;

/// Fixed slots occupied by the nine system types, in table order.
pub const SYS_ANY: TypeRef = 0;
pub const SYS_NUMBER: TypeRef = 1;
pub const SYS_STRING: TypeRef = 2;
pub const SYS_BOOLEAN: TypeRef = 3;
pub const SYS_NULL: TypeRef = 4;
pub const SYS_UNDEFINED: TypeRef = 5;
pub const SYS_INTEGER: TypeRef = 6;
pub const SYS_DECIMAL: TypeRef = 7;
pub const SYS_VOID: TypeRef = 8;

/// Number of predefined system types prepended to every module's type table.
pub const NUM_SYSTEM_TYPES: usize = 9;

/// Canonical names of the system types, in table order.
pub const SYSTEM_TYPE_NAMES: [&str; NUM_SYSTEM_TYPES] = [
    "any", "number", "string", "boolean", "null", "undefined", "integer", "decimal", "void",
];

/// A type in the module's type table.
///
/// Every reference field (`upper_types`, `return_type`, `param_types`,
/// `members`) is a resolved [`TypeRef`] by the time a `Type` is reachable
/// from a loaded [`crate::module::Module`] — the loader never leaves a
/// dangling name behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A simple type with zero or more supertype references.
    Simple { name: String, upper_types: Vec<TypeRef> },
    /// A function type: return type, and ordered parameter types.
    Function {
        name: String,
        return_type: TypeRef,
        param_types: Vec<TypeRef>,
    },
    /// A union of member types.
    Union { name: String, members: Vec<TypeRef> },
}

impl Type {
    /// The type's declared name.
    pub fn name(&self) -> &str {
        match self {
            Type::Simple { name, .. } => name,
            Type::Function { name, .. } => name,
            Type::Union { name, .. } => name,
        }
    }

    /// Number of declared parameters, for function types only.
    pub fn num_params(&self) -> usize {
        match self {
            Type::Function { param_types, .. } => param_types.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for Type {
    /// Debugging aid only — never invoked from the hot execution path.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Simple { name, upper_types } => {
                write!(f, "{}: simple ({} upper types)", name, upper_types.len())
            }
            Type::Function {
                name,
                param_types,
                return_type: _,
            } => {
                write!(f, "{}: fn({} params) -> ..", name, param_types.len())
            }
            Type::Union { name, members } => {
                write!(f, "{}: union({} members)", name, members.len())
            }
        }
    }
}

/// Construct the nine system types at their fixed indices, ready to be
/// prepended to a module's type table.
///
/// `number, string, boolean` have upper type `any`; `integer, decimal` have
/// upper type `number`; `any, null, undefined, void` have no upper type.
pub fn system_types() -> Vec<Type> {
    vec![
        Type::Simple {
            name: "any".to_string(),
            upper_types: vec![],
        },
        Type::Simple {
            name: "number".to_string(),
            upper_types: vec![SYS_ANY],
        },
        Type::Simple {
            name: "string".to_string(),
            upper_types: vec![SYS_ANY],
        },
        Type::Simple {
            name: "boolean".to_string(),
            upper_types: vec![SYS_ANY],
        },
        Type::Simple {
            name: "null".to_string(),
            upper_types: vec![],
        },
        Type::Simple {
            name: "undefined".to_string(),
            upper_types: vec![],
        },
        Type::Simple {
            name: "integer".to_string(),
            upper_types: vec![SYS_NUMBER],
        },
        Type::Simple {
            name: "decimal".to_string(),
            upper_types: vec![SYS_NUMBER],
        },
        Type::Simple {
            name: "void".to_string(),
            upper_types: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_types_have_fixed_indices() {
        let types = system_types();
        assert_eq!(types.len(), NUM_SYSTEM_TYPES);
        for (i, name) in SYSTEM_TYPE_NAMES.iter().enumerate() {
            assert_eq!(types[i].name(), *name);
        }
    }

    #[test]
    fn integer_upper_type_is_number() {
        let types = system_types();
        match &types[SYS_INTEGER] {
            Type::Simple { upper_types, .. } => assert_eq!(upper_types, &vec![SYS_NUMBER]),
            _ => panic!("integer must be a simple type"),
        }
    }

    #[test]
    fn any_has_no_upper_type() {
        let types = system_types();
        match &types[SYS_ANY] {
            Type::Simple { upper_types, .. } => assert!(upper_types.is_empty()),
            _ => panic!("any must be a simple type"),
        }
    }

    #[test]
    fn display_does_not_panic() {
        for t in system_types() {
            let _ = format!("{}", t);
        }
    }
}
