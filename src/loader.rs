//! Decodes a bytecode stream into a fully resolved [`Module`].
//!
//! Two passes over the type section: the first reads each type's shell and
//! stashes its raw name references; the second rewrites every stashed name
//! into a direct [`TypeRef`] once the whole table (names included) is known.
//! After this module returns, no name lookups ever occur again.

use std::collections::HashMap;

use crate::constant::{Constant, ConstantPool};
use crate::error::LoadError;
use crate::module::Module;
use crate::symbol::{
    FunctionSymbol, VarSymbol, BUILTIN_INTEGER_TO_STRING, BUILTIN_PRINTLN, BUILTIN_TICK,
};
use crate::types::{self, Type, TypeRef, NUM_SYSTEM_TYPES, SYS_INTEGER, SYS_STRING, SYS_VOID};

/// Parse a complete bytecode stream into a [`Module`].
pub fn load(bytes: &[u8]) -> Result<Module, LoadError> {
    let mut cursor = Cursor::new(bytes);

    cursor.read_string()?; // "types" marker, discarded
    let num_types = cursor.read_u8()? as usize;

    let mut pending = Vec::with_capacity(num_types);
    for _ in 0..num_types {
        pending.push(read_pending_type(&mut cursor)?);
    }

    let (mut types, name_to_index) = build_types(pending)?;

    cursor.read_string()?; // "consts" marker, discarded
    let num_user_consts = cursor.read_u8()? as usize;

    let mut constants = ConstantPool::new();
    push_builtins(&mut constants, &mut types);

    for _ in 0..num_user_consts {
        let constant = read_const(&mut cursor, &name_to_index)?;
        constants.push(constant);
    }

    let main_index = (0..constants.len())
        .find(|&i| {
            constants
                .get(i)
                .and_then(Constant::as_function)
                .map(|f| f.name == "main")
                .unwrap_or(false)
        })
        .ok_or(LoadError::MissingMain)?;

    Ok(Module::new(types, constants, main_index))
}

// ---------------------------------------------------------------------
// Byte cursor
// ---------------------------------------------------------------------

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, LoadError> {
        let b = *self.data.get(self.pos).ok_or(LoadError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], LoadError> {
        let end = self.pos.checked_add(n).ok_or(LoadError::UnexpectedEof)?;
        let slice = self.data.get(self.pos..end).ok_or(LoadError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    /// `str := u8 len` followed by `len` bytes.
    fn read_string(&mut self) -> Result<String, LoadError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

// ---------------------------------------------------------------------
// Pass 1: type shells with raw name references
// ---------------------------------------------------------------------

enum PendingType {
    Simple {
        name: String,
        upper: Vec<String>,
    },
    Function {
        name: String,
        return_ty: String,
        params: Vec<String>,
    },
    Union {
        name: String,
        members: Vec<String>,
    },
}

fn read_pending_type(cursor: &mut Cursor) -> Result<PendingType, LoadError> {
    let kind = cursor.read_u8()?;
    match kind {
        1 => {
            let name = cursor.read_string()?;
            let n_upper = cursor.read_u8()? as usize;
            let mut upper = Vec::with_capacity(n_upper);
            for _ in 0..n_upper {
                upper.push(cursor.read_string()?);
            }
            Ok(PendingType::Simple { name, upper })
        }
        2 => {
            let name = cursor.read_string()?;
            let return_ty = cursor.read_string()?;
            let n_params = cursor.read_u8()? as usize;
            let mut params = Vec::with_capacity(n_params);
            for _ in 0..n_params {
                params.push(cursor.read_string()?);
            }
            Ok(PendingType::Function {
                name,
                return_ty,
                params,
            })
        }
        3 => {
            let name = cursor.read_string()?;
            let n_members = cursor.read_u8()? as usize;
            let mut members = Vec::with_capacity(n_members);
            for _ in 0..n_members {
                members.push(cursor.read_string()?);
            }
            Ok(PendingType::Union { name, members })
        }
        other => Err(LoadError::UnknownTypeKind(other)),
    }
}

// ---------------------------------------------------------------------
// Pass 2: rewrite raw names into resolved TypeRefs
// ---------------------------------------------------------------------

/// Build the full type table (system types prepended) plus the name→index
/// map later passes (var/function type-name resolution) reuse.
fn build_types(
    pending: Vec<PendingType>,
) -> Result<(Vec<Type>, HashMap<String, TypeRef>), LoadError> {
    let mut name_to_index: HashMap<String, TypeRef> = HashMap::new();
    let mut types = types::system_types();
    for (i, name) in types::SYSTEM_TYPE_NAMES.iter().enumerate() {
        name_to_index.entry(name.to_string()).or_insert(i);
    }

    // Register every user type's name and assigned index before resolving
    // any of their reference fields, so forward references within the user
    // section resolve on the first pass.
    for (i, p) in pending.iter().enumerate() {
        let index = NUM_SYSTEM_TYPES + i;
        let name = match p {
            PendingType::Simple { name, .. } => name.clone(),
            PendingType::Function { name, .. } => name.clone(),
            PendingType::Union { name, .. } => name.clone(),
        };
        name_to_index.entry(name).or_insert(index);
    }

    for p in pending {
        let resolved = match p {
            PendingType::Simple { name, upper } => Type::Simple {
                name,
                upper_types: resolve_names(&upper, &name_to_index)?,
            },
            PendingType::Function {
                name,
                return_ty,
                params,
            } => Type::Function {
                name,
                return_type: resolve_name(&return_ty, &name_to_index)?,
                param_types: resolve_names(&params, &name_to_index)?,
            },
            PendingType::Union { name, members } => Type::Union {
                name,
                members: resolve_names(&members, &name_to_index)?,
            },
        };
        types.push(resolved);
    }

    Ok((types, name_to_index))
}

fn resolve_name(name: &str, map: &HashMap<String, TypeRef>) -> Result<TypeRef, LoadError> {
    map.get(name)
        .copied()
        .ok_or_else(|| LoadError::UnresolvedTypeName(name.to_string()))
}

fn resolve_names(names: &[String], map: &HashMap<String, TypeRef>) -> Result<Vec<TypeRef>, LoadError> {
    names.iter().map(|n| resolve_name(n, map)).collect()
}

// ---------------------------------------------------------------------
// Built-in constants
// ---------------------------------------------------------------------

/// Insert the three system built-ins at pool indices `{0, 1, 2}`. Their
/// function types aren't named in the stream's type section, so they're
/// synthesized directly and appended to the type table rather than resolved
/// by name.
fn push_builtins(pool: &mut ConstantPool, types: &mut Vec<Type>) {
    let println_type = types.len();
    types.push(Type::Function {
        name: "@println".to_string(),
        return_type: SYS_VOID,
        param_types: vec![SYS_INTEGER],
    });
    let tick_type = types.len();
    types.push(Type::Function {
        name: "@tick".to_string(),
        return_type: SYS_INTEGER,
        param_types: vec![],
    });
    let to_string_type = types.len();
    types.push(Type::Function {
        name: "@integer_to_string".to_string(),
        return_type: SYS_STRING,
        param_types: vec![SYS_INTEGER],
    });

    pool.push(Constant::Function(FunctionSymbol::new(
        BUILTIN_PRINTLN,
        println_type,
        vec![VarSymbol::new("a", SYS_INTEGER)],
        vec![],
    )));
    pool.push(Constant::Function(FunctionSymbol::new(
        BUILTIN_TICK,
        tick_type,
        vec![],
        vec![],
    )));
    pool.push(Constant::Function(FunctionSymbol::new(
        BUILTIN_INTEGER_TO_STRING,
        to_string_type,
        vec![VarSymbol::new("num", SYS_INTEGER)],
        vec![],
    )));
}

// ---------------------------------------------------------------------
// Const section
// ---------------------------------------------------------------------

fn read_const(cursor: &mut Cursor, names: &HashMap<String, TypeRef>) -> Result<Constant, LoadError> {
    let kind = cursor.read_u8()?;
    match kind {
        1 => {
            let value = cursor.read_u8()? as i32;
            Ok(Constant::Number(value))
        }
        2 => {
            let value = cursor.read_string()?;
            Ok(Constant::String(value))
        }
        3 => Ok(Constant::Function(read_function_body(cursor, names)?)),
        other => Err(LoadError::UnknownConstKind(other)),
    }
}

fn read_function_body(
    cursor: &mut Cursor,
    names: &HashMap<String, TypeRef>,
) -> Result<FunctionSymbol, LoadError> {
    let name = cursor.read_string()?;
    let type_name = cursor.read_string()?;
    let function_type = resolve_name(&type_name, names)?;

    let _op_stack_size_from_stream = cursor.read_u8()?; // read and discarded, overridden to 20
    let num_vars = cursor.read_u8()? as usize;

    let mut vars = Vec::with_capacity(num_vars);
    for _ in 0..num_vars {
        vars.push(read_var_symbol(cursor, names)?);
    }

    let num_bytecodes = cursor.read_u8()? as usize;
    let bytecode = if num_bytecodes == 0 {
        Vec::new()
    } else {
        cursor.read_bytes(num_bytecodes)?.to_vec()
    };

    Ok(FunctionSymbol::new(name, function_type, vars, bytecode))
}

fn read_var_symbol(cursor: &mut Cursor, names: &HashMap<String, TypeRef>) -> Result<VarSymbol, LoadError> {
    let name = cursor.read_string()?;
    let type_name = cursor.read_string()?;
    let var_type = resolve_name(&type_name, names)?;
    Ok(VarSymbol::new(name, var_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ModuleWriter;

    #[test]
    fn missing_main_is_fatal() {
        let mut w = ModuleWriter::new();
        w.function("not_main", "void", 0, vec![], &[0xb1]);
        let bytes = w.finish();
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::MissingMain));
    }

    #[test]
    fn unknown_type_kind_is_fatal() {
        let mut bytes = Vec::new();
        bytes.push(5);
        bytes.extend_from_slice(b"types");
        bytes.push(1); // numTypes
        bytes.push(9); // unknown kind
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::UnknownTypeKind(9)));
    }

    #[test]
    fn truncated_stream_is_fatal() {
        let mut bytes = Vec::new();
        bytes.push(5);
        bytes.extend_from_slice(b"types");
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::UnexpectedEof));
    }

    #[test]
    fn loads_minimal_main() {
        let mut w = ModuleWriter::new();
        w.function("main", "void", 0, vec![], &[0xb1]);
        let bytes = w.finish();
        let module = load(&bytes).unwrap();
        assert_eq!(module.main().name, "main");
        assert_eq!(
            module.constants.get(0).unwrap().as_function().unwrap().name,
            "println"
        );
        assert_eq!(module.constants.get(1).unwrap().as_function().unwrap().name, "tick");
        assert_eq!(
            module.constants.get(2).unwrap().as_function().unwrap().name,
            "integer_to_string"
        );
    }

    #[test]
    fn user_type_resolves_and_is_addressable_by_name() {
        let mut w = ModuleWriter::new();
        w.simple_type("widget", vec!["any"]);
        w.function("main", "widget", 0, vec![], &[0xb1]);
        let bytes = w.finish();
        let module = load(&bytes).unwrap();
        assert_eq!(module.types[9].name(), "widget");
    }
}
