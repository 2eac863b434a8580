//! The fully resolved, ready-to-execute program.

use crate::constant::ConstantPool;
use crate::symbol::FunctionSymbol;
use crate::types::Type;

/// A loaded module: type table, constant pool, and the resolved `main`
/// function. Every pointer/index inside is resolved by the time a `Module`
/// exists — no name lookups occur after loading.
#[derive(Debug, Clone)]
pub struct Module {
    pub types: Vec<Type>,
    pub constants: ConstantPool,
    /// Index into `constants` of the function constant whose symbol is `main`.
    main_const_index: usize,
}

impl Module {
    pub(crate) fn new(types: Vec<Type>, constants: ConstantPool, main_const_index: usize) -> Self {
        Self {
            types,
            constants,
            main_const_index,
        }
    }

    /// The module's entry point.
    pub fn main(&self) -> &FunctionSymbol {
        self.constants
            .get(self.main_const_index)
            .and_then(|c| c.as_function())
            .expect("main_const_index always references a function constant")
    }
}
