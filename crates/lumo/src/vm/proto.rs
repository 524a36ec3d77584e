//! Compiled function prototypes.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::vm::instruction::Instruction;

/// How a closure obtains one of its upvalue cells at construction time.
/// Descriptors are appended in first-use order during scope resolution and
/// never reshuffled; instructions refer to them by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpvalueDesc {
    /// Capture a local of the immediately enclosing function, identified by
    /// its register in the parent's activation.
    ParentLocal { register: u32, name: SmolStr },
    /// Re-capture an upvalue of the enclosing function.
    ParentUpvalue { index: u32, name: SmolStr },
}

impl UpvalueDesc {
    pub fn name(&self) -> &SmolStr {
        match self {
            UpvalueDesc::ParentLocal { name, .. } => name,
            UpvalueDesc::ParentUpvalue { name, .. } => name,
        }
    }
}

/// The unit of compilation: one function's instructions plus everything the
/// VM needs to instantiate and run closures of it. Immutable after codegen;
/// hosts may hold one and re-execute it.
#[derive(Debug)]
pub struct Prototype {
    pub instructions: Vec<Instruction>,
    /// Child prototypes, referenced by `Closure { proto }` indices.
    pub prototypes: Vec<Rc<Prototype>>,
    pub upvalues: Vec<UpvalueDesc>,
    pub param_count: u32,
    pub is_vararg: bool,
    /// Peak register use; frames pre-size their register file to this.
    pub max_registers: u32,
    pub source: SmolStr,
    pub first_line: u32,
    pub last_line: u32,
}
