//! Runtime: values, tables, prototypes, the state and the executor.

pub mod diagnostics;
pub mod error;
mod execute;
pub mod instruction;
pub mod proto;
pub mod state;
pub mod table;
pub mod value;

pub use error::{ErrorKind, LuaError, LuaResult};
pub use instruction::{ArithOp, CompareOp, Constant, Instruction};
pub use proto::{Prototype, UpvalueDesc};
pub use state::LuaState;
pub use table::{LuaKey, LuaTable};
pub use value::{LuaClosure, LuaStr, LuaValue, NativeFunction};
