//! The register-machine instruction set.
//!
//! Control flow is tree-structured: loop and branch bodies are inline
//! instruction sequences, not jump targets. Operands are register indices
//! into the current activation, upvalue indices into the running closure,
//! or inline constants.
//!
//! Count conventions, shared by calls, returns, varargs and `SetList`:
//! `0` discards all values, a positive `n` means exactly n (padding with
//! nil), `-1` forwards all available values (the return case), `-2` expands
//! all values in place, raising the frame top. The executor treats `-1` and
//! `-2` identically; the generator keeps them distinct by position.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::vm::value::LuaStr;

/// Inline constant operand.
#[derive(Debug, Clone)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(Rc<LuaStr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    // Loads and moves
    LoadConstant { dest: u32, constant: Constant },
    LoadBoolean { dest: u32, value: bool },
    /// R[from..=to] := nil
    LoadNil { from: u32, to: u32 },
    Move { dest: u32, src: u32 },

    // Globals and upvalues
    GetGlobal { dest: u32, name: SmolStr },
    SetGlobal { name: SmolStr, src: u32 },
    GetUpvalue { dest: u32, index: u32 },
    SetUpvalue { index: u32, src: u32 },
    /// Read a captured local through its (open) cell.
    GetOpenUpvalue { dest: u32, register: u32 },
    SetOpenUpvalue { register: u32, src: u32 },
    /// Close open cells for registers at or above `from`, so the cells
    /// outlive the registers they aliased.
    CloseUpvalues { from: u32 },

    // Tables
    NewTable { dest: u32, array_hint: u32, hash_hint: u32 },
    GetTable { dest: u32, table: u32, key: u32 },
    SetTable { table: u32, key: u32, value: u32 },
    GetField { dest: u32, table: u32, name: SmolStr },
    SetField { table: u32, name: SmolStr, value: u32 },
    /// Bulk array fill: t[offset+1..] := R[start..start+count], with the
    /// count convention above.
    SetList { table: u32, start: u32, count: i32, offset: u32 },

    // Operators
    Arith { op: ArithOp, dest: u32, lhs: u32, rhs: u32 },
    Compare { op: CompareOp, dest: u32, lhs: u32, rhs: u32 },
    Not { dest: u32, src: u32 },
    Length { dest: u32, src: u32 },
    Negate { dest: u32, src: u32 },
    BitNot { dest: u32, src: u32 },
    Concatenate { dest: u32, lhs: u32, rhs: u32 },

    // Control flow
    Test {
        cond: u32,
        then_body: Vec<Instruction>,
        else_body: Vec<Instruction>,
    },
    /// `a and b`: if R[src] is truthy run `rhs_body` (which leaves its
    /// result in R[dest]), else R[dest] := R[src].
    TestAnd { dest: u32, src: u32, rhs_body: Vec<Instruction> },
    /// `a or b`: if R[src] is falsy run `rhs_body`, else R[dest] := R[src].
    TestOr { dest: u32, src: u32, rhs_body: Vec<Instruction> },
    WhileLoop {
        cond_body: Vec<Instruction>,
        cond: u32,
        body: Vec<Instruction>,
        /// Watermark for closing cells when `break` exits the loop.
        close: u32,
    },
    /// The condition runs inside the loop scope and may read locals
    /// declared in the body.
    RepeatLoop {
        body: Vec<Instruction>,
        cond_body: Vec<Instruction>,
        cond: u32,
        close: u32,
    },
    /// R[base..base+2] hold counter/limit/step; R[base+3] is the named
    /// iteration variable.
    NumericFor { base: u32, body: Vec<Instruction> },
    /// R[base..base+2] hold iterator/state/control; the loop variables
    /// live at R[base+3..base+3+nvars].
    GenericFor { base: u32, nvars: u32, body: Vec<Instruction> },
    Break,

    // Functions
    Closure { dest: u32, proto: u32 },
    /// R[base] is the callee, R[base+1..] the arguments; results are
    /// written back starting at R[base]. `name` is a static hint for stack
    /// traces when the callee expression names one.
    Call {
        base: u32,
        nargs: i32,
        nresults: i32,
        name: Option<SmolStr>,
    },
    /// `return f(...)`: perform the call and return all of its results.
    TailCall { base: u32, nargs: i32, name: Option<SmolStr> },
    /// Method-call prelude: R[base] := R[object][method], R[base+1] :=
    /// R[object].
    SelfPrep { base: u32, object: u32, method: SmolStr },
    Vararg { base: u32, count: i32 },
    Return { base: u32, count: i32 },

    /// Current line marker, emitted before each statement for stack traces.
    SourceLine { line: u32 },
}
