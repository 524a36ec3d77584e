/// Scope-resolution and prototype invariants: classification totality,
/// upvalue descriptor ordering, register bounds, vararg legality.
use crate::compiler::ast::{Block, Expr, ExprKind, Stmt, StmtKind, TableField};
use crate::compiler::resolver::{VarClass, resolve};
use crate::compiler::{compile, parse};
use crate::vm::error::ErrorKind;
use crate::vm::instruction::Instruction;
use crate::vm::proto::{Prototype, UpvalueDesc};

#[test]
fn every_var_occurrence_is_classified() {
    let source = "local a = g\nlocal function f() return a + g end\nreturn f, a, g";
    let chunk = parse(source, "test").unwrap();
    let scope = resolve(&chunk, "test").unwrap();

    fn count_vars_block(block: &Block) -> usize {
        block.stmts.iter().map(count_vars_stmt).sum()
    }
    fn count_vars_stmt(stmt: &Stmt) -> usize {
        match &stmt.kind {
            StmtKind::Local { values, .. } => values.iter().map(count_vars_expr).sum(),
            StmtKind::LocalFunc { body, .. } => count_vars_block(&body.block),
            StmtKind::Return { values } => values.iter().map(count_vars_expr).sum(),
            _ => 0,
        }
    }
    fn count_vars_expr(expr: &Expr) -> usize {
        match &expr.kind {
            ExprKind::Var(_) => 1,
            ExprKind::BinOp { lhs, rhs, .. } => {
                count_vars_expr(lhs) + count_vars_expr(rhs)
            }
            ExprKind::Function(body) => count_vars_block(&body.block),
            ExprKind::Table(fields) => fields
                .iter()
                .map(|f| match f {
                    TableField::List(v) => count_vars_expr(v),
                    TableField::Record { key, value } => {
                        count_vars_expr(key) + count_vars_expr(value)
                    }
                })
                .sum(),
            _ => 0,
        }
    }

    let expected = count_vars_block(&chunk.block);
    assert_eq!(scope.var_count(), expected);
}

#[test]
fn classification_kinds() {
    let source = "local a = 1\nlocal f = function() return a end\nreturn a, b";
    let chunk = parse(source, "test").unwrap();
    let scope = resolve(&chunk, "test").unwrap();

    // Find the chunk-level `return a, b` occurrences by span.
    let StmtKind::Return { values } = &chunk.block.stmts[2].kind else {
        panic!("expected return");
    };
    // `a` is captured by the inner function.
    assert!(matches!(
        scope.var_class(values[0].span),
        Some(VarClass::CapturedLocal(_))
    ));
    assert!(matches!(
        scope.var_class(values[1].span),
        Some(VarClass::Global(_))
    ));
}

#[test]
fn upvalue_descriptors_in_first_use_order() {
    let source = "
        local first = 1
        local second = 2
        local f = function() return second + first + second end
        return f
    ";
    let chunk = parse(source, "test").unwrap();
    let scope = resolve(&chunk, "test").unwrap();
    let StmtKind::Local { values, .. } = &chunk.block.stmts[2].kind else {
        panic!("expected local");
    };
    let ExprKind::Function(body) = &values[0].kind else {
        panic!("expected function");
    };
    let info = scope.func_info(body.span).expect("function info");
    // second used first, so its descriptor comes first; reuse keeps len 2.
    assert_eq!(info.upvalues.len(), 2);
    assert_eq!(info.upvalues[0].name().as_str(), "second");
    assert_eq!(info.upvalues[1].name().as_str(), "first");
    assert!(matches!(
        info.upvalues[0],
        UpvalueDesc::ParentLocal { .. }
    ));
}

#[test]
fn intermediate_functions_get_threaded_descriptors() {
    let source = "
        local x = 1
        local outer = function()
            return function() return x end
        end
        return outer
    ";
    let chunk = parse(source, "test").unwrap();
    let scope = resolve(&chunk, "test").unwrap();
    let StmtKind::Local { values, .. } = &chunk.block.stmts[1].kind else {
        panic!("expected local");
    };
    let ExprKind::Function(outer_body) = &values[0].kind else {
        panic!("expected function");
    };
    // The middle function carries a ParentLocal even though it never
    // mentions x itself.
    let outer_info = scope.func_info(outer_body.span).expect("outer info");
    assert_eq!(outer_info.upvalues.len(), 1);
    assert!(matches!(
        outer_info.upvalues[0],
        UpvalueDesc::ParentLocal { .. }
    ));
    let StmtKind::Return { values } = &outer_body.block.stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Function(inner_body) = &values[0].kind else {
        panic!("expected inner function");
    };
    let inner_info = scope.func_info(inner_body.span).expect("inner info");
    assert!(matches!(
        inner_info.upvalues[0],
        UpvalueDesc::ParentUpvalue { .. }
    ));
}

#[test]
fn blocks_release_registers() {
    let source = "
        do local a = 1 end
        local b = 2
        return b
    ";
    let chunk = parse(source, "test").unwrap();
    let scope = resolve(&chunk, "test").unwrap();
    let StmtKind::Do { body } = &chunk.block.stmts[0].kind else {
        panic!("expected do");
    };
    let StmtKind::Local { names: a_names, .. } = &body.stmts[0].kind else {
        panic!("expected inner local");
    };
    let StmtKind::Local { names: b_names, .. } = &chunk.block.stmts[1].kind else {
        panic!("expected outer local");
    };
    // b reuses a's released register.
    assert_eq!(
        scope.local_register(a_names[0].span),
        scope.local_register(b_names[0].span)
    );
}

#[test]
fn break_outside_loop_is_an_error() {
    let err = compile("break", "test").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Compile(_)));
    let err = compile("if x then break end", "test").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Compile(_)));
    // A function literal starts a fresh loop count, even inside a loop.
    let err = compile(
        "for i = 1, 3 do local f = function() break end end",
        "test",
    )
    .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Compile(_)));
    // Legal in every loop form, including nested blocks.
    assert!(compile("while true do break end", "test").is_ok());
    assert!(compile("repeat break until true", "test").is_ok());
    assert!(compile("for i = 1, 3 do break end", "test").is_ok());
    assert!(compile("for k in pairs({}) do break end", "test").is_ok());
    assert!(compile("while true do if x then break end end", "test").is_ok());
}

#[test]
fn vararg_outside_vararg_function_is_an_error() {
    let err = compile("local f = function() return ... end", "test").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Compile(_)));
    // The chunk itself is vararg.
    assert!(compile("return ...", "test").is_ok());
    assert!(compile("local f = function(...) return ... end", "test").is_ok());
}

#[test]
fn prototype_register_and_index_bounds() {
    let source = "
        local function helper(a, b)
            local c = a + b
            for i = 1, 10 do c = c + i end
            return function() return c end
        end
        local t = {helper(1, 2), x = helper(3, 4)}
        return t
    ";
    let proto = compile(source, "test").unwrap();
    check_proto(&proto);
}

fn check_proto(proto: &Prototype) {
    check_instrs(&proto.instructions, proto);
    for child in &proto.prototypes {
        check_proto(child);
    }
}

fn check_instrs(instrs: &[Instruction], proto: &Prototype) {
    for instr in instrs {
        for reg in instr_registers(instr) {
            assert!(
                reg < proto.max_registers,
                "register {} out of bounds (max {}) in {:?}",
                reg,
                proto.max_registers,
                instr
            );
        }
        match instr {
            Instruction::GetUpvalue { index, .. }
            | Instruction::SetUpvalue { index, .. } => {
                assert!((*index as usize) < proto.upvalues.len());
            }
            Instruction::Closure { proto: idx, .. } => {
                assert!((*idx as usize) < proto.prototypes.len());
            }
            _ => {}
        }
        for body in instr_bodies(instr) {
            check_instrs(body, proto);
        }
    }
}

fn instr_registers(instr: &Instruction) -> Vec<u32> {
    match instr {
        Instruction::LoadConstant { dest, .. }
        | Instruction::LoadBoolean { dest, .. }
        | Instruction::GetGlobal { dest, .. }
        | Instruction::GetUpvalue { dest, .. }
        | Instruction::Closure { dest, .. }
        | Instruction::NewTable { dest, .. } => vec![*dest],
        Instruction::LoadNil { from, to } => vec![*from, *to],
        Instruction::Move { dest, src }
        | Instruction::GetOpenUpvalue {
            dest,
            register: src,
        }
        | Instruction::SetOpenUpvalue {
            register: dest,
            src,
        }
        | Instruction::Not { dest, src }
        | Instruction::Length { dest, src }
        | Instruction::Negate { dest, src }
        | Instruction::BitNot { dest, src } => vec![*dest, *src],
        Instruction::SetGlobal { src, .. } | Instruction::SetUpvalue { src, .. } => {
            vec![*src]
        }
        Instruction::GetTable { dest, table, key } => vec![*dest, *table, *key],
        Instruction::SetTable { table, key, value } => vec![*table, *key, *value],
        Instruction::GetField { dest, table, .. } => vec![*dest, *table],
        Instruction::SetField { table, value, .. } => vec![*table, *value],
        Instruction::SetList { table, start, .. } => vec![*table, *start],
        Instruction::Arith { dest, lhs, rhs, .. }
        | Instruction::Compare { dest, lhs, rhs, .. }
        | Instruction::Concatenate { dest, lhs, rhs } => vec![*dest, *lhs, *rhs],
        Instruction::Test { cond, .. } => vec![*cond],
        Instruction::TestAnd { dest, src, .. }
        | Instruction::TestOr { dest, src, .. } => vec![*dest, *src],
        Instruction::WhileLoop { cond, .. } => vec![*cond],
        Instruction::RepeatLoop { cond, .. } => vec![*cond],
        Instruction::NumericFor { base, .. } => vec![*base, *base + 3],
        Instruction::GenericFor { base, nvars, .. } => vec![*base, *base + 2 + *nvars],
        Instruction::Call { base, .. } | Instruction::TailCall { base, .. } => {
            vec![*base]
        }
        // A zero-count return or vararg touches no registers; its base may
        // legitimately sit one past the register file.
        Instruction::Vararg { base, count } | Instruction::Return { base, count } => {
            if *count != 0 {
                vec![*base]
            } else {
                Vec::new()
            }
        }
        Instruction::SelfPrep { base, object, .. } => vec![*base, *base + 1, *object],
        Instruction::CloseUpvalues { .. }
        | Instruction::Break
        | Instruction::SourceLine { .. } => Vec::new(),
    }
}

fn instr_bodies(instr: &Instruction) -> Vec<&[Instruction]> {
    match instr {
        Instruction::Test {
            then_body,
            else_body,
            ..
        } => vec![then_body.as_slice(), else_body.as_slice()],
        Instruction::TestAnd { rhs_body, .. }
        | Instruction::TestOr { rhs_body, .. } => vec![rhs_body.as_slice()],
        Instruction::WhileLoop {
            cond_body, body, ..
        } => vec![cond_body.as_slice(), body.as_slice()],
        Instruction::RepeatLoop {
            body, cond_body, ..
        } => vec![body.as_slice(), cond_body.as_slice()],
        Instruction::NumericFor { body, .. }
        | Instruction::GenericFor { body, .. } => vec![body.as_slice()],
        _ => Vec::new(),
    }
}
