/// Parser tests: AST shapes, span invariants, precedence (checked both
/// structurally and behaviorally) and structured diagnostics.
use super::{as_int, eval_ok, first};
use crate::compiler::ast::{
    Block, Chunk, Expr, ExprKind, Stmt, StmtKind, TableField,
};
use crate::compiler::parse;
use crate::vm::error::{ErrorKind, LuaError, ParseErrorKind};

fn parse_ok(source: &str) -> Chunk {
    parse(source, "test").unwrap_or_else(|e| panic!("parse failed: {}", e))
}

fn parse_err(source: &str) -> LuaError {
    match parse(source, "test") {
        Ok(chunk) => panic!("expected parse error, got {:?}", chunk),
        Err(err) => err,
    }
}

#[test]
fn empty_chunk() {
    let chunk = parse_ok("");
    assert!(chunk.block.stmts.is_empty());
}

#[test]
fn local_and_assign_disambiguation() {
    let chunk = parse_ok("local a = 1\na = 2\na, b = 1, 2\nf()");
    assert!(matches!(chunk.block.stmts[0].kind, StmtKind::Local { .. }));
    assert!(matches!(chunk.block.stmts[1].kind, StmtKind::Assign { .. }));
    assert!(matches!(chunk.block.stmts[2].kind, StmtKind::Assign { .. }));
    assert!(matches!(chunk.block.stmts[3].kind, StmtKind::Call(_)));
}

#[test]
fn spans_cover_children() {
    fn check_block(block: &Block) {
        for stmt in &block.stmts {
            check_stmt(stmt);
        }
    }
    fn check_stmt(stmt: &Stmt) {
        assert!(stmt.span.start.offset <= stmt.span.end.offset);
        if let StmtKind::If {
            cond, then_block, ..
        } = &stmt.kind
        {
            assert!(stmt.span.covers(&cond.span));
            assert!(stmt.span.covers(&then_block.span));
        }
        if let StmtKind::Local { values, .. } = &stmt.kind {
            for value in values {
                assert!(stmt.span.covers(&value.span));
                check_expr(value);
            }
        }
    }
    fn check_expr(expr: &Expr) {
        if let ExprKind::BinOp { lhs, rhs, .. } = &expr.kind {
            assert!(expr.span.covers(&lhs.span));
            assert!(expr.span.covers(&rhs.span));
            check_expr(lhs);
            check_expr(rhs);
        }
    }
    let chunk = parse_ok(
        "local x = 1 + 2 * 3\nif x > 5 then x = x - 1 end\nlocal s = 'a' .. 'b' .. 'c'",
    );
    check_block(&chunk.block);
}

#[test]
fn precedence_structure() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let chunk = parse_ok("return 1 + 2 * 3");
    let StmtKind::Return { values } = &chunk.block.stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::BinOp { op, rhs, .. } = &values[0].kind else {
        panic!("expected binop");
    };
    assert_eq!(*op, crate::compiler::ast::BinOp::Add);
    assert!(matches!(rhs.kind, ExprKind::BinOp { .. }));
}

#[test]
fn precedence_behavior() {
    assert_eq!(as_int(&first(eval_ok("return 1 + 2 * 3"))), 7);
    assert_eq!(as_int(&first(eval_ok("return (1 + 2) * 3"))), 9);
    assert_eq!(as_int(&first(eval_ok("return 2 ^ 3 ^ 2"))), 512); // right assoc
    assert_eq!(as_int(&first(eval_ok("return -2 ^ 2"))), -4); // unary below pow
    assert_eq!(as_int(&first(eval_ok("return 1 | 2 & 3"))), 3);
    assert_eq!(as_int(&first(eval_ok("return 1 << 2 + 1"))), 8);
    let results = eval_ok("return 'a' .. 'b' == 'ab'");
    assert!(matches!(results[0], crate::LuaValue::Boolean(true)));
}

#[test]
fn concat_is_right_associative() {
    super::assert_lua("assert(('x' .. 'y' .. 'z') == 'xyz')");
}

#[test]
fn table_constructor_forms() {
    let chunk = parse_ok("local t = {1, 2; x = 3, ['y'] = 4, f(), }");
    let StmtKind::Local { values, .. } = &chunk.block.stmts[0].kind else {
        panic!("expected local");
    };
    let ExprKind::Table(fields) = &values[0].kind else {
        panic!("expected table");
    };
    assert_eq!(fields.len(), 5);
    assert!(matches!(fields[0], TableField::List(_)));
    assert!(matches!(fields[2], TableField::Record { .. }));
    assert!(matches!(fields[4], TableField::List(_)));
}

#[test]
fn function_syntaxes() {
    parse_ok("function f() end");
    parse_ok("function a.b.c() end");
    parse_ok("local function g(x, y) return x + y end");
    parse_ok("local h = function(...) return ... end");
    // Method form injects self.
    let chunk = parse_ok("function a.b:m(x) return self end");
    let StmtKind::FuncDecl {
        body, is_method, ..
    } = &chunk.block.stmts[0].kind
    else {
        panic!("expected function declaration");
    };
    assert!(*is_method);
    assert_eq!(body.params.len(), 2);
    assert_eq!(body.params[0].name, "self");
}

#[test]
fn vararg_marker() {
    let chunk = parse_ok("local f = function(a, ...) end");
    let StmtKind::Local { values, .. } = &chunk.block.stmts[0].kind else {
        panic!("expected local");
    };
    let ExprKind::Function(body) = &values[0].kind else {
        panic!("expected function");
    };
    assert!(body.is_vararg);
    assert_eq!(body.params.len(), 1);
}

#[test]
fn missing_end_reports_keyword() {
    let err = parse_err("if x then y = 1");
    match err.kind {
        ErrorKind::Parse(detail) => {
            assert!(matches!(detail.kind, ParseErrorKind::MissingKeyword("end")));
            assert!(!detail.expected.is_empty());
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn unclosed_paren_reports_group() {
    let err = parse_err("return (1 + 2");
    match err.kind {
        ErrorKind::Parse(detail) => {
            assert!(matches!(detail.kind, ParseErrorKind::UnclosedGroup("(")));
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn error_carries_position_and_found_token() {
    let err = parse_err("local = 5");
    assert_eq!(err.position.line, 1);
    match err.kind {
        ErrorKind::Parse(detail) => assert_eq!(detail.found, "'='"),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn return_must_end_block() {
    assert!(parse("return 1\nx = 2", "test").is_err());
    parse_ok("do return end x = 2");
}

#[test]
fn goto_and_labels_parse_but_do_not_compile() {
    // Data-model statements exist in the AST...
    let chunk = parse_ok("goto done\n::done::");
    assert!(matches!(chunk.block.stmts[0].kind, StmtKind::Goto(_)));
    assert!(matches!(chunk.block.stmts[1].kind, StmtKind::Label(_)));
    // ...but compilation rejects them.
    let err = crate::compiler::compile("goto done", "test").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Compile(_)));
}

#[test]
fn paren_truncates_multi_value() {
    let results = eval_ok(
        "local function two() return 1, 2 end\nlocal a, b = (two())\nreturn a, b",
    );
    assert_eq!(as_int(&results[0]), 1);
    assert!(results[1].is_nil());
}
