/// Error raising, protected calls, state preservation and report
/// formatting.
use super::{as_int, as_str, assert_lua, eval, eval_ok, first};
use crate::LuaValue;
use crate::vm::error::ErrorKind;
use crate::vm::state::LuaState;

#[test]
fn pcall_catches_divide_by_zero() {
    assert_lua(
        "local ok, err = pcall(function() return 1 // 0 end)\n\
         assert(ok == false)\n\
         assert(string.find(err, 'divide by zero') ~= nil)",
    );
    assert_lua(
        "local ok, err = pcall(function() return 1 % 0 end)\n\
         assert(ok == false)\n\
         assert(string.find(err, 'modulo by zero') ~= nil)",
    );
}

#[test]
fn float_division_by_zero_errors() {
    // This runtime raises instead of producing inf.
    let err = eval("return 1.0 / 0.0").unwrap_err();
    assert!(err.message().contains("divide by zero"));
}

#[test]
fn pcall_catches_type_errors() {
    assert_lua(
        "local ok, err = pcall(function() return nil + 1 end)\n\
         assert(ok == false)\n\
         assert(string.find(err, 'arithmetic') ~= nil)",
    );
    assert_lua(
        "local ok = pcall(function() local x = nil return x.field end)\n\
         assert(ok == false)",
    );
    assert_lua(
        "local ok = pcall(function() return {} < {} end)\n\
         assert(ok == false)",
    );
}

#[test]
fn pcall_returns_raised_values() {
    // String payloads pick up a position prefix.
    assert_lua(
        "local ok, err = pcall(function() error('boom') end)\n\
         assert(not ok)\n\
         assert(string.find(err, 'boom') ~= nil)",
    );
    // Non-string payloads pass through untouched.
    assert_lua(
        "local payload = {code = 7}\n\
         local ok, err = pcall(function() error(payload) end)\n\
         assert(not ok)\n\
         assert(err == payload)\n\
         assert(err.code == 7)",
    );
    assert_lua(
        "local ok, err = pcall(function() error(42) end)\n\
         assert(not ok and err == 42)",
    );
    // Level 0 suppresses the position prefix.
    assert_lua(
        "local ok, err = pcall(function() error('raw', 0) end)\n\
         assert(err == 'raw')",
    );
}

#[test]
fn pcall_success_passes_results_through() {
    assert_lua(
        "local ok, a, b = pcall(function() return 1, 2 end)\n\
         assert(ok == true and a == 1 and b == 2)",
    );
}

#[test]
fn pcall_preserves_mutations_made_before_the_error() {
    assert_lua(
        "local t = {}\n\
         local ok = pcall(function()\n\
            t.before = 'kept'\n\
            error('stop')\n\
            t.after = 'lost'\n\
         end)\n\
         assert(not ok)\n\
         assert(t.before == 'kept')\n\
         assert(t.after == nil)",
    );
}

#[test]
fn pcall_restores_the_call_stack() {
    // After a caught error, further calls work at full depth.
    assert_lua(
        "for _ = 1, 50 do\n\
            local ok = pcall(function() error('x') end)\n\
            assert(not ok)\n\
         end\n\
         local function depth(n) if n == 0 then return 0 end return 1 + depth(n-1) end\n\
         assert(depth(50) == 50)",
    );
}

#[test]
fn nested_pcall() {
    assert_lua(
        "local ok_outer, result = pcall(function()\n\
            local ok_inner, err = pcall(function() error('inner') end)\n\
            assert(not ok_inner)\n\
            return 'outer survived'\n\
         end)\n\
         assert(ok_outer and result == 'outer survived')",
    );
}

#[test]
fn xpcall_invokes_handler() {
    assert_lua(
        "local ok, handled = xpcall(function() error('oops') end, function(msg)\n\
            return 'handled: ' .. msg\n\
         end)\n\
         assert(ok == false)\n\
         assert(string.find(handled, 'handled: ') == 1)\n\
         assert(string.find(handled, 'oops') ~= nil)",
    );
    assert_lua(
        "local ok, v = xpcall(function() return 'fine' end, function() end)\n\
         assert(ok == true and v == 'fine')",
    );
}

#[test]
fn assert_raises_and_passes_through() {
    assert_lua("assert(assert(42) == 42)");
    let err = eval("assert(false)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Assertion(_)));
    assert!(err.message().contains("assertion failed!"));
    let err = eval("assert(nil, 'custom message')").unwrap_err();
    assert!(err.message().contains("custom message"));
}

#[test]
fn argument_errors_are_structured() {
    let err = eval("return string.rep('x')").unwrap_err();
    match &err.kind {
        ErrorKind::Argument(detail) => {
            assert_eq!(detail.function, "rep");
            assert_eq!(detail.arg, 2);
            assert_eq!(detail.expected, "number");
            assert_eq!(detail.got, "no value");
        }
        other => panic!("expected argument error, got {:?}", other),
    }
    assert!(err.message().contains("bad argument #2 to 'rep'"));
}

#[test]
fn errors_carry_position_and_traceback() {
    let err = eval("local function inner() error('deep') end\n\ninner()").unwrap_err();
    assert_eq!(err.source, "chunk");
    // error() raised on line 1, called from line 3.
    assert!(!err.traceback.is_empty());
    let outer_frame = &err.traceback[err.traceback.len() - 2];
    assert_eq!(outer_frame.line, 3);
}

#[test]
fn formatted_report_has_snippet_and_traceback() {
    let mut state = LuaState::new();
    state.open_libs();
    let err = state
        .eval_named("local x = 1\nreturn x + nil", "report_test")
        .unwrap_err();
    let report = state.format_error(&err, false);
    assert!(report.contains("Runtime Type Error"));
    assert!(report.contains("report_test:2"));
    assert!(report.contains("return x + nil"));
    assert!(report.contains("^"));
    assert!(report.contains("stack traceback:"));
    assert!(report.contains("in main chunk"));
    // No ANSI escapes without color.
    assert!(!report.contains('\x1b'));
    let colored = state.format_error(&err, true);
    assert!(colored.contains('\x1b'));
}

#[test]
fn suggestion_for_calling_nil() {
    let mut state = LuaState::new();
    state.open_libs();
    let err = state
        .eval_named("missing_function()", "suggest_test")
        .unwrap_err();
    let report = state.format_error(&err, false);
    assert!(report.contains("hint:"));
    assert!(report.contains("nil"));
}

#[test]
fn runtime_error_message_includes_location() {
    let err = eval("error('located')").unwrap_err();
    let message = err.message();
    assert!(message.contains("chunk:1:"));
    assert!(message.contains("located"));
}

#[test]
fn top_level_error_leaves_state_reusable() {
    let mut state = LuaState::new();
    state.open_libs();
    assert!(state.eval("error('first')").is_err());
    let results = state.eval("return 2 + 2").unwrap();
    assert_eq!(as_int(&first(results)), 4);
}

#[test]
fn error_payload_table_identity_via_rust() {
    let results = eval_ok(
        "local sentinel = {}\n\
         local ok, caught = pcall(error, sentinel)\n\
         return rawequal(caught, sentinel)",
    );
    assert!(matches!(results[0], LuaValue::Boolean(true)));
}

#[test]
fn pcall_of_noncallable_reports_not_raises() {
    let results = eval_ok("return pcall(5)");
    assert!(matches!(results[0], LuaValue::Boolean(false)));
    assert!(as_str(&results[1]).contains("attempt to call"));
}
