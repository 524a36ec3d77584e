/// End-to-end execution: the canonical scenarios, multi-return arities,
/// loop semantics and vararg plumbing.
use super::{as_int, as_str, assert_lua, eval, eval_ok, first};
use crate::LuaValue;

#[test]
fn arithmetic_scenario() {
    assert_eq!(as_int(&first(eval_ok("return 2 + 2"))), 4);
}

#[test]
fn fib_scenario() {
    let results = eval_ok(
        "function fib(n) if n < 2 then return n end return fib(n-1)+fib(n-2) end\n\
         return fib(10)",
    );
    assert_eq!(as_int(&results[0]), 55);
}

#[test]
fn counter_scenario() {
    let results = eval_ok(
        "local function make() local x = 0 return function() x = x + 1 return x end end\n\
         local c = make() c() c() return c()",
    );
    assert_eq!(as_int(&results[0]), 3);
}

#[test]
fn table_append_scenario() {
    let results = eval_ok("local t = {1,2,3} t[#t+1] = 4 return #t, t[4]");
    assert_eq!(as_int(&results[0]), 4);
    assert_eq!(as_int(&results[1]), 4);
}

#[test]
fn index_metamethod_scenario() {
    let results = eval_ok(
        "local a = setmetatable({}, {__index = function(_,k) return k..k end})\n\
         return a.x, a.yy",
    );
    assert_eq!(as_str(&results[0]), "xx");
    assert_eq!(as_str(&results[1]), "yyyy");
}

#[test]
fn pcall_scenario() {
    let results = eval_ok("local ok, err = pcall(function() error(\"boom\") end)\nreturn ok, err");
    assert!(matches!(results[0], LuaValue::Boolean(false)));
    assert!(as_str(&results[1]).contains("boom"));
}

#[test]
fn multi_return_arities() {
    for (body, expected_a, expected_b) in [
        ("return", "nil", "nil"),
        ("return 1", "1", "nil"),
        ("return 1, 2", "1", "2"),
        ("return 1, 2, 3", "1", "2"),
    ] {
        let source = format!(
            "local function f() {} end\nlocal a, b = f()\nreturn tostring(a), tostring(b)",
            body
        );
        let results = eval_ok(&source);
        assert_eq!(as_str(&results[0]), expected_a, "for {}", body);
        assert_eq!(as_str(&results[1]), expected_b, "for {}", body);
    }
}

#[test]
fn multi_return_positions() {
    // Last argument expands, earlier ones truncate.
    assert_lua(
        "local function two() return 1, 2 end\n\
         local function count(...) return select('#', ...) end\n\
         assert(count(two()) == 2)\n\
         assert(count(two(), two()) == 3)\n\
         assert(count((two())) == 1)",
    );
    // Last table-constructor field expands.
    assert_lua(
        "local function two() return 1, 2 end\n\
         local t = {two(), two()}\n\
         assert(#t == 3)\n\
         local u = {(two()), (two())}\n\
         assert(#u == 2)",
    );
    // Return forwards everything.
    assert_lua(
        "local function two() return 1, 2 end\n\
         local function fwd() return two() end\n\
         local a, b = fwd()\n\
         assert(a == 1 and b == 2)",
    );
}

#[test]
fn vararg_semantics() {
    assert_lua(
        "local function f(first, ...)\n\
            local count = select('#', ...)\n\
            local t = {...}\n\
            return first, count, t[count]\n\
         end\n\
         local a, n, last = f(10, 20, 30, 40)\n\
         assert(a == 10 and n == 3 and last == 40)",
    );
    assert_lua("local function f(...) return ... end assert(select('#', f()) == 0)");
}

#[test]
fn numeric_for_boundaries() {
    assert_lua(
        "local sum = 0 for i = 1, 5 do sum = sum + i end assert(sum == 15)",
    );
    // Ends exactly on the limit.
    assert_lua(
        "local last = nil for i = 1, 10, 3 do last = i end assert(last == 10)",
    );
    // Overshooting step stops before the limit.
    assert_lua(
        "local last = nil for i = 1, 10, 4 do last = i end assert(last == 9)",
    );
    // Negative step.
    assert_lua(
        "local t = {} for i = 3, 1, -1 do t[#t+1] = i end\n\
         assert(t[1] == 3 and t[3] == 1)",
    );
    // Zero-trip loop.
    assert_lua("for i = 2, 1 do error('never runs') end");
    // Float loop.
    assert_lua(
        "local n = 0 for i = 1.0, 2.0, 0.5 do n = n + 1 end assert(n == 3)",
    );
}

#[test]
fn numeric_for_step_zero_errors() {
    let err = eval("for i = 1, 10, 0 do end").unwrap_err();
    assert!(err.message().contains("'for' step is zero"));
}

#[test]
fn generic_for_over_pairs_and_ipairs() {
    assert_lua(
        "local t = {10, 20, 30, x = 1}\n\
         local sum = 0\n\
         for _, v in ipairs(t) do sum = sum + v end\n\
         assert(sum == 60)\n\
         local count = 0\n\
         for k in pairs(t) do count = count + 1 end\n\
         assert(count == 4)",
    );
    // ipairs stops at the first nil.
    assert_lua(
        "local t = {1, 2, nil, 4}\n\
         local n = 0\n\
         for _ in ipairs(t) do n = n + 1 end\n\
         assert(n == 2)",
    );
    // Iterator returning nil on the first call runs zero iterations.
    assert_lua(
        "for x in function() return nil end do error('never runs') end",
    );
}

#[test]
fn while_repeat_break() {
    assert_lua(
        "local n = 0 while n < 10 do n = n + 1 if n == 4 then break end end\n\
         assert(n == 4)",
    );
    // repeat's condition sees body locals.
    assert_lua(
        "local n = 0\n\
         repeat local done = n >= 3 n = n + 1 until done\n\
         assert(n == 4)",
    );
}

#[test]
fn if_elseif_else_chains() {
    assert_lua(
        "local function classify(n)\n\
            if n < 0 then return 'negative'\n\
            elseif n == 0 then return 'zero'\n\
            elseif n < 10 then return 'small'\n\
            else return 'large' end\n\
         end\n\
         assert(classify(-5) == 'negative')\n\
         assert(classify(0) == 'zero')\n\
         assert(classify(5) == 'small')\n\
         assert(classify(50) == 'large')",
    );
}

#[test]
fn short_circuit_evaluation() {
    assert_lua(
        "local calls = 0\n\
         local function bump() calls = calls + 1 return true end\n\
         local _ = false and bump()\n\
         assert(calls == 0)\n\
         local _ = true or bump()\n\
         assert(calls == 0)\n\
         assert((nil or 'fallback') == 'fallback')\n\
         assert((false and 1) == false)\n\
         assert((1 and 2) == 2)",
    );
}

#[test]
fn method_calls() {
    assert_lua(
        "local obj = {value = 41}\n\
         function obj:bump(n) self.value = self.value + n return self.value end\n\
         assert(obj:bump(1) == 42)",
    );
}

#[test]
fn integer_float_distinction() {
    assert_lua(
        "assert(1 == 1.0)\n\
         assert(math.type(1) == 'integer')\n\
         assert(math.type(1.0) == 'float')\n\
         assert(math.type(10 / 2) == 'float')\n\
         assert(math.type(7 // 2) == 'integer')\n\
         assert(7 // 2 == 3)\n\
         assert(-7 // 2 == -4)\n\
         assert(7 % -3 == -2)\n\
         assert(2^10 == 1024.0)",
    );
}

#[test]
fn integer_overflow_wraps() {
    assert_lua("assert(math.maxinteger + 1 == math.mininteger)");
    assert_lua("assert(math.mininteger - 1 == math.maxinteger)");
}

#[test]
fn string_number_coercion() {
    assert_lua(
        "assert('10' + 5 == 15)\n\
         assert('3' * '4' == 12)\n\
         assert(10 .. '' == '10')",
    );
}

#[test]
fn chunk_is_vararg() {
    assert!(eval("return ...").is_ok());
}

#[test]
fn deep_recursion_overflows_cleanly() {
    let err = eval("local function loop() return 1 + loop() end return loop()")
        .unwrap_err();
    assert!(err.message().contains("stack overflow"));
}
