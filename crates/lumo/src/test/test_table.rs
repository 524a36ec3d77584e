/// Table library and sequence-length semantics.
use super::{as_int, assert_lua, eval, eval_ok, first};

#[test]
fn length_is_largest_dense_prefix() {
    assert_lua(
        "assert(#{} == 0)\n\
         assert(#{1, 2, 3} == 3)\n\
         local t = {1, 2, 3}\n\
         t[5] = 5\n\
         assert(#t == 3)\n\
         t[4] = 4\n\
         assert(#t == 5)",
    );
}

#[test]
fn insert_appends_and_shifts() {
    assert_lua(
        "local t = {1, 2, 3}\n\
         table.insert(t, 4)\n\
         assert(#t == 4 and t[4] == 4)\n\
         table.insert(t, 1, 0)\n\
         assert(#t == 5 and t[1] == 0 and t[2] == 1 and t[5] == 4)",
    );
    assert!(eval("local t = {} table.insert(t, 5, 'x')").is_err());
}

#[test]
fn remove_returns_and_shifts() {
    assert_lua(
        "local t = {'a', 'b', 'c'}\n\
         assert(table.remove(t) == 'c')\n\
         assert(#t == 2)\n\
         assert(table.remove(t, 1) == 'a')\n\
         assert(#t == 1 and t[1] == 'b')\n\
         assert(table.remove({}) == nil)",
    );
}

#[test]
fn concat_with_separator_and_range() {
    assert_lua(
        "local t = {'a', 'b', 'c'}\n\
         assert(table.concat(t) == 'abc')\n\
         assert(table.concat(t, ',') == 'a,b,c')\n\
         assert(table.concat(t, '-', 2, 3) == 'b-c')\n\
         assert(table.concat({1, 2}, '+') == '1+2')\n\
         assert(table.concat({}) == '')",
    );
    let err = eval("return table.concat({{}, {}})").unwrap_err();
    assert!(err.message().contains("invalid value"));
}

#[test]
fn sort_default_and_comparator() {
    assert_lua(
        "local t = {3, 1, 2}\n\
         table.sort(t)\n\
         assert(t[1] == 1 and t[2] == 2 and t[3] == 3)\n\
         table.sort(t, function(a, b) return a > b end)\n\
         assert(t[1] == 3 and t[2] == 2 and t[3] == 1)\n\
         local words = {'pear', 'apple', 'orange'}\n\
         table.sort(words)\n\
         assert(words[1] == 'apple' and words[3] == 'pear')",
    );
}

#[test]
fn sort_is_stable() {
    assert_lua(
        "local t = {}\n\
         for i = 1, 20 do t[i] = {key = i % 3, seq = i} end\n\
         table.sort(t, function(a, b) return a.key < b.key end)\n\
         for i = 2, 20 do\n\
            local prev, cur = t[i-1], t[i]\n\
            assert(prev.key < cur.key or\n\
                   (prev.key == cur.key and prev.seq < cur.seq))\n\
         end",
    );
}

#[test]
fn sort_comparator_errors_propagate() {
    assert_lua(
        "local ok = pcall(table.sort, {3, 1, 2}, function() error('cmp') end)\n\
         assert(not ok)",
    );
}

#[test]
fn pack_and_unpack() {
    assert_lua(
        "local t = table.pack(10, 20, 30)\n\
         assert(t.n == 3 and t[1] == 10 and t[3] == 30)\n\
         local a, b, c = table.unpack({1, 2, 3})\n\
         assert(a == 1 and b == 2 and c == 3)\n\
         local x, y = table.unpack({1, 2, 3}, 2, 3)\n\
         assert(x == 2 and y == 3)\n\
         assert(select('#', table.unpack({})) == 0)",
    );
}

#[test]
fn move_including_overlap() {
    assert_lua(
        "local t = {1, 2, 3, 4, 5}\n\
         -- overlapping self-move forward\n\
         table.move(t, 1, 3, 2)\n\
         assert(t[1] == 1 and t[2] == 1 and t[3] == 2 and t[4] == 3 and t[5] == 5)\n\
         local src = {10, 20}\n\
         local dst = {}\n\
         local out = table.move(src, 1, 2, 1, dst)\n\
         assert(out == dst and dst[1] == 10 and dst[2] == 20)",
    );
}

#[test]
fn next_and_iteration_cover_all_entries() {
    assert_lua(
        "local t = {10, 20, x = 'a', y = 'b'}\n\
         local seen = 0\n\
         local k, v = next(t)\n\
         while k ~= nil do\n\
            seen = seen + 1\n\
            k, v = next(t, k)\n\
         end\n\
         assert(seen == 4)\n\
         assert(next({}) == nil)",
    );
}

#[test]
fn rawset_and_float_keys_normalize() {
    assert_lua(
        "local t = {}\n\
         t[1.0] = 'one'\n\
         assert(t[1] == 'one')\n\
         assert(rawget(t, 1) == 'one')",
    );
    let err = eval("local t = {} t[0/0] = 1").unwrap_err();
    // 0/0 errors before indexing in this runtime (division by zero).
    assert!(err.message().contains("divide by zero"));
    let err = eval("local t = {} local k t[k] = 1").unwrap_err();
    assert!(err.message().contains("table index is nil"));
}

#[test]
fn tables_compare_by_reference() {
    let results = eval_ok(
        "local a = {}\n\
         local b = {}\n\
         local c = a\n\
         return a == b, a == c, #([[x]])",
    );
    assert!(matches!(results[0], crate::LuaValue::Boolean(false)));
    assert!(matches!(results[1], crate::LuaValue::Boolean(true)));
    assert_eq!(as_int(&results[2]), 1);
}

#[test]
fn cyclic_tables_work() {
    assert_lua(
        "local t = {}\n\
         t.self = t\n\
         assert(t.self.self.self == t)\n\
         local a, b = {}, {}\n\
         a.other = b\n\
         b.other = a\n\
         assert(a.other.other == a)",
    );
}

#[test]
fn first_returns_nil_for_empty() {
    assert!(first(eval_ok("return nil")).is_nil());
}
