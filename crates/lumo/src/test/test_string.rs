/// String library behavior, including format conversions and literal find.
use super::{as_int, as_str, assert_lua, eval, eval_ok, first};

#[test]
fn case_len_reverse() {
    assert_lua(
        "assert(string.lower('HeLLo') == 'hello')\n\
         assert(string.upper('HeLLo') == 'HELLO')\n\
         assert(string.len('hello') == 5)\n\
         assert(string.len('') == 0)\n\
         assert(string.reverse('abc') == 'cba')\n\
         assert(#'hello' == 5)",
    );
}

#[test]
fn sub_with_negatives_and_clamping() {
    assert_lua(
        "local s = 'hello world'\n\
         assert(string.sub(s, 1, 5) == 'hello')\n\
         assert(string.sub(s, 7) == 'world')\n\
         assert(string.sub(s, -5) == 'world')\n\
         assert(string.sub(s, 2, -2) == 'ello worl')\n\
         assert(string.sub(s, 0, 3) == 'hel')\n\
         assert(string.sub(s, 5, 2) == '')\n\
         assert(string.sub(s, 1, 100) == s)",
    );
}

#[test]
fn rep_with_separator() {
    assert_lua(
        "assert(string.rep('ab', 3) == 'ababab')\n\
         assert(string.rep('x', 3, '-') == 'x-x-x')\n\
         assert(string.rep('x', 0) == '')\n\
         assert(string.rep('x', -1) == '')",
    );
}

#[test]
fn byte_and_char() {
    assert_lua(
        "assert(string.byte('A') == 65)\n\
         local a, b, c = string.byte('abc', 1, 3)\n\
         assert(a == 97 and b == 98 and c == 99)\n\
         assert(string.byte('abc', -1) == 99)\n\
         assert(string.char(104, 105) == 'hi')\n\
         assert(string.char() == '')",
    );
    let err = eval("return string.char(256)").unwrap_err();
    assert!(err.message().contains("value out of range"));
}

#[test]
fn find_is_literal() {
    assert_lua(
        "local s = 'hello world'\n\
         local i, j = string.find(s, 'world')\n\
         assert(i == 7 and j == 11)\n\
         assert(string.find(s, 'xyz') == nil)\n\
         -- no pattern interpretation: the dot is literal\n\
         assert(string.find('a.c', '.') == 2)\n\
         assert(string.find('abc', 'b', 3) == nil)\n\
         local i2 = string.find('aXaX', 'X', 3)\n\
         assert(i2 == 4)\n\
         assert(string.find('abc', '') == 1)",
    );
}

#[test]
fn format_strings_and_integers() {
    assert_lua(
        "assert(string.format('%s', 'hi') == 'hi')\n\
         assert(string.format('%s=%d', 'n', 42) == 'n=42')\n\
         assert(string.format('%i', -7) == '-7')\n\
         assert(string.format('%5d', 42) == '   42')\n\
         assert(string.format('%-5d|', 42) == '42   |')\n\
         assert(string.format('%05d', 42) == '00042')\n\
         assert(string.format('%+d', 42) == '+42')\n\
         assert(string.format('%%') == '%')\n\
         assert(string.format('%x', 255) == 'ff')\n\
         assert(string.format('%X', 255) == 'FF')\n\
         assert(string.format('%o', 8) == '10')\n\
         assert(string.format('%c', 65) == 'A')",
    );
}

#[test]
fn format_integer_precision_zero_fills() {
    assert_lua(
        "assert(string.format('%.5d', 3) == '00003')\n\
         assert(string.format('%.3d', -7) == '-007')\n\
         assert(string.format('%.2d', 12345) == '12345')\n\
         assert(string.format('%.4x', 255) == '00ff')\n\
         assert(string.format('%.4X', 255) == '00FF')\n\
         assert(string.format('%.3o', 8) == '010')\n\
         assert(string.format('%.4u', 9) == '0009')\n\
         assert(string.format('%8.5d', 3) == '   00003')",
    );
}

#[test]
fn format_floats() {
    assert_lua(
        "assert(string.format('%f', 1.5) == '1.500000')\n\
         assert(string.format('%.2f', 3.14159) == '3.14')\n\
         assert(string.format('%.0f', 2.7) == '3')\n\
         assert(string.format('%e', 1500.0) == '1.500000e+03')\n\
         assert(string.format('%.1e', 0.025) == '2.5e-02')\n\
         assert(string.format('%g', 0.5) == '0.5')\n\
         assert(string.format('%g', 100000000.0) == '1e+08')",
    );
}

#[test]
fn format_q_quotes() {
    let results = eval_ok(r#"return string.format('%q', 'he said "hi"\n')"#);
    let quoted = as_str(&first(results));
    assert!(quoted.starts_with('"'));
    assert!(quoted.contains("\\\""));
    assert!(quoted.contains("\\n"));
}

#[test]
fn format_s_precision_truncates() {
    assert_lua("assert(string.format('%.3s', 'abcdef') == 'abc')");
}

#[test]
fn numbers_coerce_to_strings_in_string_functions() {
    assert_lua("assert(string.len(123) == 3)");
    let results = eval_ok("return string.upper(1.5)");
    assert_eq!(as_str(&first(results)), "1.5");
}

#[test]
fn byte_strings_survive_escapes() {
    // \t decodes to one byte; the unrecognized \0 stays as backslash+0.
    let results = eval_ok("return #'\\0\\t'");
    assert_eq!(as_int(&first(results)), 3);
    let results = eval_ok("return string.byte('\\t')");
    assert_eq!(as_int(&first(results)), 9);
}
