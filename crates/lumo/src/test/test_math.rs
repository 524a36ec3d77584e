/// Math library: integer preservation, float functions, random ranges.
use super::{assert_lua, eval};

#[test]
fn abs_floor_ceil_preserve_integers() {
    assert_lua(
        "assert(math.abs(-5) == 5)\n\
         assert(math.type(math.abs(-5)) == 'integer')\n\
         assert(math.abs(-2.5) == 2.5)\n\
         assert(math.floor(3.7) == 3)\n\
         assert(math.type(math.floor(3.7)) == 'integer')\n\
         assert(math.floor(-3.5) == -4)\n\
         assert(math.ceil(3.2) == 4)\n\
         assert(math.ceil(-3.5) == -3)\n\
         assert(math.floor(7) == 7)",
    );
}

#[test]
fn sqrt_trig_exp_log() {
    assert_lua(
        "assert(math.sqrt(16) == 4.0)\n\
         assert(math.sin(0) == 0.0)\n\
         assert(math.cos(0) == 1.0)\n\
         assert(math.abs(math.sin(math.pi)) < 1e-10)\n\
         assert(math.exp(0) == 1.0)\n\
         assert(math.abs(math.log(math.exp(1)) - 1.0) < 1e-10)\n\
         assert(math.abs(math.log(8, 2) - 3.0) < 1e-10)\n\
         assert(math.abs(math.tan(0)) < 1e-10)\n\
         assert(math.abs(math.asin(1) - math.pi/2) < 1e-10)\n\
         assert(math.abs(math.acos(1)) < 1e-10)\n\
         assert(math.abs(math.atan(1) - math.pi/4) < 1e-10)",
    );
}

#[test]
fn min_max() {
    assert_lua(
        "assert(math.min(3, 1, 2) == 1)\n\
         assert(math.max(3, 1, 2) == 3)\n\
         assert(math.min(5) == 5)\n\
         assert(math.max(1.5, 2) == 2)",
    );
    assert!(eval("return math.min()").is_err());
}

#[test]
fn constants() {
    assert_lua(
        "assert(math.pi > 3.14 and math.pi < 3.15)\n\
         assert(math.huge > 1e300)\n\
         assert(math.maxinteger + 1 == math.mininteger)\n\
         assert(math.mininteger < 0 and math.maxinteger > 0)",
    );
}

#[test]
fn tointeger_and_type() {
    assert_lua(
        "assert(math.tointeger(3.0) == 3)\n\
         assert(math.type(math.tointeger(3.0)) == 'integer')\n\
         assert(math.tointeger(3.5) == nil)\n\
         assert(math.tointeger('x') == nil)\n\
         assert(math.type('not a number') == nil)",
    );
}

#[test]
fn fmod_and_modf() {
    assert_lua(
        "assert(math.fmod(7, 3) == 1.0)\n\
         assert(math.fmod(-7, 3) == -1.0)\n\
         local int, frac = math.modf(3.7)\n\
         assert(int == 3)\n\
         assert(math.abs(frac - 0.7) < 1e-10)",
    );
}

#[test]
fn random_ranges() {
    assert_lua(
        "math.randomseed(42)\n\
         for _ = 1, 100 do\n\
            local x = math.random()\n\
            assert(x >= 0 and x < 1)\n\
            local m = math.random(6)\n\
            assert(m >= 1 and m <= 6 and math.type(m) == 'integer')\n\
            local n = math.random(10, 20)\n\
            assert(n >= 10 and n <= 20)\n\
         end",
    );
    assert!(eval("return math.random(0)").is_err());
    assert!(eval("return math.random(5, 1)").is_err());
}

#[test]
fn randomseed_reproduces() {
    assert_lua(
        "math.randomseed(7)\n\
         local first = math.random(1000000)\n\
         math.randomseed(7)\n\
         assert(math.random(1000000) == first)",
    );
}
