/// Embedding surface: chunk reuse, dotted paths, host functions, the
/// private side channel and the encoding contract.
use std::rc::Rc;

use super::{as_int, as_str, first};
use crate::api::HostValue;
use crate::vm::state::LuaState;
use crate::vm::value::LuaValue;

fn fresh() -> LuaState {
    let mut state = LuaState::new();
    state.open_libs();
    state
}

#[test]
fn load_chunk_then_eval_repeatedly() {
    let mut state = fresh();
    let chunk = state
        .load_chunk("counter = (counter or 0) + 1 return counter", "counter_chunk")
        .unwrap();
    assert_eq!(as_int(&first(state.eval_chunk(&chunk).unwrap())), 1);
    assert_eq!(as_int(&first(state.eval_chunk(&chunk).unwrap())), 2);
    assert_eq!(as_int(&first(state.eval_chunk(&chunk).unwrap())), 3);
}

#[test]
fn compile_errors_surface_before_execution() {
    let mut state = fresh();
    assert!(state.load_chunk("local = broken", "bad").is_err());
    assert!(state.load_chunk("if x then", "bad2").is_err());
}

#[test]
fn dotted_path_set_and_get() {
    let mut state = fresh();
    state
        .set("config.server.port", LuaValue::Integer(8080))
        .unwrap();
    // Intermediate tables were created.
    let results = state.eval("return config.server.port").unwrap();
    assert_eq!(as_int(&first(results)), 8080);
    assert_eq!(as_int(&state.get("config.server.port")), 8080);
    assert!(state.get("config.missing.deep").is_nil());
    state.set("top", LuaValue::str_from("plain")).unwrap();
    assert_eq!(as_str(&state.get("top")), "plain");
}

#[test]
fn register_and_call_host_functions() {
    let mut state = fresh();
    state
        .register_function("host.add", |l, args| {
            let a = args.first().and_then(|v| v.as_integer()).unwrap_or(0);
            let b = args.get(1).and_then(|v| v.as_integer()).unwrap_or(0);
            let _ = l;
            Ok(vec![LuaValue::Integer(a + b)])
        })
        .unwrap();
    // Callable from Lua...
    let results = state.eval("return host.add(2, 40)").unwrap();
    assert_eq!(as_int(&first(results)), 42);
    // ...and from the host by path.
    let results = state
        .call_function(
            "host.add",
            vec![LuaValue::Integer(1), LuaValue::Integer(2)],
        )
        .unwrap();
    assert_eq!(as_int(&first(results)), 3);
}

#[test]
fn call_lua_function_by_path() {
    let mut state = fresh();
    state
        .eval("greetings = {} function greetings.hello(name) return 'hi ' .. name end")
        .unwrap();
    let results = state
        .call_function("greetings.hello", vec![LuaValue::str_from("world")])
        .unwrap();
    assert_eq!(as_str(&first(results)), "hi world");
}

#[test]
fn host_function_errors_become_lua_errors() {
    let mut state = fresh();
    state
        .register_function("explode", |l, _args| l.runtime_error("host says no"))
        .unwrap();
    let results = state
        .eval("local ok, err = pcall(explode) return ok, err")
        .unwrap();
    assert!(matches!(results[0], LuaValue::Boolean(false)));
    assert!(as_str(&results[1]).contains("host says no"));
}

#[test]
fn private_side_channel_is_invisible_to_lua() {
    let mut state = fresh();
    state.put_private("token", LuaValue::str_from("secret"));
    assert_eq!(as_str(&state.get_private("token").unwrap()), "secret");
    // Nothing observable from Lua.
    let results = state.eval("return token, _G").unwrap();
    assert!(results[0].is_nil());
    let removed = state.delete_private("token").unwrap();
    assert_eq!(as_str(&removed), "secret");
    assert!(state.get_private("token").is_none());
}

#[test]
fn encode_decode_round_trips_primitives() {
    let mut state = fresh();
    let cases = [
        HostValue::Nil,
        HostValue::Boolean(true),
        HostValue::Integer(-7),
        HostValue::Float(2.5),
        HostValue::Str("text".to_string()),
    ];
    for case in cases {
        let encoded = state.encode(case).unwrap();
        let decoded = state.decode(&encoded).unwrap();
        let re_encoded = state.encode(decoded).unwrap();
        assert!(encoded.raw_equals(&re_encoded));
    }
}

#[test]
fn encode_decode_lists_and_maps() {
    let mut state = fresh();
    let list = HostValue::List(vec![
        HostValue::Integer(1),
        HostValue::Integer(2),
        HostValue::Str("three".to_string()),
    ]);
    let encoded = state.encode(list).unwrap();
    state.set_global("encoded", encoded.clone());
    let results = state
        .eval("return #encoded, encoded[1], encoded[3]")
        .unwrap();
    assert_eq!(as_int(&results[0]), 3);
    assert_eq!(as_int(&results[1]), 1);
    assert_eq!(as_str(&results[2]), "three");
    match state.decode(&encoded).unwrap() {
        HostValue::List(items) => assert_eq!(items.len(), 3),
        _ => panic!("expected list"),
    }

    let map = HostValue::Map(vec![
        ("name".to_string(), HostValue::Str("lumo".to_string())),
        ("version".to_string(), HostValue::Integer(1)),
    ]);
    let encoded = state.encode(map).unwrap();
    match state.decode(&encoded).unwrap() {
        HostValue::Map(entries) => {
            assert_eq!(entries.len(), 2);
            assert!(entries.iter().any(|(k, _)| k == "name"));
            assert!(entries.iter().any(|(k, _)| k == "version"));
        }
        _ => panic!("expected map"),
    }
}

#[test]
fn decoding_cycles_is_an_error() {
    let mut state = fresh();
    state.eval("cyclic = {} cyclic.me = cyclic").unwrap();
    let value = state.get("cyclic");
    assert!(state.decode(&value).is_err());
}

#[test]
fn userdata_round_trip() {
    let mut state = fresh();
    let payload: Rc<dyn std::any::Any> = Rc::new(String::from("opaque"));
    let value = state.alloc_userdata(payload);
    state.set_global("handle", value.clone());
    // Lua sees an opaque userdata.
    let results = state.eval("return type(handle)").unwrap();
    assert_eq!(as_str(&first(results)), "userdata");
    // The host gets the original allocation back.
    match state.decode(&value).unwrap() {
        HostValue::Userdata(data) => {
            let text = data.downcast_ref::<String>().expect("downcast");
            assert_eq!(text, "opaque");
        }
        _ => panic!("expected userdata"),
    }
}

#[test]
fn sandboxing_excludes_modules() {
    let mut state = LuaState::new();
    state.open_libs_except(&["os"]);
    let results = state.eval("return os").unwrap();
    assert!(first(results).is_nil());
    // Everything else still present.
    assert_eq!(
        as_int(&first(state.eval("return math.abs(-3)").unwrap())),
        3
    );
}

#[test]
fn states_are_independent() {
    let mut a = fresh();
    let mut b = fresh();
    a.eval("shared = 'from a'").unwrap();
    assert!(first(b.eval("return shared").unwrap()).is_nil());
}

#[test]
fn execute_convenience() {
    let results = crate::execute("return 1 + 1").unwrap();
    assert_eq!(as_int(&first(results)), 2);
}
