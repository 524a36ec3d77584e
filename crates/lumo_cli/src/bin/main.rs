use std::env;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};

use lumo::{LuaState, LuaValue};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = "Lumo 0.1 (Lua 5.3 compatible)";

fn print_usage() {
    eprintln!("usage: lumo [options] [script [args]]");
    eprintln!("Available options are:");
    eprintln!("  -e stat   execute string 'stat'");
    eprintln!("  -i        enter interactive mode after executing 'script'");
    eprintln!("  -v        show version information");
    eprintln!("  --        stop handling options");
    eprintln!("  -         stop handling options and execute stdin");
}

#[derive(Default)]
struct Options {
    execute_strings: Vec<String>,
    interactive: bool,
    script_file: Option<String>,
    script_args: Vec<String>,
    show_version: bool,
    read_stdin: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::default();
    let mut i = 1;
    let mut stop_options = false;

    while i < args.len() {
        let arg = &args[i];
        if !stop_options && arg.starts_with('-') && arg.len() > 1 {
            match arg.as_str() {
                "-e" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("'-e' needs argument".to_string());
                    }
                    opts.execute_strings.push(args[i].clone());
                }
                "-i" => opts.interactive = true,
                "-v" => opts.show_version = true,
                "--" => stop_options = true,
                _ => return Err(format!("unrecognized option '{}'", arg)),
            }
        } else if arg == "-" {
            opts.read_stdin = true;
            stop_options = true;
        } else {
            opts.script_file = Some(arg.clone());
            i += 1;
            while i < args.len() {
                opts.script_args.push(args[i].clone());
                i += 1;
            }
            break;
        }
        i += 1;
    }
    Ok(opts)
}

fn report_error(state: &LuaState, error: &lumo::LuaError) {
    let color = io::stderr().is_terminal();
    eprint!("{}", state.format_error(error, color));
}

fn print_results(results: &[LuaValue]) {
    if results.is_empty() {
        return;
    }
    let rendered: Vec<String> = results.iter().map(render_value).collect();
    println!("{}", rendered.join("\t"));
}

fn render_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Float(f) => lumo::vm::value::float_to_display(*f),
        LuaValue::Str(s) => s.to_string_lossy(),
        LuaValue::Table(id) => format!("table: 0x{:08x}", id),
        LuaValue::Function(_) | LuaValue::Native(_) => "function".to_string(),
        LuaValue::Userdata(id) => format!("userdata: 0x{:08x}", id),
    }
}

fn run_source(state: &mut LuaState, source: &str, name: &str, print: bool) -> bool {
    match state.eval_named(source, name) {
        Ok(results) => {
            if print {
                print_results(&results);
            }
            true
        }
        Err(error) => {
            report_error(state, &error);
            false
        }
    }
}

fn repl(state: &mut LuaState) {
    println!("{}", VERSION);
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Expression first, so `1+2` prints 3; fall back to statements.
        let as_expr = format!("return {}", trimmed);
        if state.load_chunk(&as_expr, "stdin").is_ok() {
            run_source(state, &as_expr, "stdin", true);
        } else {
            run_source(state, trimmed, "stdin", true);
        }
    }
}

fn install_arg_table(state: &mut LuaState, script: &str, script_args: &[String]) {
    let table = state.new_table();
    if let Some(id) = table.as_table_ref() {
        state
            .table_mut(id)
            .raw_set_int(0, LuaValue::str_from(script));
        for (i, arg) in script_args.iter().enumerate() {
            state
                .table_mut(id)
                .raw_set_int(i as i64 + 1, LuaValue::str_from(arg));
        }
    }
    state.set_global("arg", table);
}

fn main() {
    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("lumo: {}", message);
            print_usage();
            std::process::exit(1);
        }
    };

    if opts.show_version {
        println!("{}", VERSION);
        if opts.execute_strings.is_empty()
            && opts.script_file.is_none()
            && !opts.interactive
            && !opts.read_stdin
        {
            return;
        }
    }

    let mut state = LuaState::new();
    state.open_libs();

    for chunk in &opts.execute_strings {
        if !run_source(&mut state, chunk, "command line", false) {
            std::process::exit(1);
        }
    }

    if opts.read_stdin {
        let mut source = String::new();
        if io::stdin().read_to_string(&mut source).is_err() {
            eprintln!("lumo: cannot read stdin");
            std::process::exit(1);
        }
        if !run_source(&mut state, &source, "stdin", false) {
            std::process::exit(1);
        }
    } else if let Some(script) = &opts.script_file {
        let source = match fs::read_to_string(script) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("lumo: cannot open {}: {}", script, error);
                std::process::exit(1);
            }
        };
        install_arg_table(&mut state, script, &opts.script_args);
        if !run_source(&mut state, &source, script, false) {
            std::process::exit(1);
        }
    } else if opts.execute_strings.is_empty() && !opts.interactive && !opts.show_version {
        repl(&mut state);
        return;
    }

    if opts.interactive {
        repl(&mut state);
    }
}
