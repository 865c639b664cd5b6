use clap::Parser;
use mylox::backend::vm::{InterpretResult, LogLevel, VirtualMachine};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use std::process::exit;

#[derive(Parser)]
#[command(name = "myloxc")]
#[command(version = "1.0")]
#[command(author = "Yuyang Feng && Zimeng Li")]
#[command(about = "Mylox: A bytecode compiler and garbage-collected VM for the Lox language", long_about = None)]
struct Cli {
    /// Script to run; starts a REPL when omitted
    script: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Release)]
    mode: LogLevel,

    /// Run the collector on every allocation (GC torture testing)
    #[arg(long)]
    gc_stress: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut vm = VirtualMachine::new();
    vm.init(cli.mode, cli.gc_stress);

    match cli.script {
        Some(path) => run_file(&mut vm, &path, cli.mode),
        None => repl(&mut vm),
    }
}

fn run_file(vm: &mut VirtualMachine, path: &PathBuf, mode: LogLevel) {
    if !path.exists() {
        eprintln!("[Error] Source file not found: {}", path.display());
        exit(1);
    }

    let source = fs::read_to_string(path).expect(&format!(
        "Critical: Failed to read source file at {}",
        path.display()
    ));

    if mode != LogLevel::Release {
        println!("[Mylox] Interpreting: {}", path.display());
    }

    let result = vm.interpret(&source);

    if mode != LogLevel::Release {
        println!(
            "[DEBUG] Max memory allocated during execution: {} bytes",
            vm.heap.max_allocated
        );
    }
    if mode == LogLevel::Trace {
        vm.dump_internal_state();
    }

    // UNIX 惯例：65 编译错误，70 运行时错误
    match result {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => exit(65),
        InterpretResult::RuntimeError => exit(70),
    }
}

fn repl(vm: &mut VirtualMachine) {
    let mut editor = DefaultEditor::new().expect("Critical: failed to initialize line editor");
    println!("Mylox REPL (Ctrl-D to exit)");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                // 同一个 VM 跑整个会话，globals 跨行存活；错误打印后继续
                vm.interpret(&line);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("[Error] readline failure: {}", err);
                break;
            }
        }
    }
}
