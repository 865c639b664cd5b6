use mylox::backend::vm::LogLevel;
use mylox::backend::vm::heap::Heap;
use mylox::common::chunk::Chunk;
use mylox::common::object::{GCObject, LoxFunction, LoxValue};
use mylox::common::opcode::OpCode;
use mylox::frontend::compiler::{CompileError, compile};

fn compile_ok(heap: &mut Heap, source: &str) -> *mut GCObject<LoxFunction> {
    compile(source, heap, LogLevel::Release).expect("program should compile")
}

fn compile_err(source: &str) -> Vec<CompileError> {
    let mut heap = Heap::new();
    compile(source, &mut heap, LogLevel::Release).expect_err("program should not compile")
}

fn first_error(source: &str) -> CompileError {
    compile_err(source).into_iter().next().unwrap()
}

/// Walks a chunk instruction by instruction, checking the structural
/// invariants: line table parallel to the code, constant operands in range,
/// jump targets inside the chunk. Recurses into nested function constants.
fn verify_chunk(chunk: &Chunk) {
    assert_eq!(chunk.lines.len(), chunk.code.len());
    assert!(chunk.constants.len() <= 256);

    let mut offset = 0;
    while offset < chunk.code.len() {
        let op = OpCode::from_byte(chunk.code[offset]).expect("undecodable opcode");
        use OpCode::*;
        offset = match op {
            Constant | GetGlobal | DefineGlobal | SetGlobal | GetProperty | SetProperty
            | GetSuper | Class | Method => {
                let idx = chunk.code[offset + 1] as usize;
                assert!(idx < chunk.constants.len(), "constant index out of range");
                offset + 2
            }
            GetLocal | SetLocal | GetUpvalue | SetUpvalue | Call => offset + 2,
            Invoke | SuperInvoke => {
                let idx = chunk.code[offset + 1] as usize;
                assert!(idx < chunk.constants.len(), "constant index out of range");
                offset + 3
            }
            Jump | JumpIfFalse => {
                let jump =
                    ((chunk.code[offset + 1] as usize) << 8) | chunk.code[offset + 2] as usize;
                assert!(offset + 3 + jump <= chunk.code.len(), "jump past end of chunk");
                offset + 3
            }
            Loop => {
                let jump =
                    ((chunk.code[offset + 1] as usize) << 8) | chunk.code[offset + 2] as usize;
                assert!(jump <= offset + 3, "loop jumps before start of chunk");
                offset + 3
            }
            Closure => {
                let idx = chunk.code[offset + 1] as usize;
                assert!(idx < chunk.constants.len(), "constant index out of range");
                let upvalue_count = match chunk.constants[idx] {
                    LoxValue::Function(f) => unsafe { (*f).data.upvalue_count },
                    _ => panic!("CLOSURE operand is not a function"),
                };
                offset + 2 + 2 * upvalue_count
            }
            _ => offset + 1,
        };
    }
    // operands never run off the end
    assert_eq!(offset, chunk.code.len());

    for constant in &chunk.constants {
        if let LoxValue::Function(f) = constant {
            verify_chunk(unsafe { &(**f).data.chunk });
        }
    }
}

#[test]
fn chunk_invariants_hold_for_representative_programs() {
    let sources = [
        "print 1 + 2 * 3;",
        "var a = 1; { var b = a; print b; }",
        "if (1 < 2) print \"t\"; else print \"f\";",
        "var i = 0; while (i < 10) { i = i + 1; }",
        "for (var i = 0; i < 10; i = i + 1) print i;",
        "fun f(a, b) { return a + b; } print f(1, 2);",
        "fun outer() { var x = 1; fun inner() { return x; } return inner; } outer()();",
        "class A { init(v) { this.v = v; } get() { return this.v; } }
         class B < A { get() { return super.get() + 1; } }
         print B(1).get();",
        "print true and false or nil;",
    ];
    for source in sources {
        let mut heap = Heap::new();
        let function = compile_ok(&mut heap, source);
        verify_chunk(unsafe { &(*function).data.chunk });
    }
}

#[test]
fn script_ends_with_implicit_nil_return() {
    let mut heap = Heap::new();
    let function = compile_ok(&mut heap, "print 1;");
    let chunk = unsafe { &(*function).data.chunk };
    let len = chunk.code.len();
    assert_eq!(chunk.code[len - 2], OpCode::Nil as u8);
    assert_eq!(chunk.code[len - 1], OpCode::Return as u8);
}

#[test]
fn initializer_implicitly_returns_slot_zero() {
    let mut heap = Heap::new();
    let function = compile_ok(&mut heap, "class C { init() {} }");
    let script = unsafe { &(*function).data.chunk };
    let init = script
        .constants
        .iter()
        .find_map(|c| match c {
            LoxValue::Function(f) => Some(unsafe { &(**f).data }),
            _ => None,
        })
        .expect("initializer function constant");
    let code = &init.chunk.code;
    let len = code.len();
    assert_eq!(code[len - 3], OpCode::GetLocal as u8);
    assert_eq!(code[len - 2], 0);
    assert_eq!(code[len - 1], OpCode::Return as u8);
}

#[test]
fn repeated_identifier_shares_one_constant() {
    let mut heap = Heap::new();
    let function = compile_ok(&mut heap, "var a = 1; a = 2; a = 3; print a;");
    let chunk = unsafe { &(*function).data.chunk };
    let name_entries = chunk
        .constants
        .iter()
        .filter(|c| c.as_str() == Some("a"))
        .count();
    assert_eq!(name_entries, 1);
}

#[test]
fn closure_records_its_upvalues() {
    let mut heap = Heap::new();
    let function = compile_ok(
        &mut heap,
        "fun makeCounter() {
             var n = 0;
             fun increment() { n = n + 1; return n; }
             return increment;
         }",
    );
    let script = unsafe { &(*function).data.chunk };
    let outer = script
        .constants
        .iter()
        .find_map(|c| match c {
            LoxValue::Function(f) => Some(unsafe { &(**f).data }),
            _ => None,
        })
        .expect("makeCounter constant");
    assert_eq!(outer.upvalue_count, 0);
    let inner = outer
        .chunk
        .constants
        .iter()
        .find_map(|c| match c {
            LoxValue::Function(f) => Some(unsafe { &(**f).data }),
            _ => None,
        })
        .expect("increment constant");
    assert_eq!(inner.upvalue_count, 1);
    assert_eq!(inner.arity, 0);
}

#[test]
fn constant_pool_overflow_is_reported() {
    let mut source = String::new();
    for i in 0..300 {
        source.push_str(&format!("print {};", i));
    }
    let errors = compile_err(&source);
    assert!(
        errors
            .iter()
            .any(|e| e.message.contains("Too many constants in one chunk.")),
        "missing overflow diagnostic: {:?}",
        errors
    );
}

#[test]
fn parameter_limit_is_reported() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));
    let errors = compile_err(&source);
    assert!(
        errors
            .iter()
            .any(|e| e.message.contains("Can't have more than 255 parameters.")),
        "missing arity diagnostic: {:?}",
        errors
    );
}

#[test]
fn error_messages_and_positions() {
    let cases = [
        ("var a = ;", "[line 1] Error at ';': Expect expression."),
        ("a + b = 3;", "[line 1] Error at '=': Invalid assignment target."),
        (
            "return 5;",
            "[line 1] Error at 'return': Can't return from top-level code.",
        ),
        (
            "print this;",
            "[line 1] Error at 'this': Can't use 'this' outside of a class.",
        ),
        (
            "print super.x;",
            "[line 1] Error at 'super': Can't use 'super' outside of a class.",
        ),
        (
            "class A { m() { print super.m(); } }",
            "[line 1] Error at 'super': Can't use 'super' in a class with no superclass.",
        ),
        ("class A < A {}", "[line 1] Error at 'A': A class can't inherit from itself."),
        (
            "{ var a = 1; var a = 2; }",
            "[line 1] Error at 'a': Already variable with this name in this scope.",
        ),
        (
            "{ var a = a; }",
            "[line 1] Error at 'a': Can't read local variable in its own initializer.",
        ),
        (
            "class C { init() { return 1; } }",
            "[line 1] Error at 'return': Can't return a value from an initializer.",
        ),
        ("var 1 = 2;", "[line 1] Error at '1': Expect variable name."),
        ("print \"abc;", "[line 1] Error: Unterminated string."),
        ("print @;", "[line 1] Error: Unexpected character."),
        ("(1 + 2", "[line 1] Error at end: Expect ')' after expression."),
    ];
    for (source, expected) in cases {
        let error = first_error(source);
        assert_eq!(error.message, expected, "for source: {}", source);
    }
}

#[test]
fn error_lines_follow_the_source() {
    let error = first_error("var ok = 1;\nvar bad = ;\n");
    assert_eq!(error.line, 2);
    assert!(error.message.starts_with("[line 2]"));
}

#[test]
fn panic_mode_suppresses_cascades_until_sync() {
    // both statements are broken; one diagnostic each, not a flood
    let errors = compile_err("var a = ;\nvar b = ;\n");
    assert_eq!(errors.len(), 2);
    assert!(errors[0].message.starts_with("[line 1]"));
    assert!(errors[1].message.starts_with("[line 2]"));
}

#[test]
fn disassembler_smoke() {
    let mut heap = Heap::new();
    let function = compile_ok(
        &mut heap,
        "fun f(x) { return x + 1; } print f(41);",
    );
    // exercises every operand format; panics on malformed output only
    unsafe {
        (*function).data.chunk.disassemble("script");
    }
}
