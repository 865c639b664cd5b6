// Mylox virtual machine
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
// Changelog:
// 2026-06-24: Finalized the VM data structures and core components;
//            call frames hold a closure, an instruction pointer and the base
//            of their value-stack window; the dispatch loop reads raw bytes
//            from the current chunk and routes them through the decoupled
//            `dispatch` module.
// 2026-06-26: Wired the heap's root walk into the VM (mark_roots) so the
//            collector sees the value stack, frame closures, the open-upvalue
//            list, globals and the interned "init" string.
// 2026-06-28: Error handling: VMError now carries the faulting source line
//            and a rendered stack traceback (most recent call first);
//            interpret() maps compile/runtime failures onto InterpretResult.
// 2026-07-01: Trace log level: per-instruction disassembly with a value-stack
//            dump, plus dump_internal_state for post-run inspection.

pub mod dispatch;
pub mod error;
pub mod heap;
pub mod stack;
mod std_lib;

use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::heap::{Heap, mark_object, mark_table, mark_value};
use crate::backend::vm::stack::{GlobalStack, StackFrame};
use crate::backend::vm::std_lib::native_clock;
use crate::common::chunk::Chunk;
use crate::common::object::{
    GCObject, HeaderOnly, LoxString, LoxValue, NativeFn, Upvalue,
};
use crate::common::opcode::OpCode;
use crate::common::table::Table;
use crate::frontend::compiler::compile;
use clap::ValueEnum;
use std::io::Write;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Release, // 仅输出程序结果
    Debug,   // 输出编译与 GC 诊断信息
    Trace,   // 额外逐指令反汇编并打印值栈
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

pub const FRAMES_MAX: usize = 64;
pub const STACK_MAX: usize = FRAMES_MAX * 256;

pub struct VirtualMachine {
    pub call_stack: Vec<StackFrame>,
    pub value_stack: GlobalStack,
    pub globals: Table,
    // 按栈槽降序排列的 open upvalue 链表头
    pub open_upvalues: *mut GCObject<Upvalue>,
    pub init_string: *mut GCObject<LoxString>,
    pub heap: Heap,
    pub log_level: LogLevel,
    stdout: Box<dyn Write>,
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self {
            call_stack: Vec::with_capacity(FRAMES_MAX),
            value_stack: GlobalStack::new(),
            globals: Table::new(),
            open_upvalues: std::ptr::null_mut(),
            init_string: std::ptr::null_mut(),
            heap: Heap::new(),
            log_level: LogLevel::Release,
            stdout: Box::new(std::io::stdout()),
        }
    }

    /// Second construction phase, run once the value has its final address:
    /// attaches the heap's root-walk back-reference, interns "init" and
    /// registers the native functions.
    pub fn init(&mut self, log_level: LogLevel, gc_stress: bool) {
        self.log_level = log_level;
        self.heap.stress = gc_stress;
        self.heap.log_gc = matches!(log_level, LogLevel::Debug | LogLevel::Trace);

        let vm_ptr: *const VirtualMachine = self;
        self.heap.vm = vm_ptr;

        self.init_string = self.heap.alloc_string_copy("init");
        self.load_standard_library();

        if matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
            println!("[DEBUG] VM initialization finished (gc_stress: {}).", gc_stress);
        }
    }

    /// Replaces the sink `print` writes to. Tests install a shared buffer.
    pub fn set_stdout(&mut self, sink: Box<dyn Write>) {
        self.stdout = sink;
    }

    pub fn load_standard_library(&mut self) {
        self.define_native("clock", native_clock);
    }

    fn define_native(&mut self, name: &str, function: NativeFn) {
        // 两个新对象先压栈再进 globals，中途的收集才能看到它们
        let name_obj = self.heap.alloc_string_copy(name);
        self.value_stack.push(LoxValue::Str(name_obj));
        let native = self.heap.alloc_native(function);
        self.value_stack.push(LoxValue::Native(native));

        self.globals.set(name_obj, LoxValue::Native(native));

        self.value_stack.pop();
        self.value_stack.pop();
    }

    /// Compiles and runs one source string against this VM's state.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        // the VM may have been moved since init(); refresh the back-reference
        let vm_ptr: *const VirtualMachine = self;
        self.heap.vm = vm_ptr;

        let function = match compile(source, &mut self.heap, self.log_level) {
            Ok(function) => function,
            Err(errors) => {
                for error in &errors {
                    eprintln!("{}", error);
                }
                return InterpretResult::CompileError;
            }
        };

        // root the fresh function across the closure allocation
        self.value_stack.push(LoxValue::Function(function));
        let closure = self.heap.alloc_closure(function);
        self.value_stack.pop();
        self.value_stack.push(LoxValue::Closure(closure));

        if let Err(error) = self
            .call_closure(closure, 0)
            .and_then(|_| self.run())
        {
            self.report_error(&error);
            self.reset();
            return InterpretResult::RuntimeError;
        }
        InterpretResult::Ok
    }

    pub fn run(&mut self) -> Result<(), VMError> {
        while !self.call_stack.is_empty() {
            if self.log_level == LogLevel::Trace {
                self.trace_instruction();
            }

            let byte = self.read_byte();
            let op = OpCode::from_byte(byte).ok_or_else(|| {
                self.error(ErrorKind::InternalError(format!(
                    "Unknown opcode {} (corrupted chunk)",
                    byte
                )))
            })?;
            self.execute_instruction(op)?;
        }
        Ok(())
    }

    // ---- operand readers ------------------------------------------------

    pub(crate) fn read_byte(&mut self) -> u8 {
        let frame = self.call_stack.last_mut().unwrap();
        let byte = unsafe { (&(*(*frame.closure).data.function).data.chunk.code)[frame.ip] };
        frame.ip += 1;
        byte
    }

    /// 16-bit big-endian operand.
    pub(crate) fn read_short(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    pub(crate) fn read_constant(&mut self) -> LoxValue {
        let idx = self.read_byte() as usize;
        unsafe {
            let frame = self.call_stack.last().unwrap();
            (&(*(*frame.closure).data.function).data.chunk.constants)[idx]
        }
    }

    pub(crate) fn read_string(&mut self) -> Result<*mut GCObject<LoxString>, VMError> {
        match self.read_constant() {
            LoxValue::Str(s) => Ok(s),
            other => Err(self.error(ErrorKind::InternalError(format!(
                "LinkageError: expected string constant, found '{}'",
                other
            )))),
        }
    }

    pub(crate) fn current_chunk(&self) -> &Chunk {
        let frame = self.call_stack.last().unwrap();
        unsafe { &(*(*frame.closure).data.function).data.chunk }
    }

    // ---- error plumbing -------------------------------------------------

    /// Captures the faulting line and a full traceback at the error site.
    pub fn error(&self, kind: ErrorKind) -> VMError {
        let mut traceback = Vec::new();
        for frame in self.call_stack.iter().rev() {
            unsafe {
                let function = &(*(*frame.closure).data.function).data;
                let line = function.chunk.lines[frame.ip.saturating_sub(1)];
                if function.name.is_null() {
                    traceback.push(format!("[line {}] in script", line));
                } else {
                    traceback.push(format!("[line {}] in {}()", line, (*function.name).data.chars));
                }
            }
        }
        let line = self
            .call_stack
            .last()
            .map(|frame| self.current_chunk().lines[frame.ip.saturating_sub(1)])
            .unwrap_or(0);
        VMError {
            kind,
            line,
            traceback,
        }
    }

    fn report_error(&self, error: &VMError) {
        eprintln!("{}", error);
    }

    /// Post-error cleanup: both stacks emptied, no upvalue left open.
    fn reset(&mut self) {
        self.value_stack.clear();
        self.call_stack.clear();
        self.open_upvalues = std::ptr::null_mut();
    }

    /// Forces a full collection. Goes through the VM so the heap's
    /// back-reference is fresh even if the VM value has been moved.
    pub fn collect_garbage(&mut self) {
        let vm_ptr: *const VirtualMachine = self;
        self.heap.vm = vm_ptr;
        self.heap.collect_garbage();
    }

    // ---- GC root walk (called by the heap during collection) ------------

    pub fn mark_roots(&self, gray: &mut Vec<*mut GCObject<HeaderOnly>>) {
        for value in &self.value_stack.values {
            mark_value(value, gray);
        }
        for frame in &self.call_stack {
            mark_object(frame.closure as *mut GCObject<HeaderOnly>, gray);
        }
        let mut upvalue = self.open_upvalues;
        while !upvalue.is_null() {
            mark_object(upvalue as *mut GCObject<HeaderOnly>, gray);
            upvalue = unsafe { (*upvalue).data.next_open };
        }
        mark_table(&self.globals.entries, gray);
        mark_object(self.init_string as *mut GCObject<HeaderOnly>, gray);
    }

    // ---- diagnostics ----------------------------------------------------

    fn trace_instruction(&self) {
        print!("          ");
        for value in &self.value_stack.values {
            print!("[ {} ]", value);
        }
        println!();
        let frame = self.call_stack.last().unwrap();
        self.current_chunk().disassemble_instruction(frame.ip);
    }

    pub fn dump_internal_state(&self) {
        let sep = "=".repeat(50);
        println!("\n{}", sep);
        println!("         VIRTUAL MACHINE INTERNAL STATE");
        println!("{}", sep);

        println!("\n[1. Globals]");
        for entry in &self.globals.entries {
            if !entry.key.is_null() {
                unsafe {
                    println!("  {} = {}", (*entry.key).data.chars, entry.value);
                }
            }
        }

        println!("\n[2. Call Stack]");
        if self.call_stack.is_empty() {
            println!("  (Stack is empty)");
        } else {
            for (depth, frame) in self.call_stack.iter().enumerate() {
                unsafe {
                    let function = &(*(*frame.closure).data.function).data;
                    let name = if function.name.is_null() {
                        "script"
                    } else {
                        (*function.name).data.chars.as_str()
                    };
                    println!(
                        "  Frame #{} -> {} (ip: {}, base slot: {})",
                        depth, name, frame.ip, frame.slots
                    );
                }
            }
        }

        println!("\n[3. Value Stack]");
        for (idx, value) in self.value_stack.values.iter().enumerate() {
            println!("  [{}] {}", idx, value);
        }

        println!("\n[4. Heap]");
        println!(
            "  {} bytes live, peak {} bytes",
            self.heap.total_allocated, self.heap.max_allocated
        );

        println!("{}\n", sep);
    }
}
