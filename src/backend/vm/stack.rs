/*
   值栈和调用栈帧
*/
use crate::backend::vm::STACK_MAX;
use crate::common::object::{GCObject, LoxClosure, LoxValue};

pub struct GlobalStack {
    pub values: Vec<LoxValue>,
}

impl GlobalStack {
    pub fn new() -> Self {
        Self {
            // 固定容量一次留足，open upvalue 记录的槽位索引在任何时刻都有效
            values: Vec::with_capacity(STACK_MAX),
        }
    }

    pub fn push(&mut self, value: LoxValue) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> LoxValue {
        self.values.pop().unwrap()
    }

    /// peek(0) is the top of the stack.
    pub fn peek(&self, distance: usize) -> LoxValue {
        self.values[self.values.len() - 1 - distance]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// One activation record: the closure being run, its instruction pointer and
/// the base of its window into the value stack. Slot 0 of the window holds
/// the callee (or the receiver for methods).
pub struct StackFrame {
    pub closure: *mut GCObject<LoxClosure>,
    pub ip: usize,
    pub slots: usize,
}

impl StackFrame {
    pub fn new(closure: *mut GCObject<LoxClosure>, slots: usize) -> Self {
        Self {
            closure,
            ip: 0,
            slots,
        }
    }
}
