use crate::backend::vm::stack::StackFrame;
use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::FRAMES_MAX;
use crate::common::object::{GCObject, LoxClosure, LoxValue, Upvalue, UpvalueState};
use std::io::Write;

// open 链表里只可能有 open 状态的 upvalue
unsafe fn open_slot(upvalue: *mut GCObject<Upvalue>) -> usize {
    match unsafe { &(*upvalue).data.state } {
        UpvalueState::Open(slot) => *slot,
        UpvalueState::Closed(_) => unreachable!("closed upvalue on the open list"),
    }
}

impl VirtualMachine {
    pub fn handle_print(&mut self) -> Result<(), VMError> {
        let value = self.value_stack.pop();
        let outcome = writeln!(self.stdout, "{}", value);
        outcome.map_err(|e| {
            self.error(ErrorKind::InternalError(format!("I/O error on print: {}", e)))
        })
    }

    pub fn handle_jump(&mut self) -> Result<(), VMError> {
        let offset = self.read_short() as usize;
        self.call_stack.last_mut().unwrap().ip += offset;
        Ok(())
    }

    pub fn handle_jump_if_false(&mut self) -> Result<(), VMError> {
        let offset = self.read_short() as usize;
        // 条件值留在栈上，编译器决定何时 POP
        if self.value_stack.peek(0).is_falsey() {
            self.call_stack.last_mut().unwrap().ip += offset;
        }
        Ok(())
    }

    pub fn handle_loop(&mut self) -> Result<(), VMError> {
        let offset = self.read_short() as usize;
        self.call_stack.last_mut().unwrap().ip -= offset;
        Ok(())
    }

    pub fn handle_call(&mut self) -> Result<(), VMError> {
        let argc = self.read_byte() as usize;
        let callee = self.value_stack.peek(argc);
        self.call_value(callee, argc)
    }

    pub fn call_value(&mut self, callee: LoxValue, argc: usize) -> Result<(), VMError> {
        match callee {
            LoxValue::Bound(bound) => {
                // receiver 顶掉被调槽位，方法体里 slot 0 就是 this
                let (receiver, method) =
                    unsafe { ((*bound).data.receiver, (*bound).data.method) };
                let base = self.value_stack.len() - argc - 1;
                self.value_stack.values[base] = receiver;
                self.call_closure(method, argc)
            }
            LoxValue::Class(class) => {
                let instance = self.heap.alloc_instance(class);
                let base = self.value_stack.len() - argc - 1;
                self.value_stack.values[base] = LoxValue::Instance(instance);

                let initializer = unsafe { (*class).data.methods.get(self.init_string) };
                match initializer {
                    Some(LoxValue::Closure(closure)) => self.call_closure(closure, argc),
                    Some(_) => Err(self.error(ErrorKind::InternalError(
                        "LinkageError: initializer is not a closure".to_string(),
                    ))),
                    None if argc != 0 => Err(self.error(ErrorKind::ArityMismatch {
                        expected: 0,
                        got: argc,
                    })),
                    None => Ok(()),
                }
            }
            LoxValue::Closure(closure) => self.call_closure(closure, argc),
            LoxValue::Native(native) => {
                let function = unsafe { (*native).data.function };
                let top = self.value_stack.len();
                let result = function(argc, &self.value_stack.values[top - argc..top]);
                // 被调值加实参整段换成单个返回值
                self.value_stack.truncate(top - argc - 1);
                self.value_stack.push(result);
                Ok(())
            }
            _ => Err(self.error(ErrorKind::InvalidCall(
                "Can only call functions and classes.".to_string(),
            ))),
        }
    }

    pub fn call_closure(
        &mut self,
        closure: *mut GCObject<LoxClosure>,
        argc: usize,
    ) -> Result<(), VMError> {
        let arity = unsafe { (*(*closure).data.function).data.arity };
        if argc != arity {
            return Err(self.error(ErrorKind::ArityMismatch {
                expected: arity,
                got: argc,
            }));
        }
        if self.call_stack.len() == FRAMES_MAX {
            return Err(self.error(ErrorKind::StackOverflow));
        }
        let slots = self.value_stack.len() - argc - 1;
        self.call_stack.push(StackFrame::new(closure, slots));
        Ok(())
    }

    pub fn handle_closure(&mut self) -> Result<(), VMError> {
        let LoxValue::Function(function) = self.read_constant() else {
            return Err(self.error(ErrorKind::InternalError(
                "LinkageError: CLOSURE operand is not a function".to_string(),
            )));
        };
        let closure = self.heap.alloc_closure(function);
        // 先压栈：下面逐个捕获 upvalue 还会分配，闭包必须可达
        self.value_stack.push(LoxValue::Closure(closure));

        let count = unsafe { (*function).data.upvalue_count };
        for i in 0..count {
            let is_local = self.read_byte() == 1;
            let index = self.read_byte() as usize;
            let upvalue = if is_local {
                let base = self.call_stack.last().unwrap().slots;
                self.capture_upvalue(base + index)
            } else {
                let enclosing = self.call_stack.last().unwrap().closure;
                unsafe { (&(*enclosing).data.upvalues)[index] }
            };
            unsafe {
                (&mut (*closure).data.upvalues)[i] = upvalue;
            }
        }
        Ok(())
    }

    /// At most one open upvalue per stack slot: walk the descending list
    /// until the matching or a lower slot, reuse on an exact hit, otherwise
    /// splice a fresh open upvalue in at that position.
    fn capture_upvalue(&mut self, slot: usize) -> *mut GCObject<Upvalue> {
        let mut prev: *mut GCObject<Upvalue> = std::ptr::null_mut();
        let mut current = self.open_upvalues;
        unsafe {
            while !current.is_null() && open_slot(current) > slot {
                prev = current;
                current = (*current).data.next_open;
            }
            if !current.is_null() && open_slot(current) == slot {
                return current;
            }
        }

        let created = self.heap.alloc_upvalue(slot);
        unsafe {
            (*created).data.next_open = current;
            if prev.is_null() {
                self.open_upvalues = created;
            } else {
                (*prev).data.next_open = created;
            }
        }
        created
    }

    /// Closes every open upvalue at or above `last`: the stack value moves
    /// into the upvalue, which then leaves the open list.
    pub fn close_upvalues(&mut self, last: usize) {
        unsafe {
            while !self.open_upvalues.is_null() && open_slot(self.open_upvalues) >= last {
                let upvalue = self.open_upvalues;
                let value = self.value_stack.values[open_slot(upvalue)];
                (*upvalue).data.state = UpvalueState::Closed(value);
                self.open_upvalues = (*upvalue).data.next_open;
                (*upvalue).data.next_open = std::ptr::null_mut();
            }
        }
    }

    pub fn handle_close_upvalue(&mut self) -> Result<(), VMError> {
        self.close_upvalues(self.value_stack.len() - 1);
        self.value_stack.pop();
        Ok(())
    }

    pub fn handle_return(&mut self) -> Result<(), VMError> {
        let result = self.value_stack.pop();
        let frame = self.call_stack.pop().unwrap();
        // 帧窗口里还被捕获的槽位要在窗口消失前关闭
        self.close_upvalues(frame.slots);
        self.value_stack.truncate(frame.slots);
        if !self.call_stack.is_empty() {
            self.value_stack.push(result);
        }
        Ok(())
    }
}
