use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{LoxValue, UpvalueState};

impl VirtualMachine {
    pub fn handle_constant(&mut self) -> Result<(), VMError> {
        let value = self.read_constant();
        self.value_stack.push(value);
        Ok(())
    }

    pub fn handle_nil(&mut self) -> Result<(), VMError> {
        self.value_stack.push(LoxValue::Nil);
        Ok(())
    }

    pub fn handle_true(&mut self) -> Result<(), VMError> {
        self.value_stack.push(LoxValue::Boolean(true));
        Ok(())
    }

    pub fn handle_false(&mut self) -> Result<(), VMError> {
        self.value_stack.push(LoxValue::Boolean(false));
        Ok(())
    }

    pub fn handle_pop(&mut self) -> Result<(), VMError> {
        self.value_stack.pop();
        Ok(())
    }

    pub fn handle_get_local(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let base = self.call_stack.last().unwrap().slots;
        let value = self.value_stack.values[base + slot];
        self.value_stack.push(value);
        Ok(())
    }

    pub fn handle_set_local(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let base = self.call_stack.last().unwrap().slots;
        // 赋值是表达式，值留在栈顶
        let value = self.value_stack.peek(0);
        self.value_stack.values[base + slot] = value;
        Ok(())
    }

    pub fn handle_get_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        match self.globals.get(name) {
            Some(value) => {
                self.value_stack.push(value);
                Ok(())
            }
            None => {
                let chars = unsafe { (*name).data.chars.clone() };
                Err(self.error(ErrorKind::UndefinedVariable(chars)))
            }
        }
    }

    pub fn handle_define_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let value = self.value_stack.peek(0);
        self.globals.set(name, value);
        self.value_stack.pop();
        Ok(())
    }

    pub fn handle_set_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let value = self.value_stack.peek(0);
        if self.globals.set(name, value) {
            // 赋值不隐式声明：插入成功说明原本没有这个键，撤销再报错
            self.globals.delete(name);
            let chars = unsafe { (*name).data.chars.clone() };
            return Err(self.error(ErrorKind::UndefinedVariable(chars)));
        }
        Ok(())
    }

    pub fn handle_get_upvalue(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let closure = self.call_stack.last().unwrap().closure;
        let upvalue = unsafe { (&(*closure).data.upvalues)[slot] };
        let value = unsafe {
            match (*upvalue).data.state {
                UpvalueState::Open(idx) => self.value_stack.values[idx],
                UpvalueState::Closed(value) => value,
            }
        };
        self.value_stack.push(value);
        Ok(())
    }

    pub fn handle_set_upvalue(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let value = self.value_stack.peek(0);
        let closure = self.call_stack.last().unwrap().closure;
        let upvalue = unsafe { (&(*closure).data.upvalues)[slot] };
        unsafe {
            match &mut (*upvalue).data.state {
                UpvalueState::Open(idx) => self.value_stack.values[*idx] = value,
                UpvalueState::Closed(slot_value) => *slot_value = value,
            }
        }
        Ok(())
    }

    pub fn handle_get_property(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let LoxValue::Instance(instance) = self.value_stack.peek(0) else {
            return Err(self.error(ErrorKind::TypeError(
                "Only instances have properties.".to_string(),
            )));
        };

        if let Some(value) = unsafe { (*instance).data.fields.get(name) } {
            self.value_stack.pop();
            self.value_stack.push(value);
            return Ok(());
        }

        // 不是字段就按方法绑定，receiver 还在栈顶
        let class = unsafe { (*instance).data.class };
        self.bind_method(class, name)
    }

    pub fn handle_set_property(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let LoxValue::Instance(instance) = self.value_stack.peek(1) else {
            return Err(self.error(ErrorKind::TypeError(
                "Only instances have fields.".to_string(),
            )));
        };

        let value = self.value_stack.peek(0);
        unsafe {
            (*instance).data.fields.set(name, value);
        }
        // value 留在栈顶，instance 被挤掉
        let value = self.value_stack.pop();
        self.value_stack.pop();
        self.value_stack.push(value);
        Ok(())
    }

    pub fn handle_get_super(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let LoxValue::Class(superclass) = self.value_stack.pop() else {
            return Err(self.error(ErrorKind::InternalError(
                "LinkageError: 'super' slot does not hold a class".to_string(),
            )));
        };
        self.bind_method(superclass, name)
    }
}
