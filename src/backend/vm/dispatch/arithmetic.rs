use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::LoxValue;

impl VirtualMachine {
    /// ADD: numbers add, strings concatenate into a fresh interned string.
    pub fn handle_add(&mut self) -> Result<(), VMError> {
        match (self.value_stack.peek(1), self.value_stack.peek(0)) {
            (LoxValue::Number(a), LoxValue::Number(b)) => {
                self.value_stack.pop();
                self.value_stack.pop();
                self.value_stack.push(LoxValue::Number(a + b));
                Ok(())
            }
            (LoxValue::Str(a), LoxValue::Str(b)) => {
                // peek 不 pop：驻留分配可能触发收集，两个操作数必须留在栈上
                let combined = unsafe {
                    let mut s =
                        String::with_capacity((&(*a).data.chars).len() + (&(*b).data.chars).len());
                    s.push_str(&(*a).data.chars);
                    s.push_str(&(*b).data.chars);
                    s
                };
                let result = self.heap.alloc_string_take(combined);
                self.value_stack.pop();
                self.value_stack.pop();
                self.value_stack.push(LoxValue::Str(result));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "Operands must be two numbers or two strings.".to_string(),
            ))),
        }
    }

    pub fn handle_subtract(&mut self) -> Result<(), VMError> {
        self.handle_binary_op(|a, b| a - b)
    }

    pub fn handle_multiply(&mut self) -> Result<(), VMError> {
        self.handle_binary_op(|a, b| a * b)
    }

    pub fn handle_divide(&mut self) -> Result<(), VMError> {
        self.handle_binary_op(|a, b| a / b)
    }

    pub fn handle_not(&mut self) -> Result<(), VMError> {
        let value = self.value_stack.pop();
        self.value_stack.push(LoxValue::Boolean(value.is_falsey()));
        Ok(())
    }

    pub fn handle_negate(&mut self) -> Result<(), VMError> {
        let LoxValue::Number(n) = self.value_stack.peek(0) else {
            return Err(self.error(ErrorKind::TypeError(
                "Operand must be a number.".to_string(),
            )));
        };
        self.value_stack.pop();
        self.value_stack.push(LoxValue::Number(-n));
        Ok(())
    }

    fn handle_binary_op<F>(&mut self, op_fn: F) -> Result<(), VMError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match (self.value_stack.peek(1), self.value_stack.peek(0)) {
            (LoxValue::Number(a), LoxValue::Number(b)) => {
                self.value_stack.pop();
                self.value_stack.pop();
                self.value_stack.push(LoxValue::Number(op_fn(a, b)));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "Operands must be numbers.".to_string(),
            ))),
        }
    }
}
