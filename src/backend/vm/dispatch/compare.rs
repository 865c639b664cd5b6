use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::LoxValue;

impl VirtualMachine {
    /// EQUAL works across all value kinds; heap objects compare by identity,
    /// interned strings therefore compare by contents.
    pub fn handle_equal(&mut self) -> Result<(), VMError> {
        let b = self.value_stack.pop();
        let a = self.value_stack.pop();
        self.value_stack.push(LoxValue::Boolean(a == b));
        Ok(())
    }

    pub fn handle_greater(&mut self) -> Result<(), VMError> {
        self.handle_compare(|a, b| a > b)
    }

    pub fn handle_less(&mut self) -> Result<(), VMError> {
        self.handle_compare(|a, b| a < b)
    }

    // 大小比较只对数字有定义
    fn handle_compare<F>(&mut self, op_fn: F) -> Result<(), VMError>
    where
        F: Fn(f64, f64) -> bool,
    {
        match (self.value_stack.peek(1), self.value_stack.peek(0)) {
            (LoxValue::Number(a), LoxValue::Number(b)) => {
                self.value_stack.pop();
                self.value_stack.pop();
                self.value_stack.push(LoxValue::Boolean(op_fn(a, b)));
                Ok(())
            }
            _ => Err(self.error(ErrorKind::TypeError(
                "Operands must be numbers.".to_string(),
            ))),
        }
    }
}
