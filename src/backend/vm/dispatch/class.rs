use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{GCObject, LoxClass, LoxString, LoxValue};

impl VirtualMachine {
    pub fn handle_class(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let class = self.heap.alloc_class(name);
        self.value_stack.push(LoxValue::Class(class));
        Ok(())
    }

    /// INHERIT: copy-down inheritance. The subclass starts with a snapshot
    /// of the superclass method table; later METHOD writes shadow it.
    pub fn handle_inherit(&mut self) -> Result<(), VMError> {
        let LoxValue::Class(superclass) = self.value_stack.peek(1) else {
            return Err(self.error(ErrorKind::TypeError(
                "Superclass must be a class.".to_string(),
            )));
        };
        let LoxValue::Class(subclass) = self.value_stack.peek(0) else {
            return Err(self.error(ErrorKind::InternalError(
                "LinkageError: INHERIT target is not a class".to_string(),
            )));
        };
        unsafe {
            // 自继承在编译期就被拒了，这里两个指针不可能相同
            let methods = &(*superclass).data.methods;
            (*subclass).data.methods.add_all_from(methods);
        }
        self.value_stack.pop();
        Ok(())
    }

    pub fn handle_method(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let method = self.value_stack.peek(0);
        let LoxValue::Class(class) = self.value_stack.peek(1) else {
            return Err(self.error(ErrorKind::InternalError(
                "LinkageError: METHOD target is not a class".to_string(),
            )));
        };
        unsafe {
            (*class).data.methods.set(name, method);
        }
        // 方法闭包弹掉，类留在栈上接收后续方法
        self.value_stack.pop();
        Ok(())
    }

    /// INVOKE: fused property-get + call. Skips the BoundMethod allocation
    /// unless a field shadows the method name.
    pub fn handle_invoke(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let argc = self.read_byte() as usize;

        let LoxValue::Instance(instance) = self.value_stack.peek(argc) else {
            return Err(self.error(ErrorKind::TypeError(
                "Only instances have methods.".to_string(),
            )));
        };

        // 字段可能存着可调用值并遮蔽同名方法，必须先查字段
        if let Some(field) = unsafe { (*instance).data.fields.get(name) } {
            let base = self.value_stack.len() - argc - 1;
            self.value_stack.values[base] = field;
            return self.call_value(field, argc);
        }

        let class = unsafe { (*instance).data.class };
        self.invoke_from_class(class, name, argc)
    }

    pub fn handle_super_invoke(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let argc = self.read_byte() as usize;
        let LoxValue::Class(superclass) = self.value_stack.pop() else {
            return Err(self.error(ErrorKind::InternalError(
                "LinkageError: 'super' slot does not hold a class".to_string(),
            )));
        };
        self.invoke_from_class(superclass, name, argc)
    }

    fn invoke_from_class(
        &mut self,
        class: *mut GCObject<LoxClass>,
        name: *mut GCObject<LoxString>,
        argc: usize,
    ) -> Result<(), VMError> {
        let method = unsafe { (*class).data.methods.get(name) };
        match method {
            Some(LoxValue::Closure(closure)) => self.call_closure(closure, argc),
            Some(_) => Err(self.error(ErrorKind::InternalError(
                "LinkageError: method table entry is not a closure".to_string(),
            ))),
            None => {
                let chars = unsafe { (*name).data.chars.clone() };
                Err(self.error(ErrorKind::UndefinedProperty(chars)))
            }
        }
    }

    /// Reads a method as a value: pairs the receiver on the stack top with
    /// the class's closure and leaves the BoundMethod in its place.
    pub fn bind_method(
        &mut self,
        class: *mut GCObject<LoxClass>,
        name: *mut GCObject<LoxString>,
    ) -> Result<(), VMError> {
        let method = unsafe { (*class).data.methods.get(name) };
        let closure = match method {
            Some(LoxValue::Closure(closure)) => closure,
            Some(_) => {
                return Err(self.error(ErrorKind::InternalError(
                    "LinkageError: method table entry is not a closure".to_string(),
                )));
            }
            None => {
                let chars = unsafe { (*name).data.chars.clone() };
                return Err(self.error(ErrorKind::UndefinedProperty(chars)));
            }
        };

        // receiver 先留在栈上给可能触发的收集当根，绑定完再换掉
        let receiver = self.value_stack.peek(0);
        let bound = self.heap.alloc_bound_method(receiver, closure);
        self.value_stack.pop();
        self.value_stack.push(LoxValue::Bound(bound));
        Ok(())
    }
}
