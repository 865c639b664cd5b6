use std::fmt;

#[derive(Debug, Clone)]
pub enum ErrorKind {
    // 类型错误：操作数类型不对，比如 1 + "a"
    TypeError(String),
    // 读写未定义的全局变量
    UndefinedVariable(String),
    // 实例/类上不存在的属性或方法
    UndefinedProperty(String),
    // 调用了不可调用的值
    InvalidCall(String),
    // 实参个数和形参不符
    ArityMismatch { expected: usize, got: usize },
    // 调用帧耗尽：递归太深
    StackOverflow,
    // 字节码损坏或 VM 自身 bug
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct VMError {
    pub kind: ErrorKind,
    // source line of the faulting instruction
    pub line: usize,
    // rendered call stack, most recent frame first
    pub traceback: Vec<String>,
}

impl VMError {
    pub fn get_message(&self) -> String {
        match &self.kind {
            ErrorKind::TypeError(m) => m.clone(),
            ErrorKind::UndefinedVariable(name) => {
                format!("Undefined variable '{}'.", name)
            }
            ErrorKind::UndefinedProperty(name) => {
                format!("Undefined property '{}'.", name)
            }
            ErrorKind::InvalidCall(m) => m.clone(),
            ErrorKind::ArityMismatch { expected, got } => {
                format!("Expected {} arguments but got {}.", expected, got)
            }
            ErrorKind::StackOverflow => "Stack overflow.".to_string(),
            ErrorKind::InternalError(m) => m.clone(),
        }
    }
}

impl fmt::Display for VMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_message())?;
        for frame in &self.traceback {
            write!(f, "\n{}", frame)?;
        }
        Ok(())
    }
}
