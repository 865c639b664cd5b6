// Mylox bytecode instruction set.
// Opcodes are single bytes; operands follow inline in the chunk.
// 16 位操作数一律大端序（READ_SHORT）

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// push constants[idx8]
    Constant,
    /// push nil
    Nil,
    /// push true
    True,
    /// push false
    False,
    /// discard the top of the stack
    Pop,
    /// push frame.slots[slot8]
    GetLocal,
    /// frame.slots[slot8] = peek(0)
    SetLocal,
    /// push globals[name]; undefined name is a runtime error
    GetGlobal,
    /// globals[name] = peek(0); pop
    DefineGlobal,
    /// globals[name] = peek(0); error if the key was absent
    SetGlobal,
    /// push the value behind closure.upvalues[slot8]
    GetUpvalue,
    /// store peek(0) behind closure.upvalues[slot8]
    SetUpvalue,
    /// pop instance; push field or bound method
    GetProperty,
    /// instance.fields[name] = peek(0); pop value, pop instance, push value
    SetProperty,
    /// pop superclass; bind method on the instance below
    GetSuper,
    /// push a == b
    Equal,
    /// push a > b, numbers only
    Greater,
    /// push a < b, numbers only
    Less,
    /// numbers add, strings concatenate (interned)
    Add,
    Subtract,
    Multiply,
    Divide,
    /// push is_falsey(pop())
    Not,
    /// arithmetic negation, numbers only
    Negate,
    /// pop and print
    Print,
    /// ip += off16
    Jump,
    /// if peek(0) is falsey: ip += off16 （条件留在栈上，由编译器补 POP）
    JumpIfFalse,
    /// ip -= off16
    Loop,
    /// call the value at peek(argc8)
    Call,
    /// fused property-get + call: nameIdx, argc8
    Invoke,
    /// fused superclass method call: nameIdx, argc8
    SuperInvoke,
    /// wrap constants[funcIdx] in a closure; then one (is_local, index)
    /// byte pair per upvalue
    Closure,
    /// close the upvalue for the top slot, then pop
    CloseUpvalue,
    /// pop return value, close the frame's upvalues, pop the frame
    Return,
    /// push a new class named constants[nameIdx]
    Class,
    /// copy all methods from the superclass (under) into peek(0), pop
    Inherit,
    /// class.methods[name] = peek(0); pop the closure, keep the class
    Method,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        use OpCode::*;
        Some(match byte {
            0 => Constant,
            1 => Nil,
            2 => True,
            3 => False,
            4 => Pop,
            5 => GetLocal,
            6 => SetLocal,
            7 => GetGlobal,
            8 => DefineGlobal,
            9 => SetGlobal,
            10 => GetUpvalue,
            11 => SetUpvalue,
            12 => GetProperty,
            13 => SetProperty,
            14 => GetSuper,
            15 => Equal,
            16 => Greater,
            17 => Less,
            18 => Add,
            19 => Subtract,
            20 => Multiply,
            21 => Divide,
            22 => Not,
            23 => Negate,
            24 => Print,
            25 => Jump,
            26 => JumpIfFalse,
            27 => Loop,
            28 => Call,
            29 => Invoke,
            30 => SuperInvoke,
            31 => Closure,
            32 => CloseUpvalue,
            33 => Return,
            34 => Class,
            35 => Inherit,
            36 => Method,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use OpCode::*;
        match self {
            Constant => "OP_CONSTANT",
            Nil => "OP_NIL",
            True => "OP_TRUE",
            False => "OP_FALSE",
            Pop => "OP_POP",
            GetLocal => "OP_GET_LOCAL",
            SetLocal => "OP_SET_LOCAL",
            GetGlobal => "OP_GET_GLOBAL",
            DefineGlobal => "OP_DEFINE_GLOBAL",
            SetGlobal => "OP_SET_GLOBAL",
            GetUpvalue => "OP_GET_UPVALUE",
            SetUpvalue => "OP_SET_UPVALUE",
            GetProperty => "OP_GET_PROPERTY",
            SetProperty => "OP_SET_PROPERTY",
            GetSuper => "OP_GET_SUPER",
            Equal => "OP_EQUAL",
            Greater => "OP_GREATER",
            Less => "OP_LESS",
            Add => "OP_ADD",
            Subtract => "OP_SUBTRACT",
            Multiply => "OP_MULTIPLY",
            Divide => "OP_DIVIDE",
            Not => "OP_NOT",
            Negate => "OP_NEGATE",
            Print => "OP_PRINT",
            Jump => "OP_JUMP",
            JumpIfFalse => "OP_JUMP_IF_FALSE",
            Loop => "OP_LOOP",
            Call => "OP_CALL",
            Invoke => "OP_INVOKE",
            SuperInvoke => "OP_SUPER_INVOKE",
            Closure => "OP_CLOSURE",
            CloseUpvalue => "OP_CLOSE_UPVALUE",
            Return => "OP_RETURN",
            Class => "OP_CLASS",
            Inherit => "OP_INHERIT",
            Method => "OP_METHOD",
        }
    }
}
