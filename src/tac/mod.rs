//! Three-address code (TAC) for parsed programs.
//!
//! Every instruction names at most one operator. Intermediate results live
//! in numbered temporaries (`t0`, `t1`, ...), control flow uses numbered
//! labels (`L0`, `L1`, ...) with `goto`, `ifFalse` and `if` jumps, and calls
//! pass their arguments with `param` before `call`. The listing is a
//! debugging view of how the evaluator sees a program; nothing executes it.

pub mod lower;
pub mod optimize;

use crate::ast::{BinaryOp, UnaryOp};
use std::fmt;

pub use lower::lower_program;
pub use optimize::optimize_program;

/// An instruction operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Const(i32),
    /// A source variable, renamed to `name.N` when it shadows an earlier one
    Name(String),
    Temp(usize),
}

/// A jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// dest = src
    Copy { dest: Operand, src: Operand },
    /// dest = left op right; never `&&` or `||`, which lower to jumps
    Binary {
        dest: Operand,
        left: Operand,
        op: BinaryOp,
        right: Operand,
    },
    /// dest = op operand
    Unary {
        dest: Operand,
        op: UnaryOp,
        operand: Operand,
    },
    Label(Label),
    Goto(Label),
    /// Jump when `cond` is zero
    IfFalse { cond: Operand, target: Label },
    /// Jump when `cond` is non-zero
    IfTrue { cond: Operand, target: Label },
    /// Push the next argument of the following call
    Param(Operand),
    /// dest = call function, argc
    Call {
        dest: Operand,
        function: String,
        argc: usize,
    },
    Return(Operand),
}

impl Instruction {
    /// The operand this instruction writes, if any
    pub fn dest(&self) -> Option<&Operand> {
        match self {
            Instruction::Copy { dest, .. }
            | Instruction::Binary { dest, .. }
            | Instruction::Unary { dest, .. }
            | Instruction::Call { dest, .. } => Some(dest),
            _ => None,
        }
    }

    fn dest_mut(&mut self) -> Option<&mut Operand> {
        match self {
            Instruction::Copy { dest, .. }
            | Instruction::Binary { dest, .. }
            | Instruction::Unary { dest, .. }
            | Instruction::Call { dest, .. } => Some(dest),
            _ => None,
        }
    }

    /// The operands this instruction reads
    pub fn uses(&self) -> Vec<&Operand> {
        match self {
            Instruction::Copy { src, .. } => vec![src],
            Instruction::Binary { left, right, .. } => vec![left, right],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::IfFalse { cond, .. } | Instruction::IfTrue { cond, .. } => vec![cond],
            Instruction::Param(value) | Instruction::Return(value) => vec![value],
            Instruction::Label(_) | Instruction::Goto(_) | Instruction::Call { .. } => Vec::new(),
        }
    }

    fn uses_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Instruction::Copy { src, .. } => vec![src],
            Instruction::Binary { left, right, .. } => vec![left, right],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::IfFalse { cond, .. } | Instruction::IfTrue { cond, .. } => vec![cond],
            Instruction::Param(value) | Instruction::Return(value) => vec![value],
            Instruction::Label(_) | Instruction::Goto(_) | Instruction::Call { .. } => Vec::new(),
        }
    }

    /// The label this instruction may jump to
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Instruction::Goto(target)
            | Instruction::IfFalse { target, .. }
            | Instruction::IfTrue { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// A lowered function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TacFunction {
    pub name: String,
    pub params: Vec<String>,
    pub code: Vec<Instruction>,
}

/// A lowered program; temporaries and labels are numbered program-wide
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TacProgram {
    pub functions: Vec<TacFunction>,
}

impl TacProgram {
    pub fn function(&self, name: &str) -> Option<&TacFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Total instruction count over all functions
    pub fn len(&self) -> usize {
        self.functions.iter().map(|f| f.code.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(n) => write!(f, "{}", n),
            Operand::Name(name) => write!(f, "{}", name),
            Operand::Temp(n) => write!(f, "t{}", n),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Copy { dest, src } => write!(f, "{} = {}", dest, src),
            Instruction::Binary { dest, left, op, right } => write!(f, "{} = {} {} {}", dest, left, op, right),
            Instruction::Unary { dest, op, operand } => write!(f, "{} = {}{}", dest, op, operand),
            Instruction::Label(label) => write!(f, "{}:", label),
            Instruction::Goto(label) => write!(f, "goto {}", label),
            Instruction::IfFalse { cond, target } => write!(f, "ifFalse {} goto {}", cond, target),
            Instruction::IfTrue { cond, target } => write!(f, "if {} goto {}", cond, target),
            Instruction::Param(value) => write!(f, "param {}", value),
            Instruction::Call { dest, function, argc } => write!(f, "{} = call {}, {}", dest, function, argc),
            Instruction::Return(value) => write!(f, "return {}", value),
        }
    }
}

impl fmt::Display for TacFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {}({}):", self.name, self.params.join(", "))?;
        for instruction in &self.code {
            match instruction {
                Instruction::Label(_) => writeln!(f, "{}", instruction)?,
                _ => writeln!(f, "    {}", instruction)?,
            }
        }
        writeln!(f, "end function {}", self.name)
    }
}

impl fmt::Display for TacProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}
