//! Peephole cleanup of lowered functions.
//!
//! The passes run to a fixed point:
//! - constant folding, including branches on constants, with temporaries
//!   that hold a single constant substituted into their uses
//! - merging `tN = ...; x = tN` into `x = ...`
//! - dropping `x = x`, code after `goto`/`return`, jumps to the next
//!   instruction, and labels nothing jumps to
//!
//! Division or remainder by a zero constant is left in place so the program
//! still fails where the evaluator would.

use super::{Instruction, Label, Operand, TacFunction, TacProgram};
use crate::interpreter::{Value, evaluate_binary_op, evaluate_unary_op};
use std::collections::{HashMap, HashSet};

/// Optimize every function in place; returns the number of instructions removed
pub fn optimize_program(program: &mut TacProgram) -> usize {
    let removed: usize = program.functions.iter_mut().map(optimize_function).sum();
    log::debug!("peephole pass removed {} instructions", removed);
    removed
}

/// Optimize one function in place; returns the number of instructions removed
pub fn optimize_function(function: &mut TacFunction) -> usize {
    let before = function.code.len();
    let code = &mut function.code;

    loop {
        let mut changed = fold_constants(code);
        changed |= merge_temp_copies(code);
        changed |= remove_self_copies(code);
        changed |= remove_unreachable(code);
        changed |= remove_jumps_to_next(code);
        changed |= remove_unused_labels(code);
        if !changed {
            break;
        }
    }

    log::trace!("optimized {}: {} -> {} instructions", function.name, before, function.code.len());
    before - function.code.len()
}

#[derive(Debug, Default)]
struct TempUsage {
    defs: usize,
    uses: usize,
}

fn temp_usage(code: &[Instruction]) -> HashMap<usize, TempUsage> {
    let mut usage: HashMap<usize, TempUsage> = HashMap::new();
    for instruction in code {
        if let Some(Operand::Temp(t)) = instruction.dest() {
            usage.entry(*t).or_default().defs += 1;
        }
        for operand in instruction.uses() {
            if let Operand::Temp(t) = operand {
                usage.entry(*t).or_default().uses += 1;
            }
        }
    }
    usage
}

/// Keep the instructions whose flag is set; returns whether any were dropped
fn retain_flagged(code: &mut Vec<Instruction>, keep: &[bool]) -> bool {
    let before = code.len();
    let mut flags = keep.iter();
    code.retain(|_| flags.next().copied().unwrap_or(true));
    code.len() != before
}

/// `None` keeps the instruction; `Some(None)` removes it
fn fold(instruction: &Instruction) -> Option<Option<Instruction>> {
    match instruction {
        Instruction::Binary {
            dest,
            left: Operand::Const(a),
            op,
            right: Operand::Const(b),
        } => {
            let value = evaluate_binary_op(Value(*a), *op, Value(*b)).ok()?;
            Some(Some(Instruction::Copy {
                dest: dest.clone(),
                src: Operand::Const(value.0),
            }))
        }
        Instruction::Unary {
            dest,
            op,
            operand: Operand::Const(n),
        } => Some(Some(Instruction::Copy {
            dest: dest.clone(),
            src: Operand::Const(evaluate_unary_op(*op, Value(*n)).0),
        })),
        Instruction::IfFalse {
            cond: Operand::Const(n),
            target,
        } => Some((*n == 0).then_some(Instruction::Goto(*target))),
        Instruction::IfTrue {
            cond: Operand::Const(n),
            target,
        } => Some((*n != 0).then_some(Instruction::Goto(*target))),
        _ => None,
    }
}

/// Fold constant operations in one forward pass, substituting temporaries
/// that are written once with a constant into their later uses
fn fold_constants(code: &mut Vec<Instruction>) -> bool {
    let usage = temp_usage(code);
    let mut constants: HashMap<usize, i32> = HashMap::new();
    let mut changed = false;
    let mut folded = Vec::with_capacity(code.len());

    for mut instruction in code.drain(..) {
        for operand in instruction.uses_mut() {
            if let Operand::Temp(t) = *operand {
                if let Some(&n) = constants.get(&t) {
                    *operand = Operand::Const(n);
                    changed = true;
                }
            }
        }

        let instruction = match fold(&instruction) {
            None => instruction,
            Some(None) => {
                changed = true;
                continue;
            }
            Some(Some(replacement)) => {
                changed = true;
                replacement
            }
        };

        if let Instruction::Copy {
            dest: Operand::Temp(t),
            src: Operand::Const(n),
        } = &instruction
        {
            if usage.get(t).is_some_and(|u| u.defs == 1) {
                constants.insert(*t, *n);
                changed = true;
                continue;
            }
        }
        folded.push(instruction);
    }

    *code = folded;
    changed
}

fn merge_temp_copies(code: &mut Vec<Instruction>) -> bool {
    let usage = temp_usage(code);
    let mut keep = vec![true; code.len()];

    let mut i = 0;
    while i + 1 < code.len() {
        let merged = match (code[i].dest(), &code[i + 1]) {
            (
                Some(Operand::Temp(t)),
                Instruction::Copy {
                    dest,
                    src: Operand::Temp(s),
                },
            ) if t == s && usage.get(t).is_some_and(|u| u.defs == 1 && u.uses == 1) => Some(dest.clone()),
            _ => None,
        };

        match merged {
            Some(dest) => {
                if let Some(slot) = code[i].dest_mut() {
                    *slot = dest;
                }
                keep[i + 1] = false;
                i += 2;
            }
            None => i += 1,
        }
    }

    retain_flagged(code, &keep)
}

fn remove_self_copies(code: &mut Vec<Instruction>) -> bool {
    let before = code.len();
    code.retain(|instruction| !matches!(instruction, Instruction::Copy { dest, src } if dest == src));
    code.len() != before
}

fn remove_unreachable(code: &mut Vec<Instruction>) -> bool {
    let mut reachable = true;
    let keep: Vec<bool> = code
        .iter()
        .map(|instruction| {
            if let Instruction::Label(_) = instruction {
                reachable = true;
            }
            let keep = reachable;
            if matches!(instruction, Instruction::Goto(_) | Instruction::Return(_)) {
                reachable = false;
            }
            keep
        })
        .collect();
    retain_flagged(code, &keep)
}

fn remove_jumps_to_next(code: &mut Vec<Instruction>) -> bool {
    let keep: Vec<bool> = code
        .iter()
        .zip(code.iter().skip(1).map(Some).chain(std::iter::once(None)))
        .map(|(instruction, next)| match (instruction.jump_target(), next) {
            (Some(target), Some(Instruction::Label(label))) => target != *label,
            _ => true,
        })
        .collect();
    retain_flagged(code, &keep)
}

fn remove_unused_labels(code: &mut Vec<Instruction>) -> bool {
    let targets: HashSet<Label> = code.iter().filter_map(Instruction::jump_target).collect();
    let before = code.len();
    code.retain(|instruction| !matches!(instruction, Instruction::Label(label) if !targets.contains(label)));
    code.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::tac::lower_program;
    use pretty_assertions::assert_eq;

    fn optimized(source: &str) -> (String, usize) {
        let mut tac = lower_program(&parse_source(source).unwrap());
        let removed = optimize_program(&mut tac);
        (tac.to_string(), removed)
    }

    #[test]
    fn test_constant_expression_folds_into_assignment() {
        let expected = "\
function main():
    x = 7
    return x
end function main
";
        assert_eq!(optimized("int main() { int x = 1 + 2 * 3; return x; }"), (expected.to_string(), 2));
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let expected = "\
function main():
    t0 = 1 / 0
    return t0
end function main
";
        assert_eq!(optimized("int main() { return 1 / 0; }"), (expected.to_string(), 0));
    }

    #[test]
    fn test_dead_loop_is_removed() {
        let expected = "\
function main():
    return 2
end function main
";
        assert_eq!(optimized("int main() { while (0) { return 1; } return 2; }").0, expected);
    }

    #[test]
    fn test_constant_short_circuit() {
        let expected = "\
function main():
    return 0
end function main
";
        assert_eq!(optimized("int main() { return 1 && 0; }").0, expected);
    }

    #[test]
    fn test_call_result_merges_into_variable() {
        let mut tac = lower_program(&parse_source(include_str!("../../demos/factorial.c")).unwrap());
        let factorial_before = tac.function("factorial").unwrap().clone();

        assert_eq!(optimize_program(&mut tac), 1);
        assert_eq!(tac.function("factorial"), Some(&factorial_before));

        let expected = "\
function main():
    x = 5
    param x
    result = call factorial, 1
    return result
end function main
";
        assert_eq!(tac.function("main").unwrap().to_string(), expected);
    }

    #[test]
    fn test_short_circuit_temp_is_not_merged() {
        let mut tac = lower_program(&parse_source("int main() { int a; int b; int c = a || b; return c; }").unwrap());
        optimize_program(&mut tac);

        let code = &tac.function("main").unwrap().code;
        let writes_to_result = code
            .iter()
            .filter(|instruction| instruction.dest() == Some(&Operand::Temp(0)))
            .count();
        assert_eq!(writes_to_result, 2);
        assert!(code.contains(&Instruction::Copy {
            dest: Operand::Name("c".to_string()),
            src: Operand::Temp(0),
        }));
    }
}
